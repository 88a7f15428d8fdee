//! `s3d download <dest>` – parallel ranged download with a progress bar.

use anyhow::{Context, Result};
use s3d_core::config::S3dConfig;
use s3d_core::store;
use s3d_core::timing::pretty_elapsed;
use s3d_core::transfer::{TransferManager, TransferOptions, TransferState};
use std::path::Path;

use super::abort_on_ctrl_c;
use crate::cli::progress;

pub async fn run_download(cfg: &S3dConfig, key: &str, dest: &Path) -> Result<()> {
    let store = store::open(cfg)?;
    let (tx, bar) = progress::spawn_transfer_bar();
    let manager = TransferManager::new(store, TransferOptions::from(cfg))
        .progress(tx)
        .abort_token(abort_on_ctrl_c());
    let bucket = cfg.bucket.clone();
    let key = key.to_string();
    let path = dest.to_path_buf();
    let result = tokio::task::spawn_blocking(move || manager.download_file(&bucket, &key, &path))
        .await
        .context("download task join")?;
    let _ = bar.await;
    println!(": {}", TransferState::of(&result));

    let summary = result?;
    tracing::info!("download success");
    println!(
        "downloaded {}/{} ({} bytes, {} range(s), {}) to {}",
        summary.bucket,
        summary.key,
        summary.bytes,
        summary.parts,
        pretty_elapsed(summary.elapsed),
        dest.display()
    );
    Ok(())
}
