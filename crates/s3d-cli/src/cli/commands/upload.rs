//! `s3d upload <file>` – managed upload with a progress bar.

use anyhow::{Context, Result};
use s3d_core::config::S3dConfig;
use s3d_core::store;
use s3d_core::timing::pretty_elapsed;
use s3d_core::transfer::{TransferManager, TransferOptions, TransferState};
use std::path::Path;

use super::abort_on_ctrl_c;
use crate::cli::progress;

fn key_for(file: &Path, key: Option<String>) -> Result<String> {
    match key {
        Some(k) => Ok(k),
        None => file
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .with_context(|| format!("no key for {}; pass --key", file.display())),
    }
}

pub async fn run_upload(
    cfg: &S3dConfig,
    file: &Path,
    key: Option<String>,
    force_multipart: bool,
) -> Result<()> {
    let key = key_for(file, key)?;
    let store = store::open(cfg)?;
    let mut options = TransferOptions::from(cfg);
    options.force_multipart = force_multipart;

    let (tx, bar) = progress::spawn_transfer_bar();
    let manager = TransferManager::new(store, options)
        .progress(tx)
        .abort_token(abort_on_ctrl_c());
    let bucket = cfg.bucket.clone();
    let path = file.to_path_buf();
    let result = tokio::task::spawn_blocking(move || manager.upload_file(&path, &bucket, &key))
        .await
        .context("upload task join")?;
    let _ = bar.await;
    println!(": {}", TransferState::of(&result));

    let summary = result?;
    println!(
        "uploaded {} bytes to {}/{} ({} part(s), {})",
        summary.bytes,
        summary.bucket,
        summary.key,
        summary.parts,
        pretty_elapsed(summary.elapsed)
    );
    Ok(())
}
