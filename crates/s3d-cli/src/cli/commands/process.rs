//! `s3d process` – download to a temporary file, count its lines, delete it.

use anyhow::{Context, Result};
use s3d_core::config::S3dConfig;
use s3d_core::timing::{pretty_elapsed, Stopwatch};
use s3d_core::transfer::{TransferManager, TransferOptions, TransferState};
use s3d_core::{lines, store};
use std::fs::File;

use super::abort_on_ctrl_c;
use crate::cli::progress;

pub async fn run_process(cfg: &S3dConfig, key: &str) -> Result<()> {
    let sw = Stopwatch::start();
    let store = store::open(cfg)?;
    let (tx, bar) = progress::spawn_transfer_bar();
    let manager = TransferManager::new(store, TransferOptions::from(cfg))
        .progress(tx)
        .abort_token(abort_on_ctrl_c());
    let bucket = cfg.bucket.clone();
    let key = key.to_string();
    let result = tokio::task::spawn_blocking(move || manager.download_to_temp(&bucket, &key))
        .await
        .context("download task join")?;
    let _ = bar.await;
    println!(": {}", TransferState::of(&result));
    let (temp, summary) = result?;
    tracing::info!(path = %temp.path().display(), elapsed = %pretty_elapsed(summary.elapsed), "download success");

    let records = tokio::task::spawn_blocking(move || -> Result<u64> {
        let path = temp.path().to_path_buf();
        let file = File::open(&path).with_context(|| format!("open {}", path.display()))?;
        let n = lines::count_lines(file).with_context(|| format!("read {}", path.display()))?;
        temp.close()
            .with_context(|| format!("delete {}", path.display()))?;
        tracing::debug!(path = %path.display(), "temp file deleted");
        Ok(n)
    })
    .await
    .context("process task join")??;

    println!("total records: {}", records);
    println!("elapsed: {}", sw.pretty());
    Ok(())
}
