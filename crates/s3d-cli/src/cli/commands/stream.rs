//! `s3d stream` – read a whole object as one line stream.

use anyhow::{Context, Result};
use s3d_core::config::S3dConfig;
use s3d_core::timing::Stopwatch;
use s3d_core::{lines, store};

pub async fn run_stream(cfg: &S3dConfig, key: &str, parallel: bool) -> Result<()> {
    let store = store::open(cfg)?;
    let bucket = cfg.bucket.clone();
    let key = key.to_string();
    let workers = cfg.max_concurrent;
    let sw = Stopwatch::start();

    let total = tokio::task::spawn_blocking(move || -> Result<u64> {
        let body = store
            .get_object(&bucket, &key)
            .with_context(|| format!("get {}/{}", bucket, key))?;
        let n = if parallel {
            lines::count_lines_parallel(body, workers)
        } else {
            lines::count_lines(body)
        };
        n.with_context(|| format!("read {}/{}", bucket, key))
    })
    .await
    .context("stream task join")??;

    println!("total records: {}", total);
    println!("elapsed: {}", sw.pretty());
    Ok(())
}
