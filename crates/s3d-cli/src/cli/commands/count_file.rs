//! `s3d count-file <path>` – line count of a local file.

use anyhow::{Context, Result};
use s3d_core::lines;
use s3d_core::timing::Stopwatch;
use std::fs::File;
use std::path::Path;

pub async fn run_count_file(path: &Path, parallel: bool, workers: usize) -> Result<()> {
    let sw = Stopwatch::start();
    let owned = path.to_path_buf();
    let total = tokio::task::spawn_blocking(move || -> Result<u64> {
        let file = File::open(&owned).with_context(|| format!("open {}", owned.display()))?;
        let n = if parallel {
            lines::count_lines_parallel(file, workers)
        } else {
            lines::count_lines(file)
        };
        n.with_context(|| format!("read {}", owned.display()))
    })
    .await
    .context("count task join")??;
    println!("total records: {}", total);
    println!("elapsed: {}", sw.pretty());
    Ok(())
}
