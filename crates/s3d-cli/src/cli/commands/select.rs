//! `s3d select` – count query results over an object, range by range.

use anyhow::{Context, Result};
use clap::Args;
use s3d_core::config::S3dConfig;
use s3d_core::query::{RangeQueryRunner, RunMode};
use s3d_core::store::{self, FileHeaderInfo, SelectQuery};
use s3d_core::timing::pretty_elapsed;

use super::abort_on_ctrl_c;
use crate::cli::progress;
use crate::cli::{parse_header_info, DEFAULT_KEY};

#[derive(Debug, Args)]
pub struct SelectArgs {
    /// Object key.
    #[arg(long, default_value = DEFAULT_KEY)]
    pub key: String,

    /// Query one range at a time instead of with the worker pool.
    #[arg(long)]
    pub sequential: bool,

    /// Print the run summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Bytes per scan range (overrides chunk_bytes from the config).
    #[arg(long, value_name = "BYTES")]
    pub chunk_bytes: Option<u64>,

    /// SQL expression (overrides query from the config).
    #[arg(long)]
    pub query: Option<String>,

    /// First-line handling: NONE, USE or IGNORE.
    #[arg(long, value_parser = parse_header_info)]
    pub header: Option<FileHeaderInfo>,
}

impl SelectArgs {
    fn mode(&self) -> RunMode {
        if self.sequential {
            RunMode::Sequential
        } else {
            RunMode::Parallel
        }
    }
}

pub async fn run_select(cfg: &S3dConfig, args: SelectArgs) -> Result<()> {
    let store = store::open(cfg)?;
    let query = SelectQuery::new(args.query.clone().unwrap_or_else(|| cfg.query.clone()))
        .with_file_header_info(args.header.unwrap_or(cfg.file_header_info));
    let mode = args.mode();

    let (tx, log) = progress::spawn_query_log();
    let runner = RangeQueryRunner::new(store, cfg.bucket.clone(), args.key.clone(), query)
        .chunk_bytes(args.chunk_bytes.unwrap_or(cfg.chunk_bytes))
        .workers(cfg.max_concurrent)
        .progress(tx)
        .abort_token(abort_on_ctrl_c());

    // The runner (and its progress sender) is dropped when the task ends.
    let result = tokio::task::spawn_blocking(move || runner.run(mode))
        .await
        .context("select task join")?;
    let _ = log.await;
    let summary = result?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{}/{}: {} bytes in {} range(s) of {} bytes",
            summary.bucket, summary.key, summary.object_size, summary.range_count, summary.chunk_bytes
        );
        println!("total records: {}", summary.total_records);
        println!("elapsed: {}", pretty_elapsed(summary.elapsed));
    }
    Ok(())
}
