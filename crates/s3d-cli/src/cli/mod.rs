//! CLI for the s3d object-storage demos.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use s3d_core::config::{self, Backend, S3dConfig};
use s3d_core::query::DEFAULT_WORKERS;
use s3d_core::store::FileHeaderInfo;
use std::path::PathBuf;

use commands::{
    run_checksum, run_completions, run_count_file, run_download, run_man, run_process,
    run_select, run_stream, run_upload, SelectArgs,
};

/// Object used by the demos when `--key` is not given.
pub const DEFAULT_KEY: &str = "multipart-ratings.csv";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "s3d")]
#[command(about = "s3d: retrieval patterns for large objects in S3-compatible storage", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: CliCommand,
}

/// Overrides applied on top of the config file.
#[derive(Debug, Default, Args)]
pub struct GlobalArgs {
    /// Read configuration from this file instead of ~/.config/s3d/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Store backend: http or local.
    #[arg(long, global = true, value_parser = parse_backend)]
    pub backend: Option<Backend>,

    /// S3-compatible endpoint URL.
    #[arg(long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Root directory for the local backend.
    #[arg(long, global = true, value_name = "DIR")]
    pub local_root: Option<PathBuf>,

    /// Worker pool size.
    #[arg(long, global = true, value_name = "N")]
    pub workers: Option<usize>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Stream a whole object and count its lines.
    Stream {
        /// Object key.
        #[arg(long, default_value = DEFAULT_KEY)]
        key: String,

        /// Hand lines to a worker pool instead of counting on one thread.
        #[arg(long)]
        parallel: bool,
    },

    /// Count the lines of a local file.
    CountFile {
        path: PathBuf,

        #[arg(long)]
        parallel: bool,
    },

    /// Run a query over an object in byte ranges and count the returned records.
    Select(SelectArgs),

    /// Upload a file (multipart above the configured threshold).
    Upload {
        /// Local file to upload.
        file: PathBuf,

        /// Object key (defaults to the file name).
        #[arg(long)]
        key: Option<String>,

        /// Use multipart regardless of size.
        #[arg(long)]
        multipart: bool,
    },

    /// Download an object with parallel ranged requests.
    Download {
        #[arg(long, default_value = DEFAULT_KEY)]
        key: String,

        /// Destination path.
        dest: PathBuf,
    },

    /// Download an object to a temporary file, count its lines, then delete it.
    Process {
        #[arg(long, default_value = DEFAULT_KEY)]
        key: String,
    },

    /// Compute SHA-256 of a file (e.g. after download).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Print shell completions to stdout.
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Print the man page to stdout.
    Man,
}

fn parse_backend(s: &str) -> Result<Backend, String> {
    match s.to_ascii_lowercase().as_str() {
        "http" => Ok(Backend::Http),
        "local" => Ok(Backend::Local),
        other => Err(format!("unknown backend '{}' (expected http or local)", other)),
    }
}

pub(crate) fn parse_header_info(s: &str) -> Result<FileHeaderInfo, String> {
    match s.to_ascii_uppercase().as_str() {
        "NONE" => Ok(FileHeaderInfo::None),
        "USE" => Ok(FileHeaderInfo::Use),
        "IGNORE" => Ok(FileHeaderInfo::Ignore),
        other => Err(format!("unknown header mode '{}' (expected NONE, USE or IGNORE)", other)),
    }
}

impl GlobalArgs {
    /// Loads the config file and applies the flags given on the command line.
    pub fn load_config(&self) -> Result<S3dConfig> {
        let mut cfg = match &self.config {
            Some(path) => config::load_from_path(path)?,
            None => config::load_or_init()?,
        };
        self.apply(&mut cfg);
        tracing::debug!("loaded config: {:?}", cfg);
        Ok(cfg)
    }

    fn apply(&self, cfg: &mut S3dConfig) {
        if let Some(backend) = self.backend {
            cfg.backend = backend;
        }
        if let Some(endpoint) = &self.endpoint {
            cfg.endpoint = endpoint.clone();
        }
        if let Some(bucket) = &self.bucket {
            cfg.bucket = bucket.clone();
        }
        if let Some(root) = &self.local_root {
            cfg.local_root = Some(root.clone());
        }
        if let Some(n) = self.workers {
            cfg.max_concurrent = n.max(1);
        }
    }
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let Cli { global, command } = Cli::parse();

        match command {
            CliCommand::Stream { key, parallel } => {
                run_stream(&global.load_config()?, &key, parallel).await?
            }
            CliCommand::CountFile { path, parallel } => {
                let workers = global.workers.unwrap_or(DEFAULT_WORKERS);
                run_count_file(&path, parallel, workers).await?
            }
            CliCommand::Select(args) => run_select(&global.load_config()?, args).await?,
            CliCommand::Upload {
                file,
                key,
                multipart,
            } => run_upload(&global.load_config()?, &file, key, multipart).await?,
            CliCommand::Download { key, dest } => {
                run_download(&global.load_config()?, &key, &dest).await?
            }
            CliCommand::Process { key } => run_process(&global.load_config()?, &key).await?,
            CliCommand::Checksum { path } => run_checksum(&path).await?,
            CliCommand::Completions { shell } => run_completions(shell)?,
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
