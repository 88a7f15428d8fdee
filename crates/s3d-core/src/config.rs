use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::store::FileHeaderInfo;

/// 100 MiB, the scan window used by the range-query demo.
pub const DEFAULT_CHUNK_BYTES: u64 = 104_857_600;

/// Retry policy parameters (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_secs: 0.25,
            max_delay_secs: 30,
        }
    }
}

/// Which object store the demos talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// S3-compatible HTTP endpoint.
    #[default]
    Http,
    /// Directory on local disk (bucket = subdirectory).
    Local,
}

/// Global configuration loaded from `~/.config/s3d/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3dConfig {
    /// Store backend: "http" (default) or "local".
    #[serde(default)]
    pub backend: Backend,
    /// Base URL of the S3-compatible endpoint (path-style addressing).
    pub endpoint: String,
    /// Root directory for the local backend.
    #[serde(default)]
    pub local_root: Option<PathBuf>,
    /// Bucket used when a command does not name one.
    pub bucket: String,
    /// Maximum bytes per scan range for range queries.
    pub chunk_bytes: u64,
    /// Worker pool size for parallel range queries, line processing and transfers.
    pub max_concurrent: usize,
    /// Part size for multipart upload and ranged download.
    pub part_size: u64,
    /// Objects at least this large are uploaded with multipart.
    pub multipart_threshold: u64,
    /// SQL expression sent with range queries.
    pub query: String,
    /// How the first CSV line is treated by range queries.
    #[serde(default)]
    pub file_header_info: FileHeaderInfo,
    /// Extra headers sent with every HTTP request (e.g. a pre-computed Authorization).
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Optional retry policy; if missing, built-in defaults are used.
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

impl Default for S3dConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Http,
            endpoint: "http://127.0.0.1:9000".to_string(),
            local_root: None,
            bucket: "demo-bucket".to_string(),
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_concurrent: 8,
            part_size: 8 * 1024 * 1024,
            multipart_threshold: 16 * 1024 * 1024,
            query: "select * from S3Object".to_string(),
            file_header_info: FileHeaderInfo::None,
            headers: BTreeMap::new(),
            retry: None,
        }
    }
}

impl S3dConfig {
    /// Retry settings, falling back to the built-in defaults.
    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("s3d")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from a specific file (must exist).
pub fn load_from_path(path: &Path) -> Result<S3dConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: S3dConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<S3dConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = S3dConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    load_from_path(&path)
}
