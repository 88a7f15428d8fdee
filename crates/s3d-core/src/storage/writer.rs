//! Shared offset writer over a part file.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Handle to a part file. Clones share the file; each `write_at` is an
/// independent positioned write, so range workers need no lock.
#[derive(Clone, Debug)]
pub struct PartFile {
    file: Arc<File>,
    path: PathBuf,
}

impl PartFile {
    pub(crate) fn new(file: File, path: PathBuf) -> Self {
        Self {
            file: Arc::new(file),
            path,
        }
    }

    #[cfg(unix)]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, offset)
            .with_context(|| format!("write {} bytes at {} to {}", data.len(), offset, self.path.display()))
    }

    /// Seek + write fallback; callers on these targets serialize writes.
    #[cfg(not(unix))]
    pub fn write_at(&self, offset: u64, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        let mut f = self.file.try_clone()?;
        f.seek(SeekFrom::Start(offset))?;
        f.write_all(data)
            .with_context(|| format!("write at {} to {}", offset, self.path.display()))
    }

    pub fn sync(&self) -> Result<()> {
        self.file
            .sync_all()
            .with_context(|| format!("sync {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Renames the part file onto `dest`. Both must be on one filesystem.
    pub fn finalize(self, dest: &Path) -> Result<()> {
        let Self { file, path } = self;
        drop(file);
        std::fs::rename(&path, dest)
            .with_context(|| format!("rename {} to {}", path.display(), dest.display()))
    }

    /// Deletes the part file after a failed or aborted download.
    pub fn discard(self) {
        let Self { file, path } = self;
        drop(file);
        if let Err(e) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), "could not remove part file: {}", e);
        }
    }
}
