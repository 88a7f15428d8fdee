//! Create and preallocate a part file.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};

use super::writer::PartFile;
#[cfg(unix)]
use std::os::unix::io::AsRawFd;

/// Creates the part file; call `preallocate` then `build`.
pub struct PartFileBuilder {
    file: File,
    path: PathBuf,
}

impl PartFileBuilder {
    /// Creates (or truncates) the file at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("create {}", path.display()))?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Reserves `size` bytes: `posix_fallocate` on Unix, `set_len` otherwise
    /// or when the filesystem refuses.
    pub fn preallocate(&mut self, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let fd = self.file.as_raw_fd();
            let r = unsafe { libc::posix_fallocate(fd, 0, size as libc::off_t) };
            if r == 0 {
                return Ok(());
            }
            tracing::debug!(errno = r, size, "posix_fallocate failed, using set_len");
        }
        self.file
            .set_len(size)
            .with_context(|| format!("preallocate {} bytes for {}", size, self.path.display()))
    }

    pub fn build(self) -> PartFile {
        PartFile::new(self.file, self.path)
    }
}
