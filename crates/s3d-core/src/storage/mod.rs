//! Download target files.
//!
//! A download is written into `<dest>.part`, preallocated to the object size,
//! filled by concurrent offset writes from the range workers and renamed onto
//! `<dest>` only after every range arrived.

mod builder;
mod writer;

use std::path::{Path, PathBuf};

pub use builder::PartFileBuilder;
pub use writer::PartFile;

/// Suffix of a file that is still being written.
pub const TEMP_SUFFIX: &str = ".part";

/// `dest` with [`TEMP_SUFFIX`] appended (`ratings.csv` -> `ratings.csv.part`).
pub fn temp_path(dest: &Path) -> PathBuf {
    let mut o = dest.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}
