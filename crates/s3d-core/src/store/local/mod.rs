//! Directory-backed object store.
//!
//! Buckets are directories under a root and keys are relative paths inside
//! them. Range queries support only the select-all projection; the scan-range
//! record selection matches what an S3-compatible store does.

mod scan;

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use super::{CompletedPart, ObjectBody, ObjectStore, SelectQuery, StoreError};
use crate::segmenter::ByteRange;
use crate::storage;

pub use scan::{scan_records, ScanRecords};

const UPLOADS_DIR: &str = ".uploads";
const TARGET_FILE: &str = "target";

#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
    next_upload: AtomicU64,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_upload: AtomicU64::new(0),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `bucket/key`, rejecting anything that would escape the bucket.
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, StoreError> {
        if bucket.is_empty() || bucket.starts_with('.') || !is_relative_normal(bucket) {
            return Err(StoreError::InvalidKey(bucket.to_string()));
        }
        if key.is_empty() || !is_relative_normal(key) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(bucket).join(key))
    }

    fn open(&self, bucket: &str, key: &str) -> Result<File, StoreError> {
        let path = self.object_path(bucket, key)?;
        File::open(&path).map_err(|e| not_found_or_io(e, bucket, key))
    }

    fn upload_dir(&self, upload_id: &str) -> Result<PathBuf, StoreError> {
        if upload_id.is_empty() || !upload_id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(StoreError::Protocol(format!("malformed upload id {:?}", upload_id)));
        }
        let dir = self.root.join(UPLOADS_DIR).join(upload_id);
        if !dir.is_dir() {
            return Err(StoreError::Protocol(format!("no such upload {}", upload_id)));
        }
        Ok(dir)
    }

    fn check_upload_target(&self, dir: &Path, bucket: &str, key: &str) -> Result<(), StoreError> {
        let target = fs::read_to_string(dir.join(TARGET_FILE))?;
        if target != format!("{}/{}", bucket, key) {
            return Err(StoreError::Protocol(format!(
                "upload belongs to {}, not {}/{}",
                target, bucket, key
            )));
        }
        Ok(())
    }
}

fn is_relative_normal(p: &str) -> bool {
    Path::new(p)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

fn not_found_or_io(e: io::Error, bucket: &str, key: &str) -> StoreError {
    if e.kind() == io::ErrorKind::NotFound {
        StoreError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    } else {
        StoreError::Io(e)
    }
}

fn part_file_name(part_number: u32) -> String {
    format!("part-{:05}", part_number)
}

/// Writes `body` to a temp file beside `dest`, then renames it into place.
fn write_atomically(dest: &Path, body: &mut dyn Read, len: u64) -> Result<(), StoreError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp = storage::temp_path(dest);
    let mut file = File::create(&temp)?;
    let copied = io::copy(&mut body.take(len), &mut file)?;
    if copied != len {
        drop(file);
        let _ = fs::remove_file(&temp);
        return Err(StoreError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("body ended after {} of {} bytes", copied, len),
        )));
    }
    file.sync_all()?;
    fs::rename(&temp, dest)?;
    Ok(())
}

impl ObjectStore for LocalStore {
    fn object_size(&self, bucket: &str, key: &str) -> Result<u64, StoreError> {
        let path = self.object_path(bucket, key)?;
        let meta = fs::metadata(&path).map_err(|e| not_found_or_io(e, bucket, key))?;
        Ok(meta.len())
    }

    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, StoreError> {
        Ok(Box::new(self.open(bucket, key)?))
    }

    fn get_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
    ) -> Result<ObjectBody, StoreError> {
        let mut file = self.open(bucket, key)?;
        file.seek(SeekFrom::Start(range.start))?;
        Ok(Box::new(file.take(range.len())))
    }

    fn query_range(
        &self,
        bucket: &str,
        key: &str,
        range: ByteRange,
        query: &SelectQuery,
    ) -> Result<ObjectBody, StoreError> {
        if !query.is_select_all() {
            return Err(StoreError::UnsupportedQuery(query.expression.clone()));
        }
        let file = self.open(bucket, key)?;
        let records = scan_records(file, range, query.file_header_info)?;
        Ok(Box::new(records))
    }

    fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: &mut dyn Read,
        len: u64,
    ) -> Result<(), StoreError> {
        let dest = self.object_path(bucket, key)?;
        write_atomically(&dest, body, len)
    }

    fn create_multipart_upload(&self, bucket: &str, key: &str) -> Result<String, StoreError> {
        self.object_path(bucket, key)?;
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let seq = self.next_upload.fetch_add(1, Ordering::Relaxed);
        let upload_id = format!("{:x}-{:x}-{:x}", nanos, std::process::id(), seq);
        let dir = self.root.join(UPLOADS_DIR).join(&upload_id);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(TARGET_FILE), format!("{}/{}", bucket, key))?;
        tracing::debug!(bucket, key, upload_id = %upload_id, "created local multipart upload");
        Ok(upload_id)
    }

    fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
    ) -> Result<CompletedPart, StoreError> {
        if part_number == 0 {
            return Err(StoreError::Protocol("part numbers start at 1".into()));
        }
        let dir = self.upload_dir(upload_id)?;
        self.check_upload_target(&dir, bucket, key)?;
        let mut file = File::create(dir.join(part_file_name(part_number)))?;
        file.write_all(data)?;
        let digest = hex::encode(Sha256::digest(data));
        Ok(CompletedPart {
            part_number,
            etag: format!("\"{}\"", &digest[..32]),
        })
    }

    fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StoreError> {
        let dir = self.upload_dir(upload_id)?;
        self.check_upload_target(&dir, bucket, key)?;
        if parts.is_empty() {
            return Err(StoreError::Protocol("multipart upload has no parts".into()));
        }
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(StoreError::Protocol(
                "parts must be listed in ascending part-number order".into(),
            ));
        }

        let mut files = Vec::with_capacity(parts.len());
        let mut total = 0u64;
        for part in parts {
            let file = File::open(dir.join(part_file_name(part.part_number))).map_err(|_| {
                StoreError::Protocol(format!("part {} was never uploaded", part.part_number))
            })?;
            total += file.metadata()?.len();
            files.push(file);
        }

        let mut chained: Box<dyn Read> = Box::new(io::empty());
        for file in files {
            chained = Box::new(chained.chain(file));
        }
        let dest = self.object_path(bucket, key)?;
        write_atomically(&dest, &mut chained, total)?;
        fs::remove_dir_all(&dir)?;
        tracing::debug!(bucket, key, parts = parts.len(), bytes = total, "completed local multipart upload");
        Ok(())
    }

    fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), StoreError> {
        let dir = self.upload_dir(upload_id)?;
        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn store_with(bucket: &str, key: &str, data: &[u8]) -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(bucket).join(key);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, data).unwrap();
        let store = LocalStore::new(dir.path());
        (dir, store)
    }

    fn read_all(mut body: ObjectBody) -> Vec<u8> {
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn size_get_and_range() {
        let (_dir, store) = store_with("b", "data/ratings.csv", b"0123456789");
        assert_eq!(store.object_size("b", "data/ratings.csv").unwrap(), 10);
        assert_eq!(read_all(store.get_object("b", "data/ratings.csv").unwrap()), b"0123456789");
        let r = store.get_range("b", "data/ratings.csv", ByteRange::new(3, 7)).unwrap();
        assert_eq!(read_all(r), b"3456");
    }

    #[test]
    fn missing_object_is_not_found() {
        let (_dir, store) = store_with("b", "k", b"x");
        assert!(matches!(
            store.object_size("b", "nope"),
            Err(StoreError::NotFound { .. })
        ));
        assert!(matches!(
            store.get_object("other", "k"),
            Err(StoreError::NotFound { .. })
        ));
    }

    #[test]
    fn keys_cannot_escape_the_bucket() {
        let (_dir, store) = store_with("b", "k", b"x");
        assert!(matches!(store.object_path("b", "../k"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.object_path("b", "/etc/passwd"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.object_path(".uploads", "k"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.object_path("b", ""), Err(StoreError::InvalidKey(_))));
    }

    #[test]
    fn query_range_select_all() {
        let (_dir, store) = store_with("b", "k.csv", b"a,1\nb,2\nc,3\n");
        let q = SelectQuery::new("select * from S3Object");
        let out = read_all(store.query_range("b", "k.csv", ByteRange::new(0, 5), &q).unwrap());
        assert_eq!(out, b"a,1\nb,2\n");
        let out = read_all(store.query_range("b", "k.csv", ByteRange::new(5, 12), &q).unwrap());
        assert_eq!(out, b"c,3\n");
    }

    #[test]
    fn query_range_rejects_filters() {
        let (_dir, store) = store_with("b", "k.csv", b"a,1\n");
        let q = SelectQuery::new("select s._1 from S3Object s");
        assert!(matches!(
            store.query_range("b", "k.csv", ByteRange::new(0, 4), &q),
            Err(StoreError::UnsupportedQuery(_))
        ));
    }

    #[test]
    fn put_object_writes_exact_length() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        store
            .put_object("b", "nested/obj", &mut Cursor::new(b"hello world".to_vec()), 5)
            .unwrap();
        assert_eq!(fs::read(dir.path().join("b/nested/obj")).unwrap(), b"hello");

        let short = store.put_object("b", "short", &mut Cursor::new(b"abc".to_vec()), 10);
        assert!(matches!(short, Err(StoreError::Io(_))));
        assert!(!dir.path().join("b/short").exists());
    }

    #[test]
    fn multipart_upload_assembles_parts_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = store.create_multipart_upload("b", "big").unwrap();
        let p2 = store.upload_part("b", "big", &id, 2, b"world").unwrap();
        let p1 = store.upload_part("b", "big", &id, 1, b"hello ").unwrap();
        assert_ne!(p1.etag, p2.etag);
        store
            .complete_multipart_upload("b", "big", &id, &[p1, p2])
            .unwrap();
        assert_eq!(fs::read(dir.path().join("b/big")).unwrap(), b"hello world");
        assert!(store.upload_dir(&id).is_err());
    }

    #[test]
    fn multipart_complete_requires_sorted_known_parts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = store.create_multipart_upload("b", "big").unwrap();
        let p1 = store.upload_part("b", "big", &id, 1, b"a").unwrap();
        let p2 = store.upload_part("b", "big", &id, 2, b"b").unwrap();
        assert!(store
            .complete_multipart_upload("b", "big", &id, &[p2.clone(), p1.clone()])
            .is_err());
        let ghost = CompletedPart {
            part_number: 3,
            etag: "\"x\"".into(),
        };
        assert!(store
            .complete_multipart_upload("b", "big", &id, &[p1, p2, ghost])
            .is_err());
        assert!(store.upload_part("other", "big", &id, 4, b"c").is_err());
    }

    #[test]
    fn multipart_abort_discards_parts() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());
        let id = store.create_multipart_upload("b", "big").unwrap();
        store.upload_part("b", "big", &id, 1, b"data").unwrap();
        store.abort_multipart_upload("b", "big", &id).unwrap();
        assert!(store.upload_part("b", "big", &id, 2, b"more").is_err());
        assert!(!dir.path().join("b/big").exists());
    }
}
