//! Scan-range record selection over newline-delimited data.
//!
//! A record belongs to the range that contains its first byte. A range
//! therefore skips the tail of a record that started before it and reads
//! past its own end to finish the last record it started, so adjacent ranges
//! never count a record twice or drop one that straddles a boundary.

use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};

use crate::segmenter::ByteRange;
use crate::store::FileHeaderInfo;

/// Reader over the records whose first byte lies in a range. Every record
/// is yielded newline-terminated.
#[derive(Debug)]
pub struct ScanRecords<R> {
    reader: BufReader<R>,
    /// Object offset of the next unread byte.
    pos: u64,
    end: u64,
    line: Vec<u8>,
    line_pos: usize,
}

/// Positions `reader` at the first record starting inside `range`.
pub fn scan_records<R: Read + Seek>(
    reader: R,
    range: ByteRange,
    header: FileHeaderInfo,
) -> io::Result<ScanRecords<R>> {
    let mut reader = BufReader::new(reader);
    let mut skipped = Vec::new();
    let pos = if range.start > 0 {
        // Byte start-1 is either the newline ending the previous record, or
        // part of a record owned by an earlier range.
        reader.seek(SeekFrom::Start(range.start - 1))?;
        let n = reader.read_until(b'\n', &mut skipped)?;
        range.start - 1 + n as u64
    } else if header.skips_first_line() {
        reader.rewind()?;
        reader.read_until(b'\n', &mut skipped)? as u64
    } else {
        reader.rewind()?;
        0
    };
    Ok(ScanRecords {
        reader,
        pos,
        end: range.end,
        line: Vec::new(),
        line_pos: 0,
    })
}

impl<R: Read> ScanRecords<R> {
    /// Loads the next record into `line`. Returns false once the range is done.
    fn fill(&mut self) -> io::Result<bool> {
        if self.pos >= self.end {
            return Ok(false);
        }
        self.line.clear();
        self.line_pos = 0;
        let n = self.reader.read_until(b'\n', &mut self.line)?;
        if n == 0 {
            self.pos = self.end;
            return Ok(false);
        }
        self.pos += n as u64;
        if self.line.last() != Some(&b'\n') {
            self.line.push(b'\n');
        }
        Ok(true)
    }
}

impl<R: Read> Read for ScanRecords<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        if self.line_pos >= self.line.len() && !self.fill()? {
            return Ok(0);
        }
        let pending = &self.line[self.line_pos..];
        let n = pending.len().min(buf.len());
        buf[..n].copy_from_slice(&pending[..n]);
        self.line_pos += n;
        Ok(n)
    }
}
