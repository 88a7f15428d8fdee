//! Line-by-line processing of a whole object or local file.
//!
//! Sequential mode walks the stream on the calling thread. Parallel mode keeps
//! a single reader (a byte stream has one cursor) and hands batches of lines
//! to a bounded pool of worker threads through a bounded channel, so memory
//! stays flat no matter how large the object is.

use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use crate::query::RecordCounter;

/// Read buffer for line streams.
pub const LINE_BUFFER: usize = 32 * 1024;
/// Lines handed to a worker at once.
const BATCH_LINES: usize = 1024;

/// Calls `f` with every line of `reader`, without its trailing `\n` (or
/// `\r\n`). A final line without a newline still counts; an empty input has no
/// lines. Returns the number of lines.
pub fn for_each_line<R, F>(reader: R, mut f: F) -> io::Result<u64>
where
    R: Read,
    F: FnMut(u64, &[u8]),
{
    let mut reader = BufReader::with_capacity(LINE_BUFFER, reader);
    let mut buf = Vec::new();
    let mut n = 0u64;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(n);
        }
        n += 1;
        f(n, trim_eol(&buf));
    }
}

fn trim_eol(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// Counts lines on the calling thread, tracing each one.
pub fn count_lines<R: Read>(reader: R) -> io::Result<u64> {
    for_each_line(reader, |n, line| {
        tracing::trace!(n, line = %String::from_utf8_lossy(line), "line");
    })
}

/// Counts lines with `workers` threads processing batches read by the
/// calling thread. Gives the same total as [`count_lines`].
pub fn count_lines_parallel<R: Read>(reader: R, workers: usize) -> io::Result<u64> {
    let workers = workers.max(1);
    let counter = RecordCounter::new();
    let (tx, rx) = mpsc::sync_channel::<Vec<Vec<u8>>>(workers * 2);
    let rx = Arc::new(Mutex::new(rx));

    let mut handles = Vec::with_capacity(workers);
    for i in 0..workers {
        let rx = Arc::clone(&rx);
        let counter = counter.clone();
        let handle = thread::Builder::new()
            .name(format!("s3d-lines-{}", i))
            .spawn(move || loop {
                let batch = match rx.lock().unwrap_or_else(PoisonError::into_inner).recv() {
                    Ok(b) => b,
                    Err(_) => break,
                };
                for line in &batch {
                    let n = counter.increment();
                    tracing::trace!(n, line = %String::from_utf8_lossy(line), "line");
                }
            })?;
        handles.push(handle);
    }

    let mut batch = Vec::with_capacity(BATCH_LINES);
    let read = for_each_line(reader, |_, line| {
        batch.push(line.to_vec());
        if batch.len() == BATCH_LINES {
            let full = std::mem::replace(&mut batch, Vec::with_capacity(BATCH_LINES));
            // Only fails if every worker is gone; the join below reports that.
            let _ = tx.send(full);
        }
    });
    if !batch.is_empty() {
        let _ = tx.send(batch);
    }
    drop(tx);

    let mut panicked = false;
    for h in handles {
        panicked |= h.join().is_err();
    }
    let read_total = read?;
    if panicked {
        return Err(io::Error::new(io::ErrorKind::Other, "line worker panicked"));
    }
    let total = counter.get();
    debug_assert_eq!(total, read_total);
    Ok(total)
}
