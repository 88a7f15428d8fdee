//! Streaming response body.
//!
//! libcurl pushes data through a callback, so the transfer runs on its own
//! thread and hands chunks to the reader over a bounded channel. The channel
//! bound provides backpressure; dropping the reader aborts the transfer.

use std::cell::{Cell, RefCell};
use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread;

use super::head::parse_status_line;
use crate::store::error::truncate_body;
use crate::store::StoreError;

const CHANNEL_DEPTH: usize = 16;

enum Frame {
    Data(Vec<u8>),
    Failed(StoreError),
}

/// Reader over a response body produced by a transfer thread.
pub(crate) struct BodyReader {
    rx: Receiver<Frame>,
    current: Vec<u8>,
    pos: usize,
    done: bool,
}

impl BodyReader {
    /// Starts `easy` on a transfer thread and waits for the response to
    /// begin. Non-2xx responses and failures before the first body byte are
    /// returned here, so callers may safely retry `open`.
    pub(crate) fn open(easy: curl::easy::Easy) -> Result<Self, StoreError> {
        let (tx, rx) = mpsc::sync_channel(CHANNEL_DEPTH);
        thread::Builder::new()
            .name("s3d-body".into())
            .spawn(move || run_transfer(easy, tx))?;

        match rx.recv() {
            Ok(Frame::Data(chunk)) => Ok(Self {
                rx,
                current: chunk,
                pos: 0,
                done: false,
            }),
            Ok(Frame::Failed(e)) => Err(e),
            // Transfer finished with an empty 2xx body.
            Err(_) => Ok(Self {
                rx,
                current: Vec::new(),
                pos: 0,
                done: true,
            }),
        }
    }
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.pos < self.current.len() {
                let n = (self.current.len() - self.pos).min(buf.len());
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }
            if self.done || buf.is_empty() {
                return Ok(0);
            }
            match self.rx.recv() {
                Ok(Frame::Data(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Ok(Frame::Failed(e)) => {
                    self.done = true;
                    return Err(e.into_io());
                }
                Err(_) => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }
    }
}

fn run_transfer(mut easy: curl::easy::Easy, tx: SyncSender<Frame>) {
    let status = Cell::new(0u32);
    let error_body = RefCell::new(Vec::new());
    let receiver_gone = Cell::new(false);

    let result = perform_streaming(&mut easy, &tx, &status, &error_body, &receiver_gone);

    if receiver_gone.get() {
        tracing::trace!("body reader dropped before end of transfer");
        return;
    }
    let failure = match result {
        Err(e) => Some(StoreError::Curl(e)),
        Ok(()) => {
            let code = status.get();
            if (200..300).contains(&code) {
                None
            } else {
                Some(StoreError::Http {
                    status: code,
                    body: truncate_body(&error_body.borrow()),
                })
            }
        }
    };
    if let Some(e) = failure {
        let _ = tx.send(Frame::Failed(e));
    }
}

fn perform_streaming(
    easy: &mut curl::easy::Easy,
    tx: &SyncSender<Frame>,
    status: &Cell<u32>,
    error_body: &RefCell<Vec<u8>>,
    receiver_gone: &Cell<bool>,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.header_function(|line| {
        if let Some(code) = parse_status_line(line) {
            status.set(code);
        }
        true
    })?;
    transfer.write_function(|data| {
        if !(200..300).contains(&status.get()) {
            error_body.borrow_mut().extend_from_slice(data);
            return Ok(data.len());
        }
        if tx.send(Frame::Data(data.to_vec())).is_err() {
            receiver_gone.set(true);
            // Short count makes curl abort the transfer.
            return Ok(0);
        }
        Ok(data.len())
    })?;
    transfer.perform()
}
