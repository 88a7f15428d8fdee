//! Bounded worker pool for parts and ranges.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Mutex, PoisonError};
use std::thread;

use super::TransferError;
use crate::control::{self, AbortToken};

/// Runs `f` over `items` on at most `workers` threads. The first failure
/// stops workers from taking more items and is returned once all have
/// finished. Results come back in completion order.
pub(super) fn run_pool<T, R, F>(
    items: Vec<T>,
    workers: usize,
    abort: Option<&AbortToken>,
    f: F,
) -> Result<Vec<R>, TransferError>
where
    T: Send,
    R: Send,
    F: Fn(T) -> Result<R, TransferError> + Sync,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let work = Mutex::new(VecDeque::from(items));
    let failed = AtomicBool::new(false);
    let num_workers = workers.max(1).min(total);
    let mut results = Vec::with_capacity(total);
    let mut first_error = None;

    let panicked = thread::scope(|s| {
        let (tx, rx) = mpsc::channel();
        let handles: Vec<_> = (0..num_workers)
            .map(|_| {
                let tx = tx.clone();
                let (work, failed, f) = (&work, &failed, &f);
                s.spawn(move || loop {
                    if failed.load(Ordering::Relaxed) || control::aborted(abort) {
                        break;
                    }
                    let next = work.lock().unwrap_or_else(PoisonError::into_inner).pop_front();
                    let Some(item) = next else {
                        break;
                    };
                    let res = f(item);
                    if res.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    if tx.send(res).is_err() {
                        break;
                    }
                })
            })
            .collect();
        drop(tx);

        for res in rx {
            match res {
                Ok(r) => results.push(r),
                Err(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    } else {
                        tracing::debug!("further transfer failure: {}", e);
                    }
                }
            }
        }
        handles
            .into_iter()
            .fold(false, |acc, h| h.join().is_err() | acc)
    });

    if panicked {
        return Err(TransferError::WorkerPanicked);
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if results.len() < total {
        return Err(TransferError::Aborted);
    }
    Ok(results)
}
