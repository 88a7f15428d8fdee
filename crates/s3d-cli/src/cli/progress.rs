//! Progress output. Each renderer is a single task draining its channel, so
//! workers never touch the terminal.

use std::io::Write;

use s3d_core::query::QueryProgress;
use s3d_core::transfer::TransferProgress;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const BAR_WIDTH: usize = 40;
const CHANNEL_CAPACITY: usize = 64;

/// `  [#####     ]` with `pct` clamped to `0..=100`.
pub fn render_bar(pct: f64) -> String {
    let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
    let filled = ((BAR_WIDTH as f64 * pct / 100.0) as usize).min(BAR_WIDTH);
    format!("  [{}{}]", "#".repeat(filled), " ".repeat(BAR_WIDTH - filled))
}

/// Spawns the bar renderer for a transfer. The task ends (leaving the cursor
/// after the bar) once every sender is dropped.
pub fn spawn_transfer_bar() -> (mpsc::Sender<TransferProgress>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<TransferProgress>(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        let mut last: Option<String> = None;
        while let Some(p) = rx.recv().await {
            let bar = render_bar(p.percent());
            if last.as_ref() != Some(&bar) {
                let mut out = std::io::stdout().lock();
                let _ = write!(out, "\r{}", bar);
                let _ = out.flush();
                last = Some(bar);
            }
        }
    });
    (tx, handle)
}

/// Spawns a logger for range-query progress: one line per completed range.
pub fn spawn_query_log() -> (mpsc::Sender<QueryProgress>, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<QueryProgress>(CHANNEL_CAPACITY);
    let handle = tokio::spawn(async move {
        while let Some(p) = rx.recv().await {
            tracing::info!(
                range = %p.range,
                records = p.range_records,
                done = p.completed_ranges,
                of = p.range_count,
                total = p.total_records,
                "range completed"
            );
            eprintln!(
                "[{}/{}] range {}: {} records (running total {})",
                p.completed_ranges, p.range_count, p.range, p.range_records, p.total_records
            );
        }
    });
    (tx, handle)
}
