//! CLI command handlers, one file per command.

mod checksum;
mod count_file;
mod docs;
mod download;
mod process;
mod select;
mod stream;
mod upload;

pub use checksum::run_checksum;
pub use count_file::run_count_file;
pub use docs::{run_completions, run_man};
pub use download::run_download;
pub use process::run_process;
pub use select::{run_select, SelectArgs};
pub use stream::run_stream;
pub use upload::run_upload;

use s3d_core::control::AbortToken;

/// Token that is aborted on the first Ctrl-C.
fn abort_on_ctrl_c() -> AbortToken {
    let token = AbortToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping");
            eprintln!("\ninterrupted, finishing in-flight requests");
            on_signal.abort();
        }
    });
    token
}
