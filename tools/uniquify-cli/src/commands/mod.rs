//! Subcommand implementations.

use std::io::Write;
use std::sync::Arc;

use uniquify_common::CancelToken;
use uniquify_model::ProgressEvent;
use uniquify_render_engine::{FnProgress, SharedProgress, ThrottledProgress};

pub mod check;
pub mod generate;
pub mod merge;
pub mod presets;
pub mod probe;
pub mod process;
pub mod publish;
pub mod runs;
pub mod split;

/// Single-line progress on stderr.
pub(crate) fn console_progress() -> SharedProgress {
    let printer = FnProgress(|event: &ProgressEvent| {
        eprint!(
            "\r  {:>5.1}% {:<32} {:<40}",
            event.percent(),
            event.stage,
            event.message
        );
        std::io::stderr().flush().ok();
    });
    Arc::new(ThrottledProgress::new(Arc::new(printer)))
}

/// A token that is cancelled on Ctrl-C.
pub(crate) fn cancel_on_ctrl_c() -> CancelToken {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing current stage before stopping");
            token.cancel();
        }
    });
    cancel
}
