//! Console logger backed by the global [`tracing`] subscriber.
use super::types::Log;

/// Target used for the outcome line so the formatter can print it verbatim.
pub(super) const STATUS_TARGET: &str = "install_if_changed::status";

/// [`Log`] implementation that emits [`tracing`] events.
///
/// Output formatting and filtering are configured once by
/// [`init_subscriber`](super::subscriber::init_subscriber).
#[derive(Debug, Default, Clone, Copy)]
pub struct Logger;

impl Log for Logger {
    fn status(&self, msg: &str) {
        tracing::info!(target: STATUS_TARGET, "{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }
}
