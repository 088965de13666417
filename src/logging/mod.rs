//! Logging infrastructure: one status line on stdout, diagnostics on stderr.

mod logger;
mod subscriber;
mod types;

pub use logger::Logger;
pub use subscriber::init_subscriber;
pub use types::{Log, Verbosity};

#[cfg(test)]
pub(crate) use types::{LogEntry, RecordingLog};
