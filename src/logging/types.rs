//! Core logging types: verbosity and the [`Log`] trait.

/// How much console output to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Quiet,
    /// Errors, warnings, and the status line.
    Normal,
    /// Everything, including per-step diagnostics.
    Verbose,
}

impl Verbosity {
    /// Derive the verbosity from the `--quiet` and `--verbose` flags.
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: bool) -> Self {
        if quiet {
            Self::Quiet
        } else if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }
}

/// Abstraction over logging backends.
///
/// The install driver and resources log through this trait so tests can
/// capture output without installing a global subscriber.
pub trait Log: Send + Sync {
    /// Report the single outcome line of an invocation.
    fn status(&self, msg: &str);
    /// Log a debug message (suppressed on console unless verbose).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
}

/// A single captured log entry.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LogEntry {
    Status(String),
    Debug(String),
    Warn(String),
    Error(String),
}

/// [`Log`] implementation that records entries in memory.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingLog {
    entries: std::sync::Mutex<Vec<LogEntry>>,
}

#[cfg(test)]
impl RecordingLog {
    pub(crate) fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    pub(crate) fn statuses(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                LogEntry::Status(msg) => Some(msg),
                _ => None,
            })
            .collect()
    }

    fn push(&self, entry: LogEntry) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.push(entry);
        }
    }
}

#[cfg(test)]
impl Log for RecordingLog {
    fn status(&self, msg: &str) {
        self.push(LogEntry::Status(msg.to_string()));
    }

    fn debug(&self, msg: &str) {
        self.push(LogEntry::Debug(msg.to_string()));
    }

    fn warn(&self, msg: &str) {
        self.push(LogEntry::Warn(msg.to_string()));
    }

    fn error(&self, msg: &str) {
        self.push(LogEntry::Error(msg.to_string()));
    }
}
