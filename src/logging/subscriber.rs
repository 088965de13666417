//! Tracing subscriber setup: console formatter and initialisation.
use tracing_subscriber::filter::LevelFilter;

use super::logger::STATUS_TARGET;
use super::types::Verbosity;

/// Extracts the `message` field from a [`tracing::Event`].
#[derive(Default)]
struct MessageExtractor {
    message: String,
}

impl tracing::field::Visit for MessageExtractor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] that prints status lines
/// verbatim and prefixes diagnostics by level.
struct StatusFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for StatusFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let metadata = event.metadata();
        let level = *metadata.level();

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = &extractor.message;

        match level {
            tracing::Level::ERROR => writeln!(writer, "❌ {msg}"),
            tracing::Level::WARN => writeln!(writer, "warning: {msg}"),
            tracing::Level::INFO if metadata.target() == STATUS_TARGET => writeln!(writer, "{msg}"),
            tracing::Level::INFO => writeln!(writer, "  {msg}"),
            _ => writeln!(writer, "  \x1b[2m{msg}\x1b[0m"),
        }
    }
}

/// Console level filter for a verbosity.
const fn level_filter(verbosity: Verbosity) -> LevelFilter {
    match verbosity {
        Verbosity::Quiet => LevelFilter::ERROR,
        Verbosity::Normal => LevelFilter::INFO,
        Verbosity::Verbose => LevelFilter::DEBUG,
    }
}

/// Initialise the global [`tracing`] subscriber.
///
/// The status line (INFO) goes to stdout so scripts can capture it; errors,
/// warnings, and debug diagnostics go to stderr.  Must be called once at
/// program startup, before any logging.
pub fn init_subscriber(verbosity: Verbosity) {
    use tracing_subscriber::fmt::writer::MakeWriterExt as _;
    use tracing_subscriber::{
        Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
    };

    let make_writer = std::io::stdout
        .with_filter(|meta: &tracing::Metadata<'_>| *meta.level() == tracing::Level::INFO)
        .or_else(std::io::stderr);

    let console_layer = fmt::layer()
        .event_format(StatusFormatter)
        .with_writer(make_writer)
        .with_filter(level_filter(verbosity));

    tracing_subscriber::registry().with(console_layer).init();
}
