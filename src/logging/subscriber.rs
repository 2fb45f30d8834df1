//! Tracing subscriber setup: file layer, console formatter and initialisation.
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use super::utils::{LOG_FILE_NAME, format_utc_datetime, format_utc_time, strip_ansi};

/// Environment variable holding an [`EnvFilter`] directive for the log file.
pub const ENV_FILTER_VAR: &str = "RHC_LOG";

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

/// A [`tracing_subscriber::Layer`] appending every event to the log file
/// with a timestamp and ANSI codes stripped.
#[derive(Debug)]
pub(super) struct FileLayer {
    file: Mutex<fs::File>,
}

impl FileLayer {
    /// Open (or create) `<dir>/rhc.log` for appending and write a run header
    /// naming the version and `command`.
    pub(super) fn open(dir: &Path, command: &str) -> std::io::Result<Self> {
        fs::create_dir_all(dir)?;
        let path = dir.join(LOG_FILE_NAME);
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        let version = option_env!("RHC_VERSION").unwrap_or(concat!("dev-", env!("CARGO_PKG_VERSION")));
        write!(
            file,
            "==========================================\n\
             rhc {version} {command} {}\n\
             ==========================================\n",
            format_utc_datetime(),
        )?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for FileLayer {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let level = *event.metadata().level();

        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = strip_ansi(&extractor.message);
        let ts = format_utc_time();

        let line = match level {
            tracing::Level::ERROR => format!("[{ts}] [error] {msg}"),
            tracing::Level::WARN => format!("[{ts}] [warn] {msg}"),
            tracing::Level::DEBUG => format!("[{ts}] [debug] {msg}"),
            tracing::Level::TRACE => format!("[{ts}] [trace] {msg}"),
            tracing::Level::INFO => format!("[{ts}] {msg}"),
        };

        if let Ok(mut f) = self.file.lock() {
            writeln!(f, "{line}").ok();
        }
    }
}

/// A [`tracing_subscriber::fmt::FormatEvent`] for the `--verbose` stderr
/// stream.
struct ConsoleFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for ConsoleFormatter
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
        let mut extractor = MessageExtractor::default();
        event.record(&mut extractor);
        let msg = &extractor.message;

        let ansi = writer.has_ansi_escapes();
        let (color, label) = match *event.metadata().level() {
            tracing::Level::ERROR => ("\x1b[31m", "ERROR"),
            tracing::Level::WARN => ("\x1b[33m", "WARN "),
            tracing::Level::INFO => ("\x1b[32m", "INFO "),
            tracing::Level::DEBUG => ("\x1b[2m", "DEBUG"),
            tracing::Level::TRACE => ("\x1b[2m", "TRACE"),
        };
        if ansi {
            writeln!(writer, "{color}{label}\x1b[0m {msg}")
        } else {
            writeln!(writer, "{label} {msg}")
        }
    }
}

/// How the global subscriber is set up for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Subcommand name written into the run header.
    pub command: String,
    /// Level for the log file unless [`ENV_FILTER_VAR`] is set.
    pub level: tracing::Level,
    /// Directory holding the log file.
    pub dir: PathBuf,
    /// Mirror events at `debug` and above to stderr.
    pub verbose: bool,
    /// Color the stderr stream.
    pub colored: bool,
}

/// Filter for the file layer: [`ENV_FILTER_VAR`] when it parses, `level`
/// otherwise.
fn file_filter(directive: Option<&str>, level: tracing::Level) -> EnvFilter {
    directive
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(level.as_str()))
}

/// Initialise the global [`tracing`] subscriber.
///
/// Events go to the log file described by `settings`. With `verbose`, a
/// stderr layer shows them as well. A log file that cannot be opened is
/// reported on the console layer and otherwise ignored.
/// Must be called once at program startup, before any logging.
pub fn init_subscriber(settings: &LogSettings) {
    use tracing_subscriber::{
        Layer as _, filter::LevelFilter, fmt, layer::SubscriberExt as _,
        util::SubscriberInitExt as _,
    };

    let console_layer = settings.verbose.then(|| {
        fmt::layer()
            .event_format(ConsoleFormatter)
            .with_ansi(settings.colored)
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::DEBUG)
    });

    let directive = std::env::var(ENV_FILTER_VAR).ok();
    let (file_layer, open_error) = match FileLayer::open(&settings.dir, &settings.command) {
        Ok(layer) => (
            Some(layer.with_filter(file_filter(directive.as_deref(), settings.level))),
            None,
        ),
        Err(e) => (None, Some(e)),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(e) = open_error {
        tracing::debug!(
            "cannot open log file in {}: {e}",
            settings.dir.display()
        );
    }
}
