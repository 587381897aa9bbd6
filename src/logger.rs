//! Logging setup for the scan matcher binaries, benches and host applications
//!
//! Installs a `tracing-subscriber` fmt subscriber with a compact bracketed format.
//! The per-iteration solver table is emitted at DEBUG level, so `RUST_LOG=debug`
//! shows every Levenberg-Marquardt step.

use tracing::Level;
use tracing_subscriber::util::TryInitError;

/// Initialize the tracing subscriber with the default INFO level
///
/// Format: `[LEVEL YYYY-MM-DD HH:MM:SS module]` for INFO/WARN/ERROR
///         `[LEVEL YYYY-MM-DD HH:MM:SS file:line]` for DEBUG/TRACE
///
/// A subscriber that is already installed is left in place.
///
/// # Example
/// ```no_run
/// use apex_scan_matcher::init_logger;
///
/// init_logger();
/// tracing::info!("Matcher started");
/// ```
///
/// # Environment Variables
/// Override the default log level using `RUST_LOG`:
/// ```bash
/// RUST_LOG=debug cargo run --features cli --bin match_synthetic_scan
/// RUST_LOG=apex_scan_matcher::optimizer=debug cargo bench
/// ```
pub fn init_logger() {
    init_logger_with_level(Level::INFO)
}

/// Initialize the tracing subscriber with a custom default level
///
/// # Arguments
/// * `default_level` - The default log level (overrideable via RUST_LOG)
///
/// # Example
/// ```no_run
/// use apex_scan_matcher::init_logger_with_level;
/// use tracing::Level;
///
/// init_logger_with_level(Level::DEBUG);
/// tracing::debug!("Debug logging enabled");
/// ```
pub fn init_logger_with_level(default_level: Level) {
    if let Err(e) = try_init_logger_with_level(default_level) {
        tracing::debug!("Logger already initialized: {}", e);
    }
}

/// Like [`init_logger_with_level`], but reports a subscriber that is already installed.
pub fn try_init_logger_with_level(default_level: Level) -> Result<(), TryInitError> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(BracketFormatter))
        .try_init()
}

/// Event formatter: `[LEVEL timestamp location] message`
struct BracketFormatter;

impl<S, N> tracing_subscriber::fmt::FormatEvent<S, N> for BracketFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: tracing_subscriber::fmt::format::Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        use chrono::Local;

        let metadata = event.metadata();
        let level = metadata.level();

        write!(writer, "[")?;

        match *level {
            Level::ERROR => write!(writer, "\x1b[31mERROR\x1b[0m ")?,
            Level::WARN => write!(writer, "\x1b[33mWARN\x1b[0m ")?,
            Level::INFO => write!(writer, "\x1b[32mINFO\x1b[0m ")?,
            Level::DEBUG => write!(writer, "\x1b[34mDEBUG\x1b[0m ")?,
            Level::TRACE => write!(writer, "\x1b[35mTRACE\x1b[0m ")?,
        }

        write!(writer, "{} ", Local::now().format("%Y-%m-%d %H:%M:%S"))?;

        // DEBUG/TRACE point at the source line, the rest at the module
        match (*level, metadata.file()) {
            (Level::DEBUG | Level::TRACE, Some(file)) => {
                let filename = file.rsplit('/').next().unwrap_or(file);
                write!(writer, "{}", filename)?;
                if let Some(line) = metadata.line() {
                    write!(writer, ":{}", line)?;
                }
            }
            _ => {
                let target = metadata.target();
                let module = target.strip_prefix("apex_scan_matcher::").unwrap_or(target);
                write!(writer, "{}", module)?;
            }
        }

        write!(writer, "] ")?;

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
