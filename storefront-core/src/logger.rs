//! Bridge from the `log` facade to a logger supplied by the embedding application.
//!
//! Applications that already own a logging pipeline register a [`Logger`] once
//! with [`set_logger`]; every record emitted by this crate is then forwarded to it.

use std::sync::{Arc, OnceLock};

/// Receives log messages emitted by `storefront-core`.
///
/// # Examples
///
/// ```rust
/// use storefront_core::logger::{LogLevel, Logger};
///
/// struct StderrLogger;
///
/// impl Logger for StderrLogger {
///     fn log(&self, level: LogLevel, message: String) {
///         eprintln!("[{level:?}] {message}");
///     }
/// }
/// ```
pub trait Logger: Sync + Send {
    /// Logs a message at the specified log level.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a forwarded log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LogLevel {
    /// Very low priority, extremely detailed messages.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of the application.
    Info,
    /// Potentially harmful situations.
    Warn,
    /// Errors that still allow the application to continue running.
    Error,
}

/// `log::Log` implementation forwarding records to the registered [`Logger`].
struct HostLogger;

impl log::Log for HostLogger {
    /// Every level is enabled; filtering happens in [`should_forward`].
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    /// Forwards the record to the registered logger, or prints it to stderr
    /// when none has been registered yet.
    fn log(&self, record: &log::Record) {
        if !should_forward(record.module_path(), record.level()) {
            return;
        }

        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(log_level(record.level()), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    /// Nothing is buffered here; the host logger owns flushing.
    fn flush(&self) {}
}

/// Debug and trace records from dependencies (reqwest, hyper, ...) are dropped.
fn should_forward(module_path: Option<&str>, level: log::Level) -> bool {
    let is_from_storefront =
        module_path.is_some_and(|path| path.starts_with("storefront"));
    let is_debug_or_trace = level == log::Level::Debug || level == log::Level::Trace;
    is_from_storefront || !is_debug_or_trace
}

/// Maps a `log` level to the level exposed to the host.
const fn log_level(level: log::Level) -> LogLevel {
    match level {
        log::Level::Error => LogLevel::Error,
        log::Level::Warn => LogLevel::Warn,
        log::Level::Info => LogLevel::Info,
        log::Level::Debug => LogLevel::Debug,
        log::Level::Trace => LogLevel::Trace,
    }
}

/// The logger registered through [`set_logger`]. Set at most once.
static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Registers the application logger and installs the `log` bridge.
///
/// Only the first registration wins; later calls print a notice and do nothing.
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        eprintln!("Logger already set");
        return;
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

/// Installs [`HostLogger`] as the global `log` logger at trace level.
///
/// # Errors
///
/// Returns an error if another `log` logger was installed first.
fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: HostLogger = HostLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
