//! Bridge from the `log` facade to a host-supplied logger.
//!
//! The host (a browser console, a test harness) implements [`Logger`] and
//! installs it once with [`set_logger`]. Debug and trace records from other
//! crates are dropped.

use std::sync::{Arc, OnceLock};

/// Receives log messages emitted by `passkeykit`.
///
/// # Examples
///
/// ```rust
/// use passkeykit_core::logger::{LogLevel, Logger};
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
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Very detailed tracing.
    Trace,
    /// Debugging information.
    Debug,
    /// Progress of an operation.
    Info,
    /// Something unexpected that was recovered from.
    Warn,
    /// An operation failed.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

struct ForeignLogger;

/// Whether a record should reach the host logger.
fn is_forwarded(level: log::Level, module_path: Option<&str>) -> bool {
    let is_own = module_path.is_some_and(|path| path.starts_with("passkeykit"));
    let is_verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    is_own || !is_verbose
}

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !is_forwarded(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), record.args().to_string());
        }
    }

    fn flush(&self) {}
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs `logger` as the destination for all `passkeykit` log output.
///
/// Only the first call has an effect.
pub fn set_logger(logger: Arc<dyn Logger>) {
    static LOGGER: ForeignLogger = ForeignLogger;

    if LOGGER_INSTANCE.set(logger).is_err() {
        log::debug!("logger already set");
        return;
    }
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Trace);
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(log::Level::Debug, Some("passkeykit_core::broker"), true ; "own debug")]
    #[test_case(log::Level::Trace, Some("passkeykit_wasm"), true ; "own trace")]
    #[test_case(log::Level::Debug, Some("alloy_signer"), false ; "foreign debug")]
    #[test_case(log::Level::Trace, None, false ; "unknown trace")]
    #[test_case(log::Level::Warn, Some("alloy_signer"), true ; "foreign warn")]
    #[test_case(log::Level::Error, None, true ; "unknown error")]
    fn test_is_forwarded(level: log::Level, module_path: Option<&str>, expected: bool) {
        assert_eq!(is_forwarded(level, module_path), expected);
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(LogLevel::from(log::Level::Warn), LogLevel::Warn);
        assert_eq!(LogLevel::from(log::Level::Trace), LogLevel::Trace);
    }
}
