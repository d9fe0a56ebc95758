//! Structured logging configuration using tracing
//!
//! The level filter sits behind a `reload` layer so executors can change the
//! verbosity of a running process through `Executor::set_log_level`.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, Registry};

static LEVEL_HANDLE: OnceLock<reload::Handle<LevelFilter, Registry>> = OnceLock::new();

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub(crate) fn as_u8(self) -> u8 {
        match self {
            LogLevel::Off => 0,
            LogLevel::Error => 1,
            LogLevel::Warn => 2,
            LogLevel::Info => 3,
            LogLevel::Debug => 4,
            LogLevel::Trace => 5,
        }
    }

    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            0 => LogLevel::Off,
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl From<&str> for LogLevel {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "none" | "off" => LogLevel::Off,
            "critical" | "error" => LogLevel::Error,
            "warn" | "warning" => LogLevel::Warn,
            "info" => LogLevel::Info,
            "debug" => LogLevel::Debug,
            "trace" => LogLevel::Trace,
            _ => LogLevel::Info, // Default
        }
    }
}

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
        }
    }
}

/// Initialize logging with the given configuration
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let (filter, handle) = reload::Layer::new(LevelFilter::from(config.level));

    match config.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_span_events(FmtSpan::CLOSE) // Only log on span close
                        .with_writer(std::io::stderr), // Write to stderr, no buffering
                )
                .try_init()?;
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_span_events(FmtSpan::CLOSE)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    let _ = LEVEL_HANDLE.set(handle);

    Ok(())
}

/// Change the process-wide log level.
///
/// Returns `Ok(false)` when logging was never initialized through
/// [`init_logging`], in which case there is no filter to update.
pub fn set_global_level(level: LogLevel) -> anyhow::Result<bool> {
    match LEVEL_HANDLE.get() {
        Some(handle) => {
            handle.modify(|filter| *filter = LevelFilter::from(level))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_from_str() {
        let level: LogLevel = "error".into();
        assert!(matches!(level, LogLevel::Error));

        let level: LogLevel = "INFO".into();
        assert!(matches!(level, LogLevel::Info));

        let level: LogLevel = "warning".into();
        assert!(matches!(level, LogLevel::Warn));

        let level: LogLevel = "none".into();
        assert!(matches!(level, LogLevel::Off));

        // Unknown defaults to Info
        let level: LogLevel = "unknown".into();
        assert!(matches!(level, LogLevel::Info));
    }

    #[test]
    fn test_log_level_to_level_filter() {
        let level: LevelFilter = LogLevel::Error.into();
        assert_eq!(level, LevelFilter::ERROR);

        let level: LevelFilter = LogLevel::Off.into();
        assert_eq!(level, LevelFilter::OFF);

        let level: LevelFilter = LogLevel::Debug.into();
        assert_eq!(level, LevelFilter::DEBUG);
    }

    #[test]
    fn test_log_level_u8_round_trip() {
        for level in [
            LogLevel::Off,
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ] {
            assert_eq!(LogLevel::from_u8(level.as_u8()), level);
        }
    }

    #[test]
    fn test_default_log_config() {
        let config = LogConfig::default();
        assert!(matches!(config.level, LogLevel::Info));
        assert!(matches!(config.format, LogFormat::Json));
    }
}
