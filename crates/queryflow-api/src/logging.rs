//! Logging configuration for QueryFlow
//!
//! The engine emits `tracing` events: a `debug!` per pipeline stage, an
//! `info!` per executed statement and `warn!` for statements that do not
//! execute. This module wires them to stdout and/or a daily rolling file.

use std::fmt;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt};
use tracing_subscriber::{EnvFilter, Layer, Registry};

const DEFAULT_LOG_FILE: &str = "queryflow.log";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Log output destination
#[derive(Debug, Clone)]
pub enum LogOutput {
    /// Output to stdout
    Stdout,
    /// Output to a file with daily rotation
    File(PathBuf),
    /// Output to both stdout and file
    Both(PathBuf),
}

/// Log format style
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format (default)
    Pretty,
    /// Compact single-line format
    Compact,
}

/// Failure to install the global subscriber
#[derive(Debug)]
pub enum LogInitError {
    /// The level string is not a valid filter directive
    InvalidLevel(String),
    /// A global subscriber was already installed
    AlreadyInitialized,
}

impl fmt::Display for LogInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogInitError::InvalidLevel(level) => write!(f, "Invalid log level: {}", level),
            LogInitError::AlreadyInitialized => write!(f, "Logging already initialized"),
        }
    }
}

impl std::error::Error for LogInitError {}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level filter, overridden by `RUST_LOG` when set
    pub level: String,
    /// Output destination
    pub output: LogOutput,
    /// Format style
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
            format: LogFormat::Pretty,
        }
    }
}

impl LogConfig {
    /// Create config with info level and stdout output
    pub fn info() -> Self {
        Self::default()
    }

    /// Create config with debug level, which traces every pipeline stage
    pub fn debug() -> Self {
        Self {
            level: "debug".to_string(),
            ..Default::default()
        }
    }

    /// Create config with warn level
    pub fn warn() -> Self {
        Self {
            level: "warn".to_string(),
            ..Default::default()
        }
    }

    /// Set log output to file with rotation
    pub fn with_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::File(path.into());
        self
    }

    /// Set log output to both stdout and file
    pub fn with_both<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = LogOutput::Both(path.into());
        self
    }

    /// Set log format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set log level filter
    pub fn with_level<S: Into<String>>(mut self, level: S) -> Self {
        self.level = level.into();
        self
    }

    fn env_filter(&self) -> Result<EnvFilter, LogInitError> {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .map_err(|_| LogInitError::InvalidLevel(self.level.clone()))
    }

    /// Initialize global logging with this configuration
    ///
    /// Returns a guard when logging to a file. Keep it alive for the lifetime
    /// of the application; dropping it flushes and stops the writer thread.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use queryflow::logging::LogConfig;
    ///
    /// let _guard = LogConfig::info().init()?;
    /// # Ok::<(), queryflow::logging::LogInitError>(())
    /// ```
    pub fn init(self) -> Result<Option<WorkerGuard>, LogInitError> {
        let env_filter = self.env_filter()?;

        let mut layers: Vec<BoxedLayer> = Vec::new();
        let mut guard = None;

        if matches!(self.output, LogOutput::Stdout | LogOutput::Both(_)) {
            layers.push(format_layer(self.format, std::io::stdout, true));
        }
        if let LogOutput::File(path) | LogOutput::Both(path) = &self.output {
            let file_appender =
                tracing_appender::rolling::daily(log_directory(path), log_file_name(path));
            let (non_blocking, worker_guard) = tracing_appender::non_blocking(file_appender);
            layers.push(format_layer(self.format, non_blocking, false));
            guard = Some(worker_guard);
        }

        tracing_subscriber::registry()
            .with(layers)
            .with(env_filter)
            .try_init()
            .map_err(|_| LogInitError::AlreadyInitialized)?;

        Ok(guard)
    }
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_fmt::layer().with_writer(writer).with_ansi(ansi);
    match format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    }
}

fn log_directory(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn log_file_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert_eq!(config.level, "info");
        assert!(matches!(config.output, LogOutput::Stdout));
        assert_eq!(config.format, LogFormat::Pretty);
    }

    #[test]
    fn test_log_config_builders() {
        let config = LogConfig::debug()
            .with_file("/tmp/queryflow-test.log")
            .with_format(LogFormat::Compact);
        assert_eq!(config.level, "debug");
        assert!(matches!(config.output, LogOutput::File(_)));
        assert_eq!(config.format, LogFormat::Compact);

        let config = LogConfig::warn().with_both("run.log").with_level("trace");
        assert_eq!(config.level, "trace");
        assert!(matches!(config.output, LogOutput::Both(_)));
    }

    #[test]
    fn test_log_paths() {
        assert_eq!(log_directory(Path::new("run.log")), Path::new("."));
        assert_eq!(log_directory(Path::new("/var/log/qf.log")), Path::new("/var/log"));
        assert_eq!(log_file_name(Path::new("/var/log/qf.log")), "qf.log");
        assert_eq!(log_file_name(Path::new("/")), DEFAULT_LOG_FILE);
    }
}
