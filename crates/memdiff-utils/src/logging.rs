//! # Logging Utilities
//!
//! Logging infrastructure for memdiff using `tracing`.
//!
//! Comparison runs are multi-threaded, so every layer configured here records
//! thread names and ids; worker threads are named `memdiff-worker-<n>`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use memdiff_utils::init_logging;
//!
//! // Keep the guard alive for as long as logs should be flushed to file
//! let _guard = init_logging().expect("Failed to initialize logging");
//!
//! tracing::info!("comparison started");
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Log level filter (e.g. `RUST_LOG=debug`, `RUST_LOG=memdiff_core=trace`)
//! - `MEMDIFF_LOG_FORMAT`: Output format (`json` or `pretty`, default: `pretty`)
//! - `MEMDIFF_LOG_FILE`: Optional path to a log file, rolled daily

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::{env, io};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::fmt::{self, MakeWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

const FORMAT_VAR: &str = "MEMDIFF_LOG_FORMAT";
const FILE_VAR: &str = "MEMDIFF_LOG_FILE";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat
{
    /// Pretty-printed, human-readable format (default)
    #[default]
    Pretty,
    /// JSON lines, one event per line
    Json,
}

impl FromStr for LogFormat
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "pretty" | "dev" | "text" => Ok(LogFormat::Pretty),
            "json" | "prod" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel
{
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level, reports every differing symbolic path
    Debug,
    /// Trace level, reports dedup and depth-limit drops
    Trace,
}

impl From<LogLevel> for Level
{
    fn from(level: LogLevel) -> Self
    {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl FromStr for LogLevel
{
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "error" | "err" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" | "dbg" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(LoggingError::InvalidLevel(s.to_string())),
        }
    }
}

/// Keeps the background file writer alive.
///
/// Dropping the guard flushes and stops file logging; console logging is
/// unaffected.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug, Default)]
pub struct LoggingGuard
{
    file: Option<WorkerGuard>,
}

impl LoggingGuard
{
    /// Whether a file sink was configured.
    pub fn has_file_sink(&self) -> bool
    {
        self.file.is_some()
    }
}

/// Initialize logging from the environment
///
/// `MEMDIFF_LOG_FORMAT` selects the format, `RUST_LOG` the filter (default
/// `info`) and `MEMDIFF_LOG_FILE` an optional additional file sink.
///
/// ## Errors
///
/// Returns an error if a global subscriber is already installed, if
/// `MEMDIFF_LOG_FORMAT` holds an unknown format, or if the log file
/// directory cannot be created.
pub fn init_logging() -> Result<LoggingGuard, LoggingError>
{
    let format = match env::var(FORMAT_VAR) {
        Ok(value) if !value.trim().is_empty() => value.parse()?,
        _ => LogFormat::default(),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string()));
    install(format, &filter, env::var(FILE_VAR).ok().map(PathBuf::from))
}

/// Initialize logging with an explicit level and format
///
/// `RUST_LOG` is ignored; `MEMDIFF_LOG_FILE` is still honoured.
///
/// ## Example
///
/// ```rust,no_run
/// use memdiff_utils::{init_logging_with_level, LogFormat, LogLevel};
///
/// let _guard = init_logging_with_level(LogLevel::Debug, LogFormat::Json).expect("Failed to initialize logging");
/// ```
///
/// ## Errors
///
/// Returns an error if logging is already initialized or the log file
/// directory cannot be created.
pub fn init_logging_with_level(level: LogLevel, format: LogFormat) -> Result<LoggingGuard, LoggingError>
{
    let filter = EnvFilter::new(Level::from(level).to_string());
    install(format, &filter, env::var(FILE_VAR).ok().map(PathBuf::from))
}

fn install(format: LogFormat, filter: &EnvFilter, log_file: Option<PathBuf>) -> Result<LoggingGuard, LoggingError>
{
    let mut layers: Vec<BoxedLayer> = vec![fmt_layer(format, io::stdout, true, filter.clone())];
    let mut guard = LoggingGuard::default();

    if let Some(path) = log_file {
        let (directory, file_name) = split_log_path(&path)?;
        std::fs::create_dir_all(&directory)?;
        let appender = tracing_appender::rolling::daily(directory, file_name);
        let (writer, worker) = tracing_appender::non_blocking(appender);
        layers.push(fmt_layer(format, writer, false, filter.clone()));
        guard.file = Some(worker);
    }

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|err| LoggingError::InitializationFailed(err.to_string()))?;
    Ok(guard)
}

fn fmt_layer<W>(format: LogFormat, writer: W, ansi: bool, filter: EnvFilter) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_timer(ChronoUtc::rfc_3339());

    match format {
        LogFormat::Pretty => layer.with_ansi(ansi).with_filter(filter).boxed(),
        LogFormat::Json => layer
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(filter)
            .boxed(),
    }
}

fn split_log_path(path: &Path) -> Result<(PathBuf, PathBuf), LoggingError>
{
    let file_name = path
        .file_name()
        .ok_or_else(|| LoggingError::InitializationFailed(format!("log path {} has no file name", path.display())))?;
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((directory, PathBuf::from(file_name)))
}

/// Logging initialization error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError
{
    /// Invalid log format
    #[error("Invalid log format: {0}. Use 'pretty' or 'json'")]
    InvalidFormat(String),

    /// Invalid log level
    #[error("Invalid log level: {0}. Use 'error', 'warn', 'info', 'debug', or 'trace'")]
    InvalidLevel(String),

    /// Failed to initialize logging
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// File logging error
    #[error("File logging error: {0}")]
    FileError(#[from] io::Error),
}
