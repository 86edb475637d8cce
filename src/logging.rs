//! Tracing setup for applications embedding the client

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for the logging system
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directory for rotated log files
    pub log_dir: PathBuf,
    pub file_prefix: String,
    /// Number of daily log files kept
    pub max_files: usize,
    pub log_to_file: bool,
    /// Write file records as JSON lines instead of compact text
    pub json_file: bool,
    /// Filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        let log_dir = dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".gever-client")
            .join("logs");

        Self {
            log_dir,
            file_prefix: "gever-client".to_string(),
            max_files: 5,
            log_to_file: true,
            json_file: false,
            log_level: "info".to_string(),
        }
    }
}

impl LogConfig {
    /// Log to stdout only
    pub fn stdout_only() -> Self {
        Self {
            log_to_file: false,
            ..Self::default()
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

/// Install the global subscriber.
///
/// Records go to stdout and, when enabled, to a daily rotating file in
/// `log_dir`. `RUST_LOG` overrides the configured level, e.g.
/// `RUST_LOG=auth::session=debug,api=debug`.
///
/// # Log Targets
/// - `auth::keys` - Service key loading and lookups
/// - `auth::session` - Token exchange and renewal
/// - `api` - Resource requests
/// - `api::error` - Failed requests with the backend's response
/// - `models` - Model registration and refetches
/// - `context` - Context setup
pub fn init_logging(config: LogConfig) -> Result<LogGuard> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let stdout_layer = fmt::layer()
        .compact()
        .with_target(true)
        .with_line_number(true)
        .with_ansi(true);

    let (file_layer, worker_guard) = if config.log_to_file {
        std::fs::create_dir_all(&config.log_dir).with_context(|| {
            format!("Failed to create log directory {}", config.log_dir.display())
        })?;

        let file_appender = tracing_appender::rolling::RollingFileAppender::builder()
            .rotation(tracing_appender::rolling::Rotation::DAILY)
            .filename_prefix(&config.file_prefix)
            .filename_suffix("log")
            .max_log_files(config.max_files)
            .build(&config.log_dir)
            .context("Failed to create file appender")?;
        let (writer, guard) = tracing_appender::non_blocking(file_appender);

        let layer = if config.json_file {
            fmt::layer()
                .json()
                .with_writer(writer)
                .with_target(true)
                .boxed()
        } else {
            fmt::layer()
                .compact()
                .with_writer(writer)
                .with_target(true)
                .with_thread_ids(true)
                .with_ansi(false)
                .boxed()
        };
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::info!(
        target: "main",
        log_dir = %config.log_dir.display(),
        log_to_file = config.log_to_file,
        log_level = %config.log_level,
        "Logging system initialized"
    );

    Ok(LogGuard {
        _worker_guard: worker_guard,
    })
}

/// Keeps the file writer alive; remaining records are flushed on drop
pub struct LogGuard {
    _worker_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

impl Drop for LogGuard {
    fn drop(&mut self) {
        tracing::debug!(target: "main", "Flushing logs before shutdown");
    }
}
