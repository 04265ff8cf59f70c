//! Tracing subscriber initialisation for binaries embedding the engine.

use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use waypoint_core::{Error, Result};

const DEFAULT_FILTER: &str = "waypoint_engine=info,waypoint_core=info";
const DEFAULT_LOG_FILE_NAME: &str = "waypoint.log";

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub format: LogFormat,
    /// Log file path; daily rotation. `None` logs to stdout.
    pub file: Option<PathBuf>,
    /// ANSI colour override. Files default to no colour.
    pub ansi: Option<bool>,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            file: None,
            ansi: None,
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

impl LogConfig {
    /// Load `.env`, then read logging settings from the environment.
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `LOG_FORMAT` | `text` | `json` or `text` |
    /// | `LOG_FILE` | unset | Log file path, enables file logging |
    /// | `LOG_ANSI` | auto | `true`/`false` colour override |
    /// | `RUST_LOG` | `waypoint_engine=info,waypoint_core=info` | Env filter |
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            format: lookup("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
            file: lookup("LOG_FILE").map(PathBuf::from),
            ansi: lookup("LOG_ANSI").map(|v| v == "true" || v == "1"),
            default_filter: DEFAULT_FILTER.to_string(),
        }
    }
}

/// Install the global tracing subscriber.
///
/// Returns the file writer guard when logging to a file; keep it alive for
/// the life of the process or buffered lines are lost. Fails if a global
/// subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    let guard = if let Some(path) = &config.file {
        let dir = path.parent().unwrap_or(Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(DEFAULT_LOG_FILE_NAME);
        let file_appender = tracing_appender::rolling::daily(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        match config.format {
            LogFormat::Json => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .try_init(),
            LogFormat::Text => registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(config.ansi.unwrap_or(false)),
                )
                .try_init(),
        }
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))?;
        Some(guard)
    } else {
        match config.format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init(),
            LogFormat::Text => {
                let mut layer = tracing_subscriber::fmt::layer();
                if let Some(ansi) = config.ansi {
                    layer = layer.with_ansi(ansi);
                }
                registry.with(layer).try_init()
            }
        }
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))?;
        None
    };

    info!(
        log_format = ?config.format,
        log_file = config
            .file
            .as_deref()
            .and_then(Path::to_str)
            .unwrap_or("(stdout)"),
        "Logging initialized"
    );
    Ok(guard)
}
