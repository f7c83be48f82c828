//! ``src/logging.rs``
//! ============================================================================
//! Tracing initialization for the embedding application.
//!
//! JSON-formatted events to a rolling file, level controlled by `RUST_LOG`
//! with the configured level as fallback. The tree modules only emit
//! `tracing` events (markers: `TREE_BUILD`, `TREE_FILTER`, `TREE_REVEAL`,
//! `TREE_ANOMALY`); wiring a subscriber is the host's choice and tests run
//! without one.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    pub file_prefix: CompactString,

    /// Fallback level filter when `RUST_LOG` is unset.
    pub level: CompactString,

    pub rotation: LogRotation,

    /// How long buffered lines may sit before the worker flushes them.
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("./logs"),
            file_prefix: CompactString::const_new("wex"),
            level: CompactString::const_new("info"),
            rotation: LogRotation::Daily,
            flush_interval: Duration::from_millis(25),
        }
    }
}

/// Install the global subscriber. Returns the appender guard; dropping it
/// flushes and stops the background writer, so the host keeps it alive for
/// the process lifetime.
pub fn init_tracing(config: &LogConfig) -> Result<WorkerGuard> {
    fs::create_dir_all(&config.log_dir).with_context(|| {
        format!("failed to create log directory {}", config.log_dir.display())
    })?;

    let rotation: Rotation = match config.rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Daily => Rotation::DAILY,
    };

    let appender: RollingFileAppender =
        RollingFileAppender::new(rotation, &config.log_dir, config.file_prefix.as_str());
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter: EnvFilter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.level.as_str()))
        .with_context(|| format!("invalid log level {:?}", config.level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer),
        )
        .try_init()
        .context("tracing subscriber already initialized")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrips() {
        let config = LogConfig::default();
        let raw = toml::to_string_pretty(&config).unwrap();
        let back: LogConfig = toml::from_str(&raw).unwrap();

        assert_eq!(back.file_prefix, "wex");
        assert_eq!(back.rotation, LogRotation::Daily);
        assert_eq!(back.flush_interval, Duration::from_millis(25));
    }
}
