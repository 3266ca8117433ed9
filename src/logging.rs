//! Logging Module
//!
//! Sets up application logging: a compact console layer and, when a log
//! directory is configured, a daily-rolled file layer. `RUST_LOG` overrides
//! the configured level.

use crate::config::LoggingConfig;
use crate::{FelixError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file name prefix inside the log directory
const LOG_FILE_PREFIX: &str = "felix.log";

/// Logger manager for application logging
pub struct LoggerManager {
    pub config: LoggingConfig,
}

impl LoggerManager {
    /// Create a new logger manager
    pub fn new(config: LoggingConfig) -> Self {
        Self { config }
    }

    /// Initialize the logging system
    pub fn initialize(&self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.config.log_level))
            .map_err(|e| {
                FelixError::ConfigError(format!(
                    "Invalid log level '{}': {}",
                    self.config.log_level, e
                ))
            })?;

        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(true)
            .with_target(false)
            .with_level(true)
            .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
            .compact();

        // Option<Layer> is itself a layer, so the file output is simply absent when unset
        let file_layer = match &self.config.app_log_dir {
            Some(dir) => {
                let file_appender = Self::file_appender(dir)?;
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true)
                        .with_level(true)
                        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                        .compact(),
                )
            }
            None => None,
        };

        // Try to set global subscriber, but don't fail if already set (for tests)
        let result = tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init();

        match result {
            Ok(_) => {
                info!("Logging system initialized (level: {})", self.config.log_level);
                if let Some(dir) = &self.config.app_log_dir {
                    info!("Application logs will be written to: {:?}", dir);
                }
            }
            Err(_) => {
                debug!("Tracing subscriber already initialized, skipping");
            }
        }

        Ok(())
    }

    fn file_appender(dir: &Path) -> Result<RollingFileAppender> {
        std::fs::create_dir_all(dir).map_err(|e| {
            FelixError::IoError(format!(
                "Failed to create app log directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(RollingFileAppender::new(
            Rotation::DAILY,
            dir,
            LOG_FILE_PREFIX,
        ))
    }

    /// Directory application logs are written to, if any
    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.config.app_log_dir.as_ref()
    }
}
