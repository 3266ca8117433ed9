//! Configuration Module
//!
//! Handles configuration loading from files, environment variables, and command-line arguments.
//! Sources are applied in that order: YAML file, then `FELIX_*` environment variables,
//! then command-line flags. The merged result is validated before use.

use crate::eviction::EvictionAlgorithm;
use crate::ram_cache::DEFAULT_CAPACITY;
use crate::{FelixError, Result};
use clap::{Arg, ArgMatches, Command};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Custom deserializer for PathBuf that expands ~ to home directory
mod pathbuf_serde {
    use serde::{Deserialize, Deserializer};
    use std::path::PathBuf;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PathBuf, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(super::expand_tilde(&s))
    }

    pub fn deserialize_option<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        Ok(s.map(|s| super::expand_tilde(&s)))
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut result = PathBuf::from(home);
            result.push(rest);
            return result;
        }
    }
    PathBuf::from(path)
}

/// Custom (de)serializer for Duration from string format like "30s", "5m", "1h"
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("Empty duration string".to_string());
        }

        // Find where the number ends and the unit begins
        let num_end = s
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_digit() || *c == '.'))
            .map(|(i, _)| i)
            .unwrap_or(s.len());

        if num_end == 0 {
            return Err(format!("No number found in duration string: {}", s));
        }

        let num_str = &s[..num_end];
        let unit = s[num_end..].trim();

        let value: f64 = num_str
            .parse()
            .map_err(|e| format!("Failed to parse number '{}': {}", num_str, e))?;

        let secs = match unit {
            "s" | "sec" | "secs" | "second" | "seconds" => value,
            "m" | "min" | "mins" | "minute" | "minutes" => value * 60.0,
            "h" | "hr" | "hrs" | "hour" | "hours" => value * 3600.0,
            "ms" | "millis" | "millisecond" | "milliseconds" => value / 1000.0,
            "" => value, // Default to seconds if no unit
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|e| format!("Duration out of range '{}': {}", s, e))?;

        Ok(duration)
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the server listens on
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Directory files are served from; request paths resolve beneath it
    #[serde(
        default = "default_root_dir",
        deserialize_with = "pathbuf_serde::deserialize"
    )]
    pub root_dir: PathBuf,
    /// Maximum number of connections handled at once
    #[serde(default = "default_max_concurrent_connections")]
    pub max_concurrent_connections: usize,
    /// Time allowed for a client to send its request
    #[serde(
        default = "default_request_timeout",
        with = "duration_serde"
    )]
    pub request_timeout: Duration,
}

fn default_listen_addr() -> String {
    "127.0.0.1:7070".to_string()
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_max_concurrent_connections() -> usize {
    64
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            root_dir: default_root_dir(),
            max_concurrent_connections: default_max_concurrent_connections(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.listen_addr.trim().is_empty() {
            return Err("Listen address cannot be empty".to_string());
        }

        if self.root_dir.as_os_str().is_empty() {
            return Err("Root directory cannot be empty".to_string());
        }

        if self.max_concurrent_connections == 0 {
            return Err("Max concurrent connections must be at least 1".to_string());
        }

        if self.request_timeout < Duration::from_millis(1) {
            return Err(format!(
                "Request timeout must be at least 1ms, got {:?}",
                self.request_timeout
            ));
        }

        Ok(())
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    /// Maximum resident bytes
    #[serde(default = "default_cache_capacity")]
    pub capacity: u64,
    #[serde(default)]
    pub eviction_algorithm: EvictionAlgorithm,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CAPACITY
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            capacity: default_cache_capacity(),
            eviction_algorithm: EvictionAlgorithm::default(),
        }
    }
}

impl CacheConfig {
    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.enabled && self.capacity == 0 {
            return Err("Cache capacity must be greater than 0 when the cache is enabled".to_string());
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily-rolled application logs; console only when unset
    #[serde(default, deserialize_with = "pathbuf_serde::deserialize_option")]
    pub app_log_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            app_log_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from the process arguments and environment
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args_os())
    }

    /// Load configuration from an explicit argument list (first item is the program name)
    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::build_cli()
            .try_get_matches_from(args)
            .map_err(|e| match e.kind() {
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                    e.exit()
                }
                _ => FelixError::ConfigError(e.to_string()),
            })?;

        let mut config = Self::default();

        // Load from config file if specified
        if let Some(config_path) = matches.get_one::<String>("config") {
            config = Self::load_from_file(config_path)?;
        }

        // Override with environment variables
        config.apply_env_overrides();

        // Override with command line arguments
        config.apply_cli_overrides(&matches)?;

        config.validate()?;

        debug!("Configuration: {:?}", config);
        Ok(config)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        if let Err(e) = self.server.validate() {
            return Err(FelixError::ConfigError(format!(
                "Invalid server configuration: {}",
                e
            )));
        }

        if let Err(e) = self.cache.validate() {
            return Err(FelixError::ConfigError(format!(
                "Invalid cache configuration: {}",
                e
            )));
        }

        Ok(())
    }

    /// Build CLI argument parser
    fn build_cli() -> Command {
        Command::new("felix-server")
            .version(env!("CARGO_PKG_VERSION"))
            .about("File server with a bounded in-memory LRU cache")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path"),
            )
            .arg(
                Arg::new("listen")
                    .short('l')
                    .long("listen")
                    .value_name("ADDR")
                    .help("Listen address (default: 127.0.0.1:7070)"),
            )
            .arg(
                Arg::new("root")
                    .short('r')
                    .long("root")
                    .value_name("DIR")
                    .help("Directory to serve files from (default: .)"),
            )
            .arg(
                Arg::new("cache-capacity")
                    .long("cache-capacity")
                    .value_name("BYTES")
                    .help("Maximum resident cache bytes (default: 67108864)"),
            )
            .arg(
                Arg::new("no-cache")
                    .long("no-cache")
                    .action(clap::ArgAction::SetTrue)
                    .help("Disable the content cache"),
            )
            .arg(
                Arg::new("max-connections")
                    .long("max-connections")
                    .value_name("COUNT")
                    .help("Maximum concurrent connections (default: 64)"),
            )
            .arg(
                Arg::new("log-level")
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level filter (default: info)"),
            )
    }

    /// Load configuration from YAML file
    fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FelixError::ConfigError(format!("Failed to read config file {}: {}", path, e))
        })?;

        let config = Self::from_yaml(&content).map_err(|e| {
            FelixError::ConfigError(format!("Failed to parse config file {}: {}", path, e))
        })?;

        info!("Configuration loaded from file: {}", path);
        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("FELIX_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }

        if let Ok(root_dir) = std::env::var("FELIX_ROOT_DIR") {
            self.server.root_dir = expand_tilde(&root_dir);
        }

        if let Ok(capacity) = std::env::var("FELIX_CACHE_CAPACITY") {
            if let Ok(capacity) = capacity.parse() {
                self.cache.capacity = capacity;
            }
        }

        if let Ok(enabled) = std::env::var("FELIX_CACHE_ENABLED") {
            self.cache.enabled = enabled.to_lowercase() == "true";
        }

        if let Ok(log_level) = std::env::var("FELIX_LOG_LEVEL") {
            self.logging.log_level = log_level;
        }

        if let Ok(app_log_dir) = std::env::var("FELIX_APP_LOG_DIR") {
            self.logging.app_log_dir = Some(expand_tilde(&app_log_dir));
        }
    }

    /// Apply command line overrides
    fn apply_cli_overrides(&mut self, matches: &ArgMatches) -> Result<()> {
        if let Some(addr) = matches.get_one::<String>("listen") {
            self.server.listen_addr = addr.clone();
        }

        if let Some(root) = matches.get_one::<String>("root") {
            self.server.root_dir = expand_tilde(root);
        }

        if let Some(capacity) = matches.get_one::<String>("cache-capacity") {
            self.cache.capacity = capacity.parse().map_err(|e| {
                FelixError::ConfigError(format!("Invalid cache capacity '{}': {}", capacity, e))
            })?;
        }

        if matches.get_flag("no-cache") {
            self.cache.enabled = false;
        }

        if let Some(count) = matches.get_one::<String>("max-connections") {
            self.server.max_concurrent_connections = count.parse().map_err(|e| {
                FelixError::ConfigError(format!("Invalid max connections '{}': {}", count, e))
            })?;
        }

        if let Some(level) = matches.get_one::<String>("log-level") {
            self.logging.log_level = level.clone();
        }

        Ok(())
    }
}
