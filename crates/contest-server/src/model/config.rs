//! Configuration management for the contest binary
//!
//! Sources, lowest precedence first: the YAML file (optional), `CONTEST_*`
//! environment variables, then command line flags.

use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use contest_common::ValidationPolicy;
use contest_persistence::{
    DEFAULT_COMPACT_THRESHOLD, DEFAULT_DATA_DIR, DEFAULT_LOCK_TIMEOUT, StorageMode, StoreOptions,
};

use super::constants::{
    COMPACT_THRESHOLD, DEFAULT_LOG_LEVEL, ENV_PREFIX, ENV_PREFIX_SEPARATOR, ENV_SEPARATOR,
    LOCK_TIMEOUT_MS, LOGS_CONSOLE, LOGS_FILE, LOGS_LEVEL, LOGS_PATH, LOGS_ROTATION,
    MEDIA_REF_MAX_LEN, STORAGE_MODE, STORAGE_PATH, TITLE_MAX_LEN,
};
use crate::cli::Cli;
use crate::startup::{LogRotation, LoggingConfig};

/// Application configuration loaded from the config file, environment and flags
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    pub fn new(cli: &Cli) -> anyhow::Result<Self> {
        let mut config_builder = Config::builder()
            .add_source(File::with_name(&cli.config_file).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator(ENV_PREFIX_SEPARATOR)
                    .separator(ENV_SEPARATOR)
                    .try_parsing(true),
            );

        if let Some(v) = &cli.storage_mode {
            config_builder = config_builder.set_override(STORAGE_MODE, v.as_str())?;
        }
        if let Some(v) = &cli.data_dir {
            config_builder = config_builder.set_override(STORAGE_PATH, v.as_str())?;
        }
        if let Some(v) = &cli.log_level {
            config_builder = config_builder.set_override(LOGS_LEVEL, v.as_str())?;
        }

        let app_config = config_builder.build().map_err(|e| {
            anyhow::anyhow!(
                "Failed to build configuration from {}: {}",
                cli.config_file,
                e
            )
        })?;

        Ok(Configuration { config: app_config })
    }

    // ========================================================================
    // Storage Configuration
    // ========================================================================

    pub fn storage_mode(&self) -> anyhow::Result<StorageMode> {
        match optional(STORAGE_MODE, self.config.get_string(STORAGE_MODE))? {
            Some(mode) => mode.parse().map_err(|e: String| anyhow::anyhow!(e)),
            None => Ok(StorageMode::default()),
        }
    }

    pub fn storage_path(&self) -> anyhow::Result<PathBuf> {
        Ok(optional(STORAGE_PATH, self.config.get_string(STORAGE_PATH))?
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)))
    }

    pub fn lock_timeout(&self) -> anyhow::Result<Duration> {
        match optional(LOCK_TIMEOUT_MS, self.config.get_int(LOCK_TIMEOUT_MS))? {
            Some(ms) if ms > 0 => Ok(Duration::from_millis(ms as u64)),
            Some(ms) => anyhow::bail!("{} must be positive, got {}", LOCK_TIMEOUT_MS, ms),
            None => Ok(DEFAULT_LOCK_TIMEOUT),
        }
    }

    /// Stale journal writes tolerated before the journal is compacted on open
    pub fn compact_threshold(&self) -> anyhow::Result<usize> {
        self.positive_len(COMPACT_THRESHOLD, DEFAULT_COMPACT_THRESHOLD)
    }

    pub fn store_options(&self) -> anyhow::Result<StoreOptions> {
        Ok(StoreOptions {
            mode: self.storage_mode()?,
            path: self.storage_path()?,
            lock_timeout: self.lock_timeout()?,
            compact_threshold: self.compact_threshold()?,
        })
    }

    // ========================================================================
    // Validation Configuration
    // ========================================================================

    pub fn validation_policy(&self) -> anyhow::Result<ValidationPolicy> {
        let defaults = ValidationPolicy::default();
        Ok(ValidationPolicy {
            title_max_len: self.positive_len(TITLE_MAX_LEN, defaults.title_max_len)?,
            media_ref_max_len: self.positive_len(MEDIA_REF_MAX_LEN, defaults.media_ref_max_len)?,
        })
    }

    fn positive_len(&self, key: &str, default: usize) -> anyhow::Result<usize> {
        match optional(key, self.config.get_int(key))? {
            Some(len) if len > 0 => Ok(len as usize),
            Some(len) => anyhow::bail!("{} must be positive, got {}", key, len),
            None => Ok(default),
        }
    }

    // ========================================================================
    // Logging Configuration
    // ========================================================================

    pub fn logging_config(&self) -> anyhow::Result<LoggingConfig> {
        let level = optional(LOGS_LEVEL, self.config.get_string(LOGS_LEVEL))?
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let rotation: LogRotation = match optional(LOGS_ROTATION, self.config.get_string(LOGS_ROTATION))? {
            Some(rotation) => rotation.parse().map_err(|e: String| anyhow::anyhow!(e))?,
            None => LogRotation::default(),
        };
        Ok(LoggingConfig::from_config(
            optional(LOGS_PATH, self.config.get_string(LOGS_PATH))?,
            optional(LOGS_CONSOLE, self.config.get_bool(LOGS_CONSOLE))?.unwrap_or(true),
            optional(LOGS_FILE, self.config.get_bool(LOGS_FILE))?.unwrap_or(false),
            &level,
            rotation,
        ))
    }
}

/// A missing key means "use the default"; a present but malformed one is an error
fn optional<T>(key: &str, value: Result<T, ConfigError>) -> anyhow::Result<Option<T>> {
    match value {
        Ok(v) => Ok(Some(v)),
        Err(ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(anyhow::anyhow!("invalid value for {}: {}", key, e)),
    }
}
