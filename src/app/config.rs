//! Configuration for the gateway

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::parser::grammar::{is_name_byte, DEFAULT_CONTENT_CAP, DEFAULT_NAME_CAP};
use crate::parser::Limits;
use crate::store::{LockPolicy, DEFAULT_STALENESS_MS};
use crate::telemetry::DEFAULT_VARIABLE;

/// Gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Parser length caps
    pub parser: ParserConfig,
    /// Store freshness and locking
    pub store: StoreConfig,
    /// Change notification queue
    pub notify: NotifyConfig,
    /// Telemetry variable handling
    pub telemetry: TelemetryConfig,
}

/// Parser length caps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum name length
    pub name_cap: usize,
    /// Maximum content length, delimiters excluded
    pub content_cap: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            name_cap: DEFAULT_NAME_CAP,
            content_cap: DEFAULT_CONTENT_CAP,
        }
    }
}

impl ParserConfig {
    pub fn limits(&self) -> Limits {
        Limits {
            name_cap: self.name_cap,
            content_cap: self.content_cap,
        }
    }
}

/// Store freshness and locking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Age in ms after which an entry is evicted on the next dump
    pub staleness_ms: u64,
    /// Longest wait for the lock when committing a variable
    pub write_wait_ms: u64,
    /// Longest wait for the lock when reading
    pub read_wait_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            staleness_ms: DEFAULT_STALENESS_MS,
            write_wait_ms: 5,
            read_wait_ms: 50,
        }
    }
}

impl StoreConfig {
    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            write_wait: Duration::from_millis(self.write_wait_ms),
            read_wait: Duration::from_millis(self.read_wait_ms),
        }
    }
}

/// Change notification queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Names queued before new ones are dropped
    pub capacity: usize,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self { capacity: 16 }
    }
}

/// Telemetry variable handling
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Variable holding the compressed telemetry record
    pub variable: String,
    /// Name prefixes that bypass the store (history download)
    pub excluded_prefixes: Vec<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            variable: DEFAULT_VARIABLE.to_string(),
            excluded_prefixes: vec!["h".to_string()],
        }
    }
}

impl TelemetryConfig {
    /// Whether `name` is routed around the store
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && name.starts_with(prefix.as_str()))
    }
}

/// Largest accepted `parser.name_cap`
pub const MAX_NAME_CAP: usize = 64;

/// Largest accepted `parser.content_cap`
pub const MAX_CONTENT_CAP: usize = 64 * 1024;

impl Config {
    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Save configuration to a file, refusing one that would not load back
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        self.validate()?;
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// `$HOME/.config/sbms-gateway/config.json`
    pub fn default_path() -> Option<PathBuf> {
        let home = std::env::var_os("HOME")?;
        Some(
            PathBuf::from(home)
                .join(".config")
                .join("sbms-gateway")
                .join("config.json"),
        )
    }

    /// Load from [`default_path`](Self::default_path), falling back to the
    /// defaults when the file is absent or rejected
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path().filter(|path| path.exists()) else {
            return Self::default();
        };
        match Self::load(&path) {
            Ok(config) => {
                tracing::info!("Loaded configuration from {}", path.display());
                config
            },
            Err(e) => {
                tracing::warn!("Ignoring {}: {}", path.display(), e);
                Self::default()
            },
        }
    }

    /// Check the values the gateway cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let parser = &self.parser;
        if !(1..=MAX_NAME_CAP).contains(&parser.name_cap) {
            return Err(ConfigError::invalid(
                "parser.name_cap",
                format!("must be between 1 and {}", MAX_NAME_CAP),
            ));
        }
        if !(1..=MAX_CONTENT_CAP).contains(&parser.content_cap) {
            return Err(ConfigError::invalid(
                "parser.content_cap",
                format!("must be between 1 and {}", MAX_CONTENT_CAP),
            ));
        }
        if self.notify.capacity == 0 {
            return Err(ConfigError::invalid("notify.capacity", "must be at least 1"));
        }

        // The telemetry variable has to survive parsing and storing
        let variable = &self.telemetry.variable;
        if variable.is_empty()
            || variable.len() > parser.name_cap
            || !variable.bytes().all(is_name_byte)
        {
            return Err(ConfigError::invalid(
                "telemetry.variable",
                format!("{:?} is not a name the parser accepts", variable),
            ));
        }
        if self.telemetry.is_excluded(variable) {
            return Err(ConfigError::invalid(
                "telemetry.variable",
                format!("{:?} matches an excluded prefix", variable),
            ));
        }
        Ok(())
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
