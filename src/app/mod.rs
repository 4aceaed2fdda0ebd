//! Application glue module
//!
//! Configuration and application-level utilities.

mod config;

pub use config::{
    Config, ConfigError, NotifyConfig, ParserConfig, StoreConfig, TelemetryConfig,
};
