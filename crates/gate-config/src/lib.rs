//! # Gate Configuration
//!
//! YAML preference parser for onion-gate.
//!
//! This crate reads `onion-gate.yaml` files, substitutes environment
//! variables in string values and converts the result into the supervisor's
//! [`ServiceConfig`].
//!
//! ```yaml
//! version: "1.0"
//! data_dir: "${XDG_DATA_HOME:-/var/lib}/onion-gate"
//! socks_port: 9050
//! virtual_port: 80
//! target_addr: 127.0.0.1
//! target_port: 8080
//! bootstrap:
//!   poll_interval_ms: 1000
//!   max_attempts: 60
//! eager_start: true
//! settings:
//!   log_level: info
//! ```

#![warn(missing_docs)]

use onion_supervisor::ServiceConfig;
use onion_supervisor::config::{
    DEFAULT_SOCKS_PORT, DEFAULT_TARGET_ADDR, DEFAULT_TARGET_PORT, DEFAULT_VIRTUAL_PORT,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub mod parser;

/// The only preference file version understood
pub const SUPPORTED_VERSION: &str = "1.0";

/// Longest accepted bootstrap budget (`poll_interval_ms * max_attempts`), one day
pub const MAX_BOOTSTRAP_BUDGET_MS: u64 = 24 * 60 * 60 * 1000;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// The substitution pattern failed to compile
    #[error("Invalid substitution pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root preference structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GatePreferences {
    /// Configuration version
    pub version: String,

    /// Tor data directory; the hidden service lives beneath it
    pub data_dir: String,

    /// Local SOCKS5 port
    #[serde(default = "default_socks_port")]
    pub socks_port: u16,

    /// Port exposed on the onion address
    #[serde(default = "default_virtual_port")]
    pub virtual_port: u16,

    /// Host the onion service forwards to
    #[serde(default = "default_target_addr")]
    pub target_addr: String,

    /// Port the onion service forwards to
    #[serde(default = "default_target_port")]
    pub target_port: u16,

    /// Explicit tor binary; empty resolves `tor` from `PATH`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tor_binary: String,

    /// Readiness polling
    #[serde(default)]
    pub bootstrap: BootstrapSettings,

    /// Seconds to wait after SIGTERM before SIGKILL
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Boot the service as soon as a session is created
    #[serde(default = "default_eager_start")]
    pub eager_start: bool,

    /// Global settings
    #[serde(default, skip_serializing_if = "Settings::is_default")]
    pub settings: Settings,
}

/// Readiness polling settings
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BootstrapSettings {
    /// Milliseconds between reads of the hostname file
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Reads before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Default log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Settings {
    /// Check if settings are default (all None)
    fn is_default(&self) -> bool {
        self == &Settings::default()
    }
}

impl GatePreferences {
    /// Preferences with every default, rooted at `data_dir`
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            version: SUPPORTED_VERSION.to_string(),
            data_dir: data_dir.into(),
            socks_port: default_socks_port(),
            virtual_port: default_virtual_port(),
            target_addr: default_target_addr(),
            target_port: default_target_port(),
            tor_binary: String::new(),
            bootstrap: BootstrapSettings::default(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            eager_start: default_eager_start(),
            settings: Settings::default(),
        }
    }

    /// Supervisor configuration described by these preferences
    pub fn to_service_config(&self) -> ServiceConfig {
        ServiceConfig::new(PathBuf::from(&self.data_dir))
            .with_socks_port(self.socks_port)
            .with_forwarding(self.virtual_port, self.target_addr.clone(), self.target_port)
            .with_tor_binary(&self.tor_binary)
            .with_bootstrap(
                Duration::from_millis(self.bootstrap.poll_interval_ms),
                self.bootstrap.max_attempts,
            )
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
    }
}

fn default_socks_port() -> u16 {
    DEFAULT_SOCKS_PORT
}

fn default_virtual_port() -> u16 {
    DEFAULT_VIRTUAL_PORT
}

fn default_target_addr() -> String {
    DEFAULT_TARGET_ADDR.to_string()
}

fn default_target_port() -> u16 {
    DEFAULT_TARGET_PORT
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_attempts() -> u32 {
    60
}

fn default_shutdown_grace_secs() -> u64 {
    60
}

fn default_eager_start() -> bool {
    true
}
