//! Supervisor configuration types.

use std::path::PathBuf;
use std::time::Duration;

/// Default local SOCKS5 listen port
pub const DEFAULT_SOCKS_PORT: u16 = 9050;
/// Default port exposed on the onion address
pub const DEFAULT_VIRTUAL_PORT: u16 = 80;
/// Default forwarding target host
pub const DEFAULT_TARGET_ADDR: &str = "127.0.0.1";
/// Default forwarding target port
pub const DEFAULT_TARGET_PORT: u16 = 8080;
/// Binary name resolved through `PATH` when no explicit path is configured
pub const DEFAULT_TOR_BINARY: &str = "tor";

/// Configuration for one onion service and the tor process that publishes it
///
/// Fixed for the lifetime of an [`OnionService`](crate::OnionService).
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Tor `DataDirectory`; the hidden service directory lives beneath it
    pub data_dir: PathBuf,
    /// Port the local SOCKS5 proxy listens on
    pub socks_port: u16,
    /// Port exposed on the onion address
    pub virtual_port: u16,
    /// Host the onion service forwards to
    pub target_addr: String,
    /// Port the onion service forwards to
    pub target_port: u16,
    /// Path to the tor binary; empty means `tor` from `PATH`
    pub tor_binary: PathBuf,
    /// How long and how often to wait for the hostname file
    pub bootstrap: BootstrapPolicy,
    /// How long to wait after SIGTERM before escalating to SIGKILL
    pub shutdown_grace: Duration,
}

/// Bounded polling budget for the readiness artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapPolicy {
    /// Delay between two reads of the hostname file
    pub poll_interval: Duration,
    /// Number of reads before giving up
    pub max_attempts: u32,
}

impl Default for BootstrapPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_attempts: 60,
        }
    }
}

impl BootstrapPolicy {
    /// Upper bound on the time spent waiting for readiness
    ///
    /// Saturates at `Duration::MAX` instead of overflowing.
    pub fn budget(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_attempts)
    }
}

impl ServiceConfig {
    /// Configuration with default ports rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            socks_port: DEFAULT_SOCKS_PORT,
            virtual_port: DEFAULT_VIRTUAL_PORT,
            target_addr: DEFAULT_TARGET_ADDR.to_string(),
            target_port: DEFAULT_TARGET_PORT,
            tor_binary: PathBuf::new(),
            bootstrap: BootstrapPolicy::default(),
            shutdown_grace: Duration::from_secs(60),
        }
    }

    /// Set the SOCKS5 port
    pub fn with_socks_port(mut self, port: u16) -> Self {
        self.socks_port = port;
        self
    }

    /// Set the virtual port and forwarding target
    pub fn with_forwarding(mut self, virtual_port: u16, target_addr: impl Into<String>, target_port: u16) -> Self {
        self.virtual_port = virtual_port;
        self.target_addr = target_addr.into();
        self.target_port = target_port;
        self
    }

    /// Set an explicit tor binary
    pub fn with_tor_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.tor_binary = path.into();
        self
    }

    /// Set the bootstrap polling policy
    pub fn with_bootstrap(mut self, poll_interval: Duration, max_attempts: u32) -> Self {
        self.bootstrap = BootstrapPolicy {
            poll_interval,
            max_attempts,
        };
        self
    }

    /// Set the SIGTERM grace period
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// The binary that will be launched
    pub fn resolved_tor_binary(&self) -> PathBuf {
        if self.tor_binary.as_os_str().is_empty() {
            PathBuf::from(DEFAULT_TOR_BINARY)
        } else {
            self.tor_binary.clone()
        }
    }
}
