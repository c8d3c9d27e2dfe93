//! Supervision of a local tor process that publishes an onion service
//!
//! [`OnionService`] writes a torrc under its data directory, launches tor,
//! and waits for tor to publish the `.onion` hostname. Once that hostname is
//! readable the service reports an [`Endpoint`]: the hostname plus the local
//! SOCKS5 port that routes traffic through tor.
//!
//! ```no_run
//! use onion_supervisor::{OnionService, ServiceConfig};
//!
//! # smol::block_on(async {
//! let service = OnionService::new(ServiceConfig::new("/var/lib/onion-gate"));
//! let endpoint = service.start().await?;
//! println!("published at {}", endpoint.onion_hostname);
//! service.stop().await;
//! # Ok::<(), onion_supervisor::SupervisorError>(())
//! # });
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod service;
pub mod torrc;

pub use config::{BootstrapPolicy, ServiceConfig};
pub use error::{Result, SupervisorError};
pub use service::{Endpoint, OnionService};
pub use torrc::{hidden_service_dir, hostname_path, render_torrc, torrc_path};
