//! Session wiring for the onion gateway
//!
//! A [`GateSession`] owns one supervised onion service, the coordinator that
//! tracks its readiness and the router that gates `.xyz` and `.onion` fetches
//! on it. [`SessionRegistry`] keeps one session per host-defined key.

#![warn(missing_docs)]

pub mod scheme;
pub mod session;

pub use scheme::{GATEWAY_SCHEMES, InMemorySchemeRegistry, SchemeRegistry, register_gateway_schemes};
pub use session::{GateSession, SessionRegistry};
