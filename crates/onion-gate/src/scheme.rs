//! Registration of the URL schemes the gateway serves.

use indexmap::IndexSet;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Schemes fetched through the gateway
pub const GATEWAY_SCHEMES: [&str; 2] = ["ipfs", "ipns"];

/// Host-side registry of schemes treated as web-safe
pub trait SchemeRegistry: Send + Sync {
    /// Whether `scheme` is already registered
    fn is_web_safe_scheme(&self, scheme: &str) -> bool;

    /// Register `scheme`
    fn register_web_safe_scheme(&self, scheme: &str);
}

/// Register every gateway scheme not yet known to `registry`
///
/// Returns the schemes that were newly registered.
pub fn register_gateway_schemes(registry: &dyn SchemeRegistry) -> Vec<&'static str> {
    let mut added = Vec::new();
    for scheme in GATEWAY_SCHEMES {
        if registry.is_web_safe_scheme(scheme) {
            debug!("Scheme {} already registered", scheme);
            continue;
        }
        registry.register_web_safe_scheme(scheme);
        added.push(scheme);
    }
    added
}

/// Process-local [`SchemeRegistry`] keeping registration order
#[derive(Debug, Default)]
pub struct InMemorySchemeRegistry {
    schemes: RwLock<IndexSet<String>>,
}

impl InMemorySchemeRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered schemes in registration order
    pub fn schemes(&self) -> Vec<String> {
        self.schemes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

impl SchemeRegistry for InMemorySchemeRegistry {
    fn is_web_safe_scheme(&self, scheme: &str) -> bool {
        self.schemes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(scheme)
    }

    fn register_web_safe_scheme(&self, scheme: &str) {
        self.schemes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(scheme.to_string());
    }
}
