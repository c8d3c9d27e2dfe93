//! Host predicates deciding which fetches this layer intercepts.
//!
//! Matching is an exact, case-sensitive suffix comparison on the host as
//! supplied. No normalization happens here.

/// Top-level suffix owned by the gateway
pub const INTERCEPTED_SUFFIX: &str = ".xyz";

/// Suffix of anonymized (onion) addresses
pub const ANONYMIZED_SUFFIX: &str = ".onion";

/// Which class of domain a host belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DomainClass {
    /// Ends with [`INTERCEPTED_SUFFIX`]
    Intercepted,
    /// Ends with [`ANONYMIZED_SUFFIX`]
    AnonymizedAddress,
    /// Anything else; the caller's normal path handles it
    Other,
}

impl DomainClass {
    /// Whether fetches for this class go through the gate
    pub fn is_gated(self) -> bool {
        !matches!(self, DomainClass::Other)
    }
}

/// `host` ends with `.xyz`
pub fn is_intercepted_domain(host: &str) -> bool {
    has_suffix(host, INTERCEPTED_SUFFIX)
}

/// `host` ends with `.onion`
pub fn is_anonymized_address_domain(host: &str) -> bool {
    has_suffix(host, ANONYMIZED_SUFFIX)
}

/// Classify `host`
pub fn classify(host: &str) -> DomainClass {
    if is_anonymized_address_domain(host) {
        DomainClass::AnonymizedAddress
    } else if is_intercepted_domain(host) {
        DomainClass::Intercepted
    } else {
        DomainClass::Other
    }
}

// Inputs shorter than the suffix never match
fn has_suffix(host: &str, suffix: &str) -> bool {
    host.len() >= suffix.len() && host.as_bytes().ends_with(suffix.as_bytes())
}
