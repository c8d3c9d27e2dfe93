//! Readiness-gated dispatch of fetches bound for onion and intercepted hosts
//!
//! A [`DomainRouter`] classifies each fetch by host. Fetches for `.xyz` and
//! `.onion` hosts go to a [`DeferredDispatchQueue`], which runs them at once
//! when the [`ReadinessCoordinator`] is ready and otherwise holds them and
//! requests a start. When the coordinator becomes ready, the queue replays
//! everything it holds, once and in submission order, through the endpoint
//! bound to the router at that moment.

#![warn(missing_docs)]

pub mod classifier;
pub mod coordinator;
pub mod error;
pub mod executor;
pub mod observer;
pub mod queue;
pub mod router;
pub mod supervisor;
pub mod target;

pub use classifier::{
    ANONYMIZED_SUFFIX, DomainClass, INTERCEPTED_SUFFIX, classify, is_anonymized_address_domain,
    is_intercepted_domain,
};
pub use coordinator::{ReadinessCoordinator, ServiceState, StartHook, StartTicket};
pub use error::{DispatchError, Result};
pub use executor::{FetchExecutor, TracingExecutor};
pub use observer::{ObserverId, ObserverSet, ReadyCallback};
pub use queue::{DeferredDispatchQueue, Dispatch, SubmitOutcome};
pub use router::{DomainRouter, FetchDisposition};
pub use supervisor::{EndpointSource, install_bootstrap_hook};
pub use target::{FetchTarget, Route};
