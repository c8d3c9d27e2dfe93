//! Entry point for the fetch pipeline.

use crate::classifier::{is_anonymized_address_domain, is_intercepted_domain};
use crate::coordinator::ReadinessCoordinator;
use crate::error::Result;
use crate::executor::FetchExecutor;
use crate::queue::{DeferredDispatchQueue, Dispatch, SubmitOutcome};
use crate::supervisor::EndpointSource;
use crate::target::{FetchTarget, Route};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use url::Url;

/// What the router did with a fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDisposition {
    /// Not an intercepted or onion host; the caller proceeds normally
    NotApplicable,
    /// Dispatched before returning
    HandledImmediately,
    /// Held until the onion service is ready
    Deferred,
}

/// Resolves the route at dispatch time from the current binding
struct BoundDispatcher {
    binding: RwLock<Option<Arc<dyn EndpointSource>>>,
    executor: Arc<dyn FetchExecutor>,
}

impl BoundDispatcher {
    fn current(&self) -> Option<Arc<dyn EndpointSource>> {
        self.binding
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace(&self, source: Option<Arc<dyn EndpointSource>>) -> Option<Arc<dyn EndpointSource>> {
        let mut binding = self.binding.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *binding, source)
    }
}

impl Dispatch for BoundDispatcher {
    fn dispatch(&self, target: &FetchTarget) -> Result<()> {
        let route = match self.current().and_then(|source| source.endpoint()) {
            Some(endpoint) => Route::Proxied(endpoint),
            None => {
                debug!("No running onion service bound for {}", target);
                Route::Unrouted
            }
        };
        self.executor.execute(target, &route)
    }
}

/// Classifies fetches and gates the applicable ones on readiness
///
/// Each router owns its queue and binding; several can coexist, sharing a
/// coordinator or not.
pub struct DomainRouter {
    coordinator: Arc<ReadinessCoordinator>,
    dispatcher: Arc<BoundDispatcher>,
    queue: Arc<DeferredDispatchQueue>,
}

impl DomainRouter {
    /// Create a router executing through `executor` once `coordinator` is ready
    pub fn new(coordinator: Arc<ReadinessCoordinator>, executor: Arc<dyn FetchExecutor>) -> Self {
        let dispatcher = Arc::new(BoundDispatcher {
            binding: RwLock::new(None),
            executor,
        });
        let queue = DeferredDispatchQueue::new(Arc::clone(&coordinator), dispatcher.clone());

        Self {
            coordinator,
            dispatcher,
            queue,
        }
    }

    /// Route `url` if its host is gated
    ///
    /// Unparseable URLs and URLs without a host are not applicable.
    pub fn on_fetch(&self, url: &str) -> FetchDisposition {
        match Url::parse(url) {
            Ok(url) => self.on_fetch_url(url),
            Err(e) => {
                debug!("Not routing unparseable URL {:?}: {}", url, e);
                FetchDisposition::NotApplicable
            }
        }
    }

    /// [`on_fetch`](Self::on_fetch) for an already parsed URL
    pub fn on_fetch_url(&self, url: Url) -> FetchDisposition {
        let Some(host) = url.host_str() else {
            return FetchDisposition::NotApplicable;
        };

        let intercepted = is_intercepted_domain(host);
        let anonymized = is_anonymized_address_domain(host);
        debug!(host, intercepted, anonymized, "Classified fetch");

        if !intercepted && !anonymized {
            return FetchDisposition::NotApplicable;
        }

        match self.queue.submit(FetchTarget::new(url)) {
            SubmitOutcome::Immediate => FetchDisposition::HandledImmediately,
            SubmitOutcome::Deferred => FetchDisposition::Deferred,
        }
    }

    /// Bind `source` for all future dispatches, returning the previous one
    pub fn bind(&self, source: Arc<dyn EndpointSource>) -> Option<Arc<dyn EndpointSource>> {
        self.dispatcher.replace(Some(source))
    }

    /// Drop the current binding, returning it
    pub fn unbind(&self) -> Option<Arc<dyn EndpointSource>> {
        self.dispatcher.replace(None)
    }

    /// The currently bound endpoint source
    pub fn current_supervisor(&self) -> Option<Arc<dyn EndpointSource>> {
        self.dispatcher.current()
    }

    /// The coordinator gating this router
    pub fn coordinator(&self) -> &Arc<ReadinessCoordinator> {
        &self.coordinator
    }

    /// The router's deferred queue
    pub fn queue(&self) -> &Arc<DeferredDispatchQueue> {
        &self.queue
    }
}

impl std::fmt::Debug for DomainRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainRouter")
            .field("coordinator", &self.coordinator)
            .field("queue", &self.queue)
            .field("bound", &self.current_supervisor().is_some())
            .finish()
    }
}
