//! Per-session ownership of the onion service and its router.

use crate::scheme::{SchemeRegistry, register_gateway_schemes};
use async_runtime_compat::Spawner;
use gate_config::GatePreferences;
use onion_supervisor::{Endpoint, OnionService};
use readiness_dispatch::{
    DomainRouter, FetchDisposition, FetchExecutor, ReadinessCoordinator, ServiceState,
    install_bootstrap_hook,
};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

/// One onion service, its coordinator and the router gating fetches on it
///
/// Field order is drop order: the router (and with it the queue's observer
/// registration) goes before the coordinator and the service. Dropping the
/// session cancels a bootstrap still in flight, whose task then kills the tor
/// it launched; a running tor is killed once the last reference to the
/// service goes. Call [`shutdown`](Self::shutdown) for an orderly stop.
pub struct GateSession {
    router: DomainRouter,
    coordinator: Arc<ReadinessCoordinator>,
    service: Arc<OnionService>,
}

impl GateSession {
    /// Wire up a session from `prefs`
    ///
    /// Registers the gateway schemes that `schemes` does not know yet and,
    /// when `prefs.eager_start` is set, begins booting the service right away.
    pub fn new(
        prefs: &GatePreferences,
        schemes: &dyn SchemeRegistry,
        executor: Arc<dyn FetchExecutor>,
        spawner: Arc<dyn Spawner>,
    ) -> Self {
        let added = register_gateway_schemes(schemes);
        if !added.is_empty() {
            info!("Registered web-safe schemes: {}", added.join(", "));
        }

        let service = Arc::new(OnionService::with_spawner(
            prefs.to_service_config(),
            Arc::clone(&spawner),
        ));
        let coordinator = Arc::new(ReadinessCoordinator::new());
        install_bootstrap_hook(&coordinator, Arc::clone(&service), spawner);

        let router = DomainRouter::new(Arc::clone(&coordinator), executor);
        router.bind(service.clone());

        if prefs.eager_start {
            debug!("Eager start enabled");
            coordinator.start();
        }

        Self {
            router,
            coordinator,
            service,
        }
    }

    /// Route one fetch
    pub fn on_fetch(&self, url: &str) -> FetchDisposition {
        self.router.on_fetch(url)
    }

    /// The session's router
    pub fn router(&self) -> &DomainRouter {
        &self.router
    }

    /// The session's coordinator
    pub fn coordinator(&self) -> &Arc<ReadinessCoordinator> {
        &self.coordinator
    }

    /// The supervised onion service
    pub fn service(&self) -> &Arc<OnionService> {
        &self.service
    }

    /// Coordinator state
    pub fn state(&self) -> ServiceState {
        self.coordinator.state()
    }

    /// Endpoint of the running service
    pub fn endpoint(&self) -> Option<Endpoint> {
        self.service.endpoint()
    }

    /// Stop the coordinator and the service
    ///
    /// Fetches still queued stay queued and are dropped with the session.
    pub async fn shutdown(&self) {
        info!("Shutting down gate session");
        self.coordinator.stop();
        self.service.stop().await;
    }
}

impl Drop for GateSession {
    fn drop(&mut self) {
        self.coordinator.stop();
        if self.service.cancel_bootstrap() {
            debug!("Gate session dropped mid-bootstrap");
        }
    }
}

impl std::fmt::Debug for GateSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateSession")
            .field("state", &self.state())
            .field("service", &self.service)
            .finish()
    }
}

/// Host-side container holding one session per key
#[derive(Debug)]
pub struct SessionRegistry<K> {
    sessions: Mutex<HashMap<K, Arc<GateSession>>>,
}

impl<K> Default for SessionRegistry<K> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone> SessionRegistry<K> {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The session for `key`, created with `create` on first use
    ///
    /// `create` runs at most once per key, under the registry lock.
    pub fn get_or_create<F>(&self, key: &K, create: F) -> Arc<GateSession>
    where
        F: FnOnce() -> GateSession,
    {
        let mut sessions = self.lock();
        Arc::clone(
            sessions
                .entry(key.clone())
                .or_insert_with(|| Arc::new(create())),
        )
    }

    /// The session for `key`, if one exists
    pub fn get(&self, key: &K) -> Option<Arc<GateSession>> {
        self.lock().get(key).cloned()
    }

    /// Detach the session for `key`
    ///
    /// The session is torn down once the returned handle and every other
    /// clone are dropped.
    pub fn remove(&self, key: &K) -> Option<Arc<GateSession>> {
        self.lock().remove(key)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no session exists
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Arc<GateSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
