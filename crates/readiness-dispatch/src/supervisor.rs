//! Glue between the coordinator and an [`OnionService`].

use crate::coordinator::{ReadinessCoordinator, StartTicket};
use async_runtime_compat::Spawner;
use onion_supervisor::{Endpoint, OnionService};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Something that can report a usable onion endpoint
pub trait EndpointSource: Send + Sync {
    /// The endpoint, only while the backing service is running
    fn endpoint(&self) -> Option<Endpoint>;
}

impl EndpointSource for OnionService {
    fn endpoint(&self) -> Option<Endpoint> {
        OnionService::endpoint(self)
    }
}

/// Make `coordinator` boot `service` on a background task for every start
///
/// The task posts its outcome back through `complete` or `fail` with the
/// ticket it was given, so a boot that finishes after a stop is ignored. The
/// hook holds both the coordinator and the service weakly; a task that runs
/// after the service was dropped does nothing.
pub fn install_bootstrap_hook(
    coordinator: &Arc<ReadinessCoordinator>,
    service: Arc<OnionService>,
    spawner: Arc<dyn Spawner>,
) {
    let weak_coordinator = Arc::downgrade(coordinator);
    let weak_service = Arc::downgrade(&service);

    coordinator.set_start_hook(Arc::new(move |ticket: StartTicket| {
        let service = weak_service.clone();
        let coordinator = weak_coordinator.clone();

        spawner.spawn(Box::pin(async move {
            let Some(service) = service.upgrade() else {
                debug!("Onion service dropped before cycle {} began", ticket.generation());
                return;
            };
            info!("Bootstrapping onion service for cycle {}", ticket.generation());
            let outcome = service.start().await;
            drop(service);

            let Some(coordinator) = coordinator.upgrade() else {
                return;
            };
            match outcome {
                Ok(endpoint) => {
                    if !coordinator.complete(ticket) {
                        info!("Onion service {} came up for a superseded cycle", endpoint.onion_hostname);
                    }
                }
                Err(e) => {
                    error!("Onion service bootstrap failed: {}", e);
                    coordinator.fail(ticket);
                }
            }
        }));
    }));
}
