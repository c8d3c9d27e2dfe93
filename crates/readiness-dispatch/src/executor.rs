//! The seam that actually performs a routed fetch.

use crate::error::{DispatchError, Result};
use crate::target::{FetchTarget, Route};
use tracing::{info, warn};

/// Performs a fetch along a [`Route`]
///
/// Implementations must not block for long; the drain calls them inline.
pub trait FetchExecutor: Send + Sync {
    /// Execute `target` along `route`
    fn execute(&self, target: &FetchTarget, route: &Route) -> Result<()>;
}

/// Logs each routed fetch instead of performing network I/O
///
/// Unrouted fetches are reported as [`DispatchError::Unrouted`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingExecutor;

impl FetchExecutor for TracingExecutor {
    fn execute(&self, target: &FetchTarget, route: &Route) -> Result<()> {
        match route {
            Route::Proxied(endpoint) => {
                info!(
                    "Routing {} through {} (onion {})",
                    target,
                    endpoint.socks_proxy_url(),
                    endpoint.onion_hostname
                );
                Ok(())
            }
            Route::Unrouted => {
                warn!("No onion endpoint for {}, dropping", target);
                Err(DispatchError::Unrouted {
                    target: target.to_string(),
                })
            }
        }
    }
}

impl<F> FetchExecutor for F
where
    F: Fn(&FetchTarget, &Route) -> Result<()> + Send + Sync,
{
    fn execute(&self, target: &FetchTarget, route: &Route) -> Result<()> {
        self(target, route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onion_supervisor::Endpoint;

    #[test]
    fn test_tracing_executor_routes() {
        let target = FetchTarget::parse("ipns://en.wikipedia-on-ipfs.xyz/wiki/").unwrap();
        let endpoint = Endpoint {
            onion_hostname: "abc.onion".to_string(),
            socks_port: 9050,
        };

        assert!(TracingExecutor.execute(&target, &Route::Proxied(endpoint)).is_ok());
        assert_eq!(
            TracingExecutor.execute(&target, &Route::Unrouted),
            Err(DispatchError::Unrouted {
                target: "ipns://en.wikipedia-on-ipfs.xyz/wiki/".to_string()
            })
        );
    }
}
