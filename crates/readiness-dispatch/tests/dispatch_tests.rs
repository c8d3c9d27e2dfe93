//! Behaviour of the router, queue and coordinator working together

use onion_supervisor::Endpoint;
use readiness_dispatch::{
    DispatchError, DomainRouter, EndpointSource, FetchDisposition, FetchExecutor, FetchTarget,
    ReadinessCoordinator, Route, ServiceState, StartTicket,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, Weak};

type Calls = Arc<Mutex<Vec<(String, Route)>>>;

/// Records every execution; optionally reacts to specific URLs
#[derive(Default)]
struct RecordingExecutor {
    calls: Calls,
    router: OnceLock<Weak<DomainRouter>>,
    coordinator: OnceLock<Weak<ReadinessCoordinator>>,
}

impl FetchExecutor for RecordingExecutor {
    fn execute(&self, target: &FetchTarget, route: &Route) -> readiness_dispatch::Result<()> {
        let url = target.to_string();
        self.calls.lock().unwrap().push((url.clone(), route.clone()));

        if url.ends_with("/reenter") {
            if let Some(router) = self.router.get().and_then(Weak::upgrade) {
                router.on_fetch("https://site.xyz/nested");
            }
        }
        if url.ends_with("/stop") {
            if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
                coordinator.stop();
            }
        }
        if url.ends_with("/fail") {
            return Err(DispatchError::execution(url, "gateway refused"));
        }
        Ok(())
    }
}

struct FixedEndpoint(Endpoint);

impl EndpointSource for FixedEndpoint {
    fn endpoint(&self) -> Option<Endpoint> {
        Some(self.0.clone())
    }
}

fn endpoint(name: &str) -> Endpoint {
    Endpoint {
        onion_hostname: format!("{name}.onion"),
        socks_port: 9050,
    }
}

struct Harness {
    coordinator: Arc<ReadinessCoordinator>,
    router: Arc<DomainRouter>,
    calls: Calls,
    tickets: Arc<Mutex<Vec<StartTicket>>>,
}

impl Harness {
    fn new() -> Self {
        let coordinator = Arc::new(ReadinessCoordinator::new());
        let tickets: Arc<Mutex<Vec<StartTicket>>> = Arc::default();
        let issued = Arc::clone(&tickets);
        coordinator.set_start_hook(Arc::new(move |ticket: StartTicket| {
            issued.lock().unwrap().push(ticket);
        }));

        let executor = Arc::new(RecordingExecutor::default());
        let calls = Arc::clone(&executor.calls);
        let router = Arc::new(DomainRouter::new(coordinator.clone(), executor.clone()));
        executor.router.set(Arc::downgrade(&router)).ok();
        executor.coordinator.set(Arc::downgrade(&coordinator)).ok();

        Self {
            coordinator,
            router,
            calls,
            tickets,
        }
    }

    fn last_ticket(&self) -> StartTicket {
        *self.tickets.lock().unwrap().last().unwrap()
    }

    fn urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(url, _)| url.clone()).collect()
    }
}

#[test]
fn test_not_applicable_hosts_are_declined() {
    let harness = Harness::new();

    assert_eq!(harness.router.on_fetch("https://example.com/"), FetchDisposition::NotApplicable);
    assert_eq!(harness.router.on_fetch("https://a.xyza/"), FetchDisposition::NotApplicable);
    assert_eq!(harness.router.on_fetch("not a url"), FetchDisposition::NotApplicable);
    assert_eq!(harness.router.on_fetch("data:text/plain,site.xyz"), FetchDisposition::NotApplicable);

    assert_eq!(harness.coordinator.state(), ServiceState::NotStarted);
    assert!(harness.tickets.lock().unwrap().is_empty());
}

#[test]
fn test_deferred_fetches_drain_once_in_order() {
    let harness = Harness::new();
    harness.router.bind(Arc::new(FixedEndpoint(endpoint("bound"))));

    let urls: Vec<String> = (0..5).map(|n| format!("https://site{n}.xyz/page")).collect();
    for url in &urls {
        assert_eq!(harness.router.on_fetch(url), FetchDisposition::Deferred);
    }
    assert_eq!(
        harness.router.on_fetch("http://abcdefghijklmnop.onion/"),
        FetchDisposition::Deferred
    );

    assert_eq!(harness.tickets.lock().unwrap().len(), 1);
    assert_eq!(harness.router.queue().pending_len(), 6);
    assert!(harness.calls.lock().unwrap().is_empty());

    assert!(harness.coordinator.complete(harness.last_ticket()));

    let mut expected = urls.clone();
    expected.push("http://abcdefghijklmnop.onion/".to_string());
    assert_eq!(harness.urls(), expected);
    assert!(
        harness
            .calls
            .lock()
            .unwrap()
            .iter()
            .all(|(_, route)| *route == Route::Proxied(endpoint("bound")))
    );
    assert_eq!(harness.router.queue().pending_len(), 0);

    // A second completion does nothing
    assert!(!harness.coordinator.complete(harness.last_ticket()));
    assert_eq!(harness.urls().len(), 6);
}

#[test]
fn test_submission_from_inside_drain_runs_in_next_cycle() {
    let harness = Harness::new();

    harness.router.on_fetch("https://site.xyz/first");
    harness.router.on_fetch("https://site.xyz/reenter");
    harness.router.on_fetch("https://site.xyz/last");

    harness.coordinator.complete(harness.last_ticket());

    assert_eq!(
        harness.urls(),
        vec![
            "https://site.xyz/first",
            "https://site.xyz/reenter",
            "https://site.xyz/last",
            "https://site.xyz/nested",
        ]
    );
    assert!(!harness.router.queue().is_draining());
    assert_eq!(harness.router.queue().pending_len(), 0);
}

#[test]
fn test_ready_fetch_is_handled_immediately() {
    let harness = Harness::new();
    harness.router.on_fetch("https://site.xyz/warmup");
    harness.coordinator.complete(harness.last_ticket());

    assert_eq!(
        harness.router.on_fetch("https://site.xyz/now"),
        FetchDisposition::HandledImmediately
    );
    assert_eq!(harness.urls().last().map(String::as_str), Some("https://site.xyz/now"));
}

#[test]
fn test_failed_entry_does_not_stop_the_rest() {
    let harness = Harness::new();
    harness.router.on_fetch("https://site.xyz/one");
    harness.router.on_fetch("https://site.xyz/fail");
    harness.router.on_fetch("https://site.xyz/three");

    harness.coordinator.complete(harness.last_ticket());

    assert_eq!(harness.urls().len(), 3);
    assert_eq!(harness.router.queue().pending_len(), 0);
}

#[test]
fn test_unbound_drain_uses_unrouted_fallback() {
    let harness = Harness::new();
    harness.router.on_fetch("https://site.xyz/");
    harness.coordinator.complete(harness.last_ticket());

    let calls = harness.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, Route::Unrouted);
}

#[test]
fn test_drain_uses_binding_current_at_drain_time() {
    let harness = Harness::new();
    harness.router.bind(Arc::new(FixedEndpoint(endpoint("old"))));
    harness.router.on_fetch("https://site.xyz/");

    let previous = harness.router.bind(Arc::new(FixedEndpoint(endpoint("new"))));
    assert_eq!(previous.and_then(|p| p.endpoint()), Some(endpoint("old")));

    harness.coordinator.complete(harness.last_ticket());
    assert_eq!(harness.calls.lock().unwrap()[0].1, Route::Proxied(endpoint("new")));

    let unbound = harness.router.unbind();
    assert!(unbound.is_some());
    assert!(harness.router.current_supervisor().is_none());
}

#[test]
fn test_stop_during_drain_leaves_rest_queued() {
    let harness = Harness::new();
    harness.router.on_fetch("https://site.xyz/stop");
    harness.router.on_fetch("https://site.xyz/reenter");

    harness.coordinator.complete(harness.last_ticket());

    // The taken batch finishes; the nested fetch waits for the next cycle
    assert_eq!(harness.urls(), vec!["https://site.xyz/stop", "https://site.xyz/reenter"]);
    assert_eq!(harness.router.queue().pending_len(), 1);
    assert!(!harness.router.queue().is_draining());

    // The nested submission found the coordinator stopped and asked for a start
    assert_eq!(harness.tickets.lock().unwrap().len(), 2);
    assert!(harness.coordinator.is_start_pending());

    harness.coordinator.complete(harness.last_ticket());
    assert_eq!(harness.urls().last().map(String::as_str), Some("https://site.xyz/nested"));
    assert_eq!(harness.router.queue().pending_len(), 0);
}

#[test]
fn test_failed_bootstrap_keeps_entries_for_next_start() {
    let harness = Harness::new();
    harness.router.on_fetch("https://site.xyz/a");
    assert!(harness.coordinator.fail(harness.last_ticket()));
    assert_eq!(harness.coordinator.state(), ServiceState::Failed);
    assert_eq!(harness.router.queue().pending_len(), 1);

    // The next fetch starts a new cycle
    harness.router.on_fetch("https://site.xyz/b");
    assert_eq!(harness.tickets.lock().unwrap().len(), 2);

    harness.coordinator.complete(harness.last_ticket());
    assert_eq!(harness.urls(), vec!["https://site.xyz/a", "https://site.xyz/b"]);
}

#[test]
fn test_two_starts_launch_once() {
    let coordinator = ReadinessCoordinator::new();
    let launches = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&launches);
    coordinator.set_start_hook(Arc::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert!(coordinator.start().is_some());
    assert!(coordinator.start().is_none());
    assert_eq!(launches.load(Ordering::SeqCst), 1);
}

#[test]
fn test_observer_removing_itself_does_not_skip_others() {
    let coordinator = Arc::new(ReadinessCoordinator::new());
    let order = Arc::new(Mutex::new(Vec::new()));

    let first = Arc::clone(&order);
    coordinator.add_observer(Arc::new(move || first.lock().unwrap().push("first")));

    let self_id: Arc<OnceLock<readiness_dispatch::ObserverId>> = Arc::default();
    let (seen, id_cell, weak) = (Arc::clone(&order), Arc::clone(&self_id), Arc::downgrade(&coordinator));
    let id = coordinator.add_observer(Arc::new(move || {
        seen.lock().unwrap().push("self-removing");
        if let (Some(coordinator), Some(id)) = (weak.upgrade(), id_cell.get()) {
            assert!(coordinator.remove_observer(*id));
        }
    }));
    self_id.set(id).ok();

    let last = Arc::clone(&order);
    coordinator.add_observer(Arc::new(move || last.lock().unwrap().push("last")));

    let ticket = coordinator.start().unwrap();
    assert!(coordinator.complete(ticket));

    assert_eq!(*order.lock().unwrap(), vec!["first", "self-removing", "last"]);
    assert_eq!(coordinator.observer_count(), 2);
}

#[test]
fn test_observer_removed_by_earlier_callback_is_skipped() {
    let coordinator = Arc::new(ReadinessCoordinator::new());
    let order = Arc::new(Mutex::new(Vec::new()));
    let victim: Arc<OnceLock<readiness_dispatch::ObserverId>> = Arc::default();

    let (seen, victim_cell, weak) = (Arc::clone(&order), Arc::clone(&victim), Arc::downgrade(&coordinator));
    coordinator.add_observer(Arc::new(move || {
        seen.lock().unwrap().push("remover");
        if let (Some(coordinator), Some(id)) = (weak.upgrade(), victim_cell.get()) {
            coordinator.remove_observer(*id);
        }
    }));

    let seen = Arc::clone(&order);
    let id = coordinator.add_observer(Arc::new(move || seen.lock().unwrap().push("victim")));
    victim.set(id).ok();

    let ticket = coordinator.start().unwrap();
    coordinator.complete(ticket);

    assert_eq!(*order.lock().unwrap(), vec!["remover"]);
}

#[test]
fn test_routers_are_independent() {
    let a = Harness::new();
    let b = Harness::new();
    a.router.bind(Arc::new(FixedEndpoint(endpoint("a"))));

    a.router.on_fetch("https://site.xyz/a");
    b.router.on_fetch("https://site.xyz/b");
    a.coordinator.complete(a.last_ticket());

    assert_eq!(a.urls(), vec!["https://site.xyz/a"]);
    assert!(b.urls().is_empty());
    assert!(b.router.current_supervisor().is_none());
    assert_eq!(b.router.queue().pending_len(), 1);
}

#[test]
fn test_concurrent_fetches_around_readiness_run_once_in_order() {
    const THREADS: usize = 8;
    const PER_THREAD: usize = 50;

    let harness = Harness::new();
    let barrier = std::sync::Barrier::new(THREADS + 1);

    std::thread::scope(|scope| {
        for t in 0..THREADS {
            let (router, barrier) = (&harness.router, &barrier);
            scope.spawn(move || {
                barrier.wait();
                for i in 0..PER_THREAD {
                    let disposition = router.on_fetch(&format!("https://thread{t}.xyz/{i}"));
                    assert_ne!(disposition, FetchDisposition::NotApplicable);
                }
            });
        }

        let harness = &harness;
        let barrier = &barrier;
        scope.spawn(move || {
            barrier.wait();
            loop {
                let ticket = harness.tickets.lock().unwrap().first().copied();
                if let Some(ticket) = ticket {
                    assert!(harness.coordinator.complete(ticket));
                    break;
                }
                std::thread::yield_now();
            }
        });
    });

    assert_eq!(harness.tickets.lock().unwrap().len(), 1);
    assert_eq!(harness.router.queue().pending_len(), 0);
    assert!(!harness.router.queue().is_draining());

    let urls = harness.urls();
    assert_eq!(urls.len(), THREADS * PER_THREAD);

    let mut seen = std::collections::HashSet::new();
    let mut next = [0usize; THREADS];
    for url in &urls {
        assert!(seen.insert(url.clone()), "{url} dispatched twice");

        let rest = url.strip_prefix("https://thread").unwrap();
        let (thread, index) = rest.split_once(".xyz/").unwrap();
        let (thread, index): (usize, usize) = (thread.parse().unwrap(), index.parse().unwrap());
        assert_eq!(index, next[thread], "thread {thread} dispatched out of order");
        next[thread] += 1;
    }
    assert!(next.iter().all(|&count| count == PER_THREAD));
}

#[cfg(unix)]
mod with_onion_service {
    use super::*;
    use async_runtime_compat::prelude::*;
    use onion_supervisor::{OnionService, ServiceConfig};
    use readiness_dispatch::install_bootstrap_hook;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    const FAKE_TOR: &str = r#"#!/bin/sh
hs_dir=$(sed -n 's/^HiddenServiceDir //p' "$2")
sleep 0.2
printf 'gatewayservice.onion\n' > "$hs_dir/hostname"
exec sleep 600
"#;

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(15);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            sleep(Duration::from_millis(20)).await;
        }
    }

    #[smol_potat::test]
    async fn test_deferred_fetch_routes_through_booted_service() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tor = tmp.path().join("fake-tor");
        std::fs::write(&tor, FAKE_TOR).unwrap();
        std::fs::set_permissions(&tor, std::fs::Permissions::from_mode(0o755)).unwrap();

        let config = ServiceConfig::new(tmp.path().join("data"))
            .with_socks_port(19150)
            .with_tor_binary(&tor)
            .with_bootstrap(Duration::from_millis(50), 100);
        let service = Arc::new(OnionService::new(config));

        let coordinator = Arc::new(ReadinessCoordinator::new());
        install_bootstrap_hook(&coordinator, service.clone(), Arc::new(SmolSpawner));

        let executor = Arc::new(RecordingExecutor::default());
        let calls = Arc::clone(&executor.calls);
        let router = DomainRouter::new(coordinator.clone(), executor);
        router.bind(service.clone());

        assert_eq!(
            router.on_fetch("ipns://en.wikipedia-on-ipfs.xyz/wiki/"),
            FetchDisposition::Deferred
        );
        assert!(coordinator.is_start_pending());

        // Readiness flips before the drain runs, so wait for the replay itself
        wait_until(|| !calls.lock().unwrap().is_empty()).await;
        assert!(coordinator.is_ready());

        let expected = Endpoint {
            onion_hostname: "gatewayservice.onion".to_string(),
            socks_port: 19150,
        };
        assert_eq!(
            *calls.lock().unwrap(),
            vec![(
                "ipns://en.wikipedia-on-ipfs.xyz/wiki/".to_string(),
                Route::Proxied(expected)
            )]
        );

        coordinator.stop();
        service.stop().await;
        assert!(!service.is_running());
    }
}
