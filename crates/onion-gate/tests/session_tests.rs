//! Integration tests for session wiring

use async_runtime_compat::prelude::*;
use gate_config::GatePreferences;
use onion_gate::{GateSession, InMemorySchemeRegistry, SchemeRegistry, SessionRegistry};
use readiness_dispatch::{FetchDisposition, ServiceState, TracingExecutor};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

fn lazy_prefs(data_dir: &std::path::Path) -> GatePreferences {
    let mut prefs = GatePreferences::new(data_dir.to_string_lossy());
    prefs.eager_start = false;
    prefs
}

fn session(prefs: &GatePreferences, schemes: &InMemorySchemeRegistry) -> GateSession {
    GateSession::new(prefs, schemes, Arc::new(TracingExecutor), Arc::new(SmolSpawner))
}

#[test]
fn test_session_registers_gateway_schemes_once() {
    let tmp = tempfile::tempdir().unwrap();
    let schemes = InMemorySchemeRegistry::new();
    schemes.register_web_safe_scheme("https");

    let prefs = lazy_prefs(tmp.path());
    let _first = session(&prefs, &schemes);
    let _second = session(&prefs, &schemes);

    assert_eq!(schemes.schemes(), vec!["https", "ipfs", "ipns"]);
}

#[test]
fn test_lazy_session_waits_for_first_gated_fetch() {
    let tmp = tempfile::tempdir().unwrap();
    let schemes = InMemorySchemeRegistry::new();
    let mut prefs = lazy_prefs(tmp.path());
    prefs.tor_binary = tmp.path().join("no-such-tor").to_string_lossy().into_owned();

    let session = session(&prefs, &schemes);
    assert_eq!(session.state(), ServiceState::NotStarted);

    assert_eq!(session.on_fetch("https://example.org/"), FetchDisposition::NotApplicable);
    assert_eq!(session.state(), ServiceState::NotStarted);

    assert_eq!(session.on_fetch("ipfs://site.xyz/index.html"), FetchDisposition::Deferred);
    assert_ne!(session.state(), ServiceState::NotStarted);
    assert!(session.router().current_supervisor().is_some());
}

#[test]
fn test_registry_creates_one_session_per_key() {
    let tmp = tempfile::tempdir().unwrap();
    let schemes = InMemorySchemeRegistry::new();
    let prefs = lazy_prefs(tmp.path());
    let registry: SessionRegistry<&str> = SessionRegistry::new();
    let created = AtomicUsize::new(0);

    let make = || {
        created.fetch_add(1, Ordering::SeqCst);
        session(&prefs, &schemes)
    };

    let a = registry.get_or_create(&"profile-a", make);
    let again = registry.get_or_create(&"profile-a", make);
    let _b = registry.get_or_create(&"profile-b", make);

    assert!(Arc::ptr_eq(&a, &again));
    assert_eq!(created.load(Ordering::SeqCst), 2);
    assert_eq!(registry.len(), 2);

    let removed = registry.remove(&"profile-a").unwrap();
    assert!(Arc::ptr_eq(&removed, &a));
    assert!(registry.get(&"profile-a").is_none());
    assert_eq!(registry.len(), 1);
}

#[smol_potat::test]
async fn test_failed_boot_is_reported_to_coordinator() {
    let tmp = tempfile::tempdir().unwrap();
    let schemes = InMemorySchemeRegistry::new();
    let mut prefs = GatePreferences::new(tmp.path().join("data").to_string_lossy());
    prefs.tor_binary = tmp.path().join("no-such-tor").to_string_lossy().into_owned();

    // Eager start with a missing binary
    let session = session(&prefs, &schemes);
    assert_eq!(session.on_fetch("https://site.xyz/"), FetchDisposition::Deferred);

    for _ in 0..200 {
        if session.state() == ServiceState::Failed {
            break;
        }
        sleep(std::time::Duration::from_millis(20)).await;
    }
    assert_eq!(session.state(), ServiceState::Failed);
    assert_eq!(session.router().queue().pending_len(), 1);
    assert!(session.endpoint().is_none());

    session.shutdown().await;
    assert_eq!(session.state(), ServiceState::NotStarted);
}

#[cfg(unix)]
#[smol_potat::test]
async fn test_eager_session_becomes_ready() {
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    let tmp = tempfile::tempdir().unwrap();
    let tor = tmp.path().join("fake-tor");
    std::fs::write(
        &tor,
        "#!/bin/sh\nhs_dir=$(sed -n 's/^HiddenServiceDir //p' \"$2\")\nprintf 'sessionservice.onion\\n' > \"$hs_dir/hostname\"\nexec sleep 600\n",
    )
    .unwrap();
    std::fs::set_permissions(&tor, std::fs::Permissions::from_mode(0o755)).unwrap();

    let mut prefs = GatePreferences::new(tmp.path().join("data").to_string_lossy());
    prefs.tor_binary = tor.to_string_lossy().into_owned();
    prefs.socks_port = 19250;
    prefs.bootstrap.poll_interval_ms = 50;

    let schemes = InMemorySchemeRegistry::new();
    let session = session(&prefs, &schemes);
    assert_ne!(session.state(), ServiceState::NotStarted);

    let deadline = Instant::now() + Duration::from_secs(15);
    while session.state() != ServiceState::Ready || session.router().queue().is_draining() {
        assert!(Instant::now() < deadline, "session never became ready");
        sleep(Duration::from_millis(20)).await;
    }

    let endpoint = session.endpoint().unwrap();
    assert_eq!(endpoint.onion_hostname, "sessionservice.onion");
    assert_eq!(endpoint.socks_port, 19250);
    assert_eq!(session.on_fetch("http://other.onion/"), FetchDisposition::HandledImmediately);

    session.shutdown().await;
    assert_eq!(session.state(), ServiceState::NotStarted);
    assert!(!session.service().is_running());
}

#[cfg(unix)]
#[smol_potat::test]
async fn test_dropping_session_mid_bootstrap_kills_tor() {
    use nix::sys::signal;
    use nix::unistd::Pid;
    use std::os::unix::fs::PermissionsExt;
    use std::time::{Duration, Instant};

    let tmp = tempfile::tempdir().unwrap();
    let tor = tmp.path().join("fake-tor");
    // Records its pid and never publishes a hostname
    std::fs::write(
        &tor,
        "#!/bin/sh\ndata=$(sed -n 's/^DataDirectory //p' \"$2\")\necho $$ > \"$data/tor.pid\"\nexec sleep 600\n",
    )
    .unwrap();
    std::fs::set_permissions(&tor, std::fs::Permissions::from_mode(0o755)).unwrap();

    let data = tmp.path().join("data");
    let mut prefs = GatePreferences::new(data.to_string_lossy());
    prefs.tor_binary = tor.to_string_lossy().into_owned();
    prefs.bootstrap.poll_interval_ms = 50;
    prefs.bootstrap.max_attempts = 2000;

    let schemes = InMemorySchemeRegistry::new();
    let session = session(&prefs, &schemes);
    assert_eq!(session.state(), ServiceState::Starting);

    let pid_file = data.join("tor.pid");
    let deadline = Instant::now() + Duration::from_secs(15);
    let pid = loop {
        if let Some(pid) = std::fs::read_to_string(&pid_file)
            .ok()
            .and_then(|text| text.trim().parse::<i32>().ok())
        {
            break Pid::from_raw(pid);
        }
        assert!(Instant::now() < deadline, "tor never launched");
        sleep(Duration::from_millis(20)).await;
    };

    drop(session);

    // Far inside the 100 s bootstrap budget
    let deadline = Instant::now() + Duration::from_secs(10);
    while signal::kill(pid, None).is_ok() {
        assert!(Instant::now() < deadline, "tor outlived its session");
        sleep(Duration::from_millis(50)).await;
    }
}
