use anyhow::{Context, Result, bail};
use async_runtime_compat::{default_spawner, prelude::sleep};
use comfy_table::{Cell, Color, Table};
use gate_config::parser;
use onion_gate::{GateSession, InMemorySchemeRegistry};
use readiness_dispatch::{FetchDisposition, ServiceState, TracingExecutor};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

const POLL: Duration = Duration::from_millis(100);

pub async fn run(config_path: &Path, urls: Vec<String>, slack: u64) -> Result<()> {
    let prefs = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let wait = prefs
        .to_service_config()
        .bootstrap
        .budget()
        .saturating_add(Duration::from_secs(slack));
    // None: too far out to represent, wait for the outcome indefinitely
    let deadline = Instant::now().checked_add(wait);

    let schemes = InMemorySchemeRegistry::new();
    let session = GateSession::new(
        &prefs,
        &schemes,
        Arc::new(TracingExecutor),
        Arc::from(default_spawner()),
    );

    if !urls.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["URL", "Disposition"]);
        for url in &urls {
            let (label, color) = match session.on_fetch(url) {
                FetchDisposition::NotApplicable => ("not applicable", Color::Reset),
                FetchDisposition::HandledImmediately => ("handled", Color::Green),
                FetchDisposition::Deferred => ("deferred", Color::Yellow),
            };
            table.add_row(vec![Cell::new(url), Cell::new(label).fg(color)]);
        }
        println!("{table}");
    }

    if session.state() == ServiceState::NotStarted {
        println!("Nothing to route; onion service not started");
        return Ok(());
    }

    let state = wait_for_outcome(&session, deadline).await;
    if state != ServiceState::Ready {
        session.shutdown().await;
        bail!("Onion service did not become ready (state: {})", state);
    }

    // Readiness is published before the queue replays
    let queue = session.router().queue();
    while queue.pending_len() > 0 || queue.is_draining() {
        sleep(POLL).await;
    }

    match session.endpoint() {
        Some(endpoint) => println!(
            "✓ Onion service ready: {} ({})",
            endpoint.onion_hostname,
            endpoint.socks_proxy_url()
        ),
        None => println!("⚠ Onion service stopped before it could be queried"),
    }

    session.shutdown().await;
    info!("Done");
    Ok(())
}

async fn wait_for_outcome(session: &GateSession, deadline: Option<Instant>) -> ServiceState {
    loop {
        let state = session.state();
        let expired = deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if state != ServiceState::Starting || expired {
            return state;
        }
        sleep(POLL).await;
    }
}
