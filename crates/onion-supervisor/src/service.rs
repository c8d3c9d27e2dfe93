//! The tor process supervisor.

use crate::config::ServiceConfig;
use crate::error::{Result, SupervisorError};
use crate::torrc;
use async_runtime_compat::prelude::*;
use command_executor::{
    Command, Launcher, LocalLauncher, LocalProcessHandle, ProcessEventStream, ProcessEventType,
    ProcessHandle, TrimFilter,
};
use futures::future::{self, Either};
use futures::lock::Mutex as AsyncMutex;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Address at which a running onion service can be used
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    /// Published `.onion` hostname
    pub onion_hostname: String,
    /// Local SOCKS5 port that routes through tor
    pub socks_port: u16,
}

impl Endpoint {
    /// `socks5h://127.0.0.1:<port>`, with DNS resolution left to tor
    pub fn socks_proxy_url(&self) -> String {
        format!("socks5h://127.0.0.1:{}", self.socks_port)
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} via socks port {}", self.onion_hostname, self.socks_port)
    }
}

#[derive(Default)]
struct Shared {
    running: bool,
    onion_hostname: Option<String>,
    cancel: Option<CancelHandle>,
}

/// Manages a tor process and the onion service it publishes
///
/// Lifecycle: construct with a [`ServiceConfig`], call [`start`](Self::start)
/// to write the torrc, launch tor and wait for the `.onion` hostname, read the
/// [`endpoint`](Self::endpoint), and call [`stop`](Self::stop) to tear the
/// process down. Dropping the service kills a still-running process.
///
/// `start` blocks its caller for up to the bootstrap budget and belongs on a
/// background task. Status queries never block.
pub struct OnionService {
    config: ServiceConfig,
    launcher: LocalLauncher,
    spawner: Arc<dyn Spawner>,
    /// Serializes `start` calls
    start_lock: AsyncMutex<()>,
    process: AsyncMutex<Option<LocalProcessHandle>>,
    shared: Mutex<Shared>,
}

impl OnionService {
    /// Create a supervisor that forwards tor output through the default runtime
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_spawner(config, Arc::from(async_runtime_compat::default_spawner()))
    }

    /// Create a supervisor using `spawner` for its background log forwarding
    pub fn with_spawner(config: ServiceConfig, spawner: Arc<dyn Spawner>) -> Self {
        Self {
            config,
            launcher: LocalLauncher,
            spawner,
            start_lock: AsyncMutex::new(()),
            process: AsyncMutex::new(None),
            shared: Mutex::new(Shared::default()),
        }
    }

    /// The configuration this service was built with
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether tor is running and the hostname has been read
    pub fn is_running(&self) -> bool {
        self.shared().running
    }

    /// The published `.onion` hostname, once running
    pub fn onion_hostname(&self) -> Option<String> {
        self.shared().onion_hostname.clone()
    }

    /// Local SOCKS5 proxy port
    pub fn socks_port(&self) -> u16 {
        self.config.socks_port
    }

    /// Hostname and SOCKS port, only while running
    pub fn endpoint(&self) -> Option<Endpoint> {
        let shared = self.shared();
        if !shared.running {
            return None;
        }
        shared.onion_hostname.clone().map(|onion_hostname| Endpoint {
            onion_hostname,
            socks_port: self.config.socks_port,
        })
    }

    /// `<data_dir>/hidden_service`
    pub fn hidden_service_dir(&self) -> PathBuf {
        torrc::hidden_service_dir(&self.config.data_dir)
    }

    /// `<data_dir>/torrc`
    pub fn torrc_path(&self) -> PathBuf {
        torrc::torrc_path(&self.config.data_dir)
    }

    /// Bring tor up and wait for the onion hostname
    ///
    /// Already running: returns the current endpoint without relaunching.
    /// Concurrent calls are serialized, so the second caller sees the first
    /// one's result instead of launching a second process. On failure any
    /// launched process is stopped and the error is returned without retry.
    pub async fn start(&self) -> Result<Endpoint> {
        let _guard = self.start_lock.lock().await;

        if let Some(endpoint) = self.endpoint() {
            warn!("OnionService::start called while already running");
            return Ok(endpoint);
        }

        let (cancel, token) = cancellation();
        self.shared().cancel = Some(cancel);

        let result = self.bootstrap(&token).await.and_then(|hostname| {
            let mut shared = self.shared();
            // stop() raced the final read; honour it. Checked before the
            // handle is released, since dropping it also closes the token.
            if token.is_cancelled() {
                return Err(SupervisorError::BootstrapCancelled);
            }
            shared.cancel = None;
            shared.running = true;
            shared.onion_hostname = Some(hostname.clone());
            Ok(Endpoint {
                onion_hostname: hostname,
                socks_port: self.config.socks_port,
            })
        });

        match result {
            Ok(endpoint) => {
                info!("Onion service ready: {}", endpoint.onion_hostname);
                Ok(endpoint)
            }
            Err(e) => {
                error!("Onion service failed to start: {}", e);
                self.shared().cancel = None;
                self.stop_process().await;
                Err(e)
            }
        }
    }

    /// Terminate tor and forget the discovered endpoint
    ///
    /// Idempotent. Interrupts a bootstrap that is still polling. Failures to
    /// terminate are logged, never returned.
    pub async fn stop(&self) {
        self.cancel_bootstrap();
        {
            let mut shared = self.shared();
            shared.running = false;
            shared.onion_hostname = None;
        }
        self.stop_process().await;
    }

    /// Interrupt a bootstrap that is still polling, without waiting
    ///
    /// The interrupted [`start`](Self::start) stops the process it launched
    /// and returns [`SupervisorError::BootstrapCancelled`]. Returns whether a
    /// bootstrap was in flight.
    pub fn cancel_bootstrap(&self) -> bool {
        match self.shared().cancel.take() {
            Some(cancel) => {
                debug!("Cancelling in-flight bootstrap");
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    async fn bootstrap(&self, token: &CancelToken) -> Result<String> {
        self.prepare_directories().await?;
        let torrc_path = self.write_torrc().await?;

        if token.is_cancelled() {
            return Err(SupervisorError::BootstrapCancelled);
        }
        self.launch(&torrc_path).await?;

        self.wait_for_hostname(token).await
    }

    async fn prepare_directories(&self) -> Result<()> {
        let data_dir = &self.config.data_dir;
        async_fs::create_dir_all(data_dir)
            .await
            .map_err(|source| SupervisorError::DirectoryCreationFailed {
                path: data_dir.clone(),
                source,
            })?;

        let hs_dir = self.hidden_service_dir();
        async_fs::create_dir_all(&hs_dir)
            .await
            .map_err(|source| SupervisorError::DirectoryCreationFailed {
                path: hs_dir.clone(),
                source,
            })?;

        // tor refuses a HiddenServiceDir readable by anyone but its owner
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            async_fs::set_permissions(&hs_dir, std::fs::Permissions::from_mode(0o700))
                .await
                .map_err(|source| SupervisorError::PermissionSetFailed {
                    path: hs_dir.clone(),
                    source,
                })?;
        }

        // A hostname left by a previous run would read as ready before tor is up
        let stale = torrc::hostname_path(data_dir);
        match async_fs::remove_file(&stale).await {
            Ok(()) => debug!("Removed stale hostname file {}", stale.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Could not remove stale hostname file {}: {}", stale.display(), e),
        }

        Ok(())
    }

    async fn write_torrc(&self) -> Result<PathBuf> {
        let path = self.torrc_path();
        let contents = torrc::render_torrc(&self.config);

        async_fs::write(&path, contents)
            .await
            .map_err(|source| SupervisorError::ConfigWriteFailed {
                path: path.clone(),
                source,
            })?;

        info!("Wrote torrc: {}", path.display());
        Ok(path)
    }

    async fn launch(&self, torrc_path: &Path) -> Result<()> {
        let mut cmd = Command::new(self.config.resolved_tor_binary());
        cmd.arg("-f").arg(torrc_path);

        debug!("Launching: {}", cmd.display());
        let (events, handle) = self.launcher.launch(cmd).await?;

        if let Some(pid) = handle.pid() {
            info!("Tor process launched (pid {})", pid);
        }
        *self.process.lock().await = Some(handle);

        self.spawner.spawn(Box::pin(forward_output(events)));
        Ok(())
    }

    async fn wait_for_hostname(&self, token: &CancelToken) -> Result<String> {
        let policy = self.config.bootstrap;

        for attempt in 1..=policy.max_attempts {
            if let Some(hostname) = self.read_onion_hostname().await {
                debug!("Hostname available after {} attempt(s)", attempt);
                return Ok(hostname);
            }
            self.ensure_process_alive().await?;

            if sleep_or_cancel(policy.poll_interval, token).await == Wait::Cancelled {
                return Err(SupervisorError::BootstrapCancelled);
            }
        }

        Err(SupervisorError::ReadinessTimeout {
            attempts: policy.max_attempts,
            waited: policy.budget(),
        })
    }

    /// Trimmed contents of the hostname file, if present and non-empty
    async fn read_onion_hostname(&self) -> Option<String> {
        let path = torrc::hostname_path(&self.config.data_dir);
        let contents = async_fs::read_to_string(&path).await.ok()?;
        let hostname = contents.trim();
        (!hostname.is_empty()).then(|| hostname.to_string())
    }

    async fn ensure_process_alive(&self) -> Result<()> {
        let mut process = self.process.lock().await;
        let Some(handle) = process.as_mut() else {
            // stop() already took the handle
            return Err(SupervisorError::BootstrapCancelled);
        };

        match handle.try_wait() {
            Ok(Some(status)) => {
                process.take();
                Err(SupervisorError::ProcessExited(status))
            }
            Ok(None) => Ok(()),
            Err(e) => {
                warn!("Could not query tor process status: {}", e);
                Ok(())
            }
        }
    }

    async fn stop_process(&self) {
        let handle = self.process.lock().await.take();
        let Some(mut handle) = handle else {
            return;
        };

        match handle.pid() {
            Some(pid) => info!("Stopping Tor process (pid {})", pid),
            None => info!("Stopping Tor process"),
        }

        if let Err(e) = handle.terminate().await {
            warn!("Failed to terminate tor: {}, trying kill", e);
            if let Err(e) = handle.kill().await {
                warn!("Failed to kill tor: {}", e);
            }
        }

        let exited = {
            let wait = Box::pin(handle.wait());
            let grace = Box::pin(sleep(self.config.shutdown_grace));
            match future::select(wait, grace).await {
                Either::Left((status, _)) => Some(status),
                Either::Right(_) => None,
            }
        };

        match exited {
            Some(Ok(status)) => debug!("Tor exited with {}", status),
            Some(Err(e)) => warn!("Failed to wait for tor: {}", e),
            None => {
                warn!(
                    "Tor did not exit within {:?} of SIGTERM, killing",
                    self.config.shutdown_grace
                );
                if let Err(e) = handle.kill().await {
                    warn!("Failed to kill tor: {}", e);
                }
                if let Err(e) = handle.wait().await {
                    warn!("Failed to wait for tor: {}", e);
                }
            }
        }
    }

    fn shared(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for OnionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnionService")
            .field("data_dir", &self.config.data_dir)
            .field("socks_port", &self.config.socks_port)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Relay tor's stdout/stderr into the log until the pipes close
async fn forward_output(events: ProcessEventStream) {
    let mut events = events.with_filter(TrimFilter);
    while let Some(event) = events.next().await {
        let line = event.data.unwrap_or_default();
        match event.event_type {
            ProcessEventType::Started { pid } => debug!(target: "tor", "started (pid {})", pid),
            ProcessEventType::Stdout => debug!(target: "tor", "{}", line),
            ProcessEventType::Stderr => warn!(target: "tor", "{}", line),
        }
    }
    debug!(target: "tor", "output closed");
}
