//! Supervisory loop: connect, check, stage when stale, idle, repeat.
//!
//! One logical thread of control, no overlapping cycles. The loop has no
//! terminal state - the process ends only through a restart request.

use crate::liveness::Liveness;
use crate::net::Connectivity;
use crate::remote::RemoteSource;
use crate::restart::RestartHandle;
use crate::stager::{StageOutcome, Stager};
use ota_common::store::{ObjectStore, VERSION_RECORD};
use ota_common::{is_stale, AgentError, Config, Version};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Loop phases, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Checking,
    Staging,
    Idle,
}

/// What a single cycle concluded.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The link never came up inside the bound; the check was deferred.
    LinkDown,
    /// Versions matched, or the probe was inconclusive; nothing to do.
    Current,
    /// A candidate was staged and a restart requested.
    Staged,
    /// Staging was attempted and failed; the next cycle retries from
    /// scratch.
    StageFailed(String),
}

pub struct Supervisor {
    config: Config,
    link: Arc<dyn Connectivity>,
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn ObjectStore>,
    liveness: Arc<dyn Liveness>,
    stager: Stager,
}

impl Supervisor {
    pub fn new(
        config: Config,
        link: Arc<dyn Connectivity>,
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn ObjectStore>,
        liveness: Arc<dyn Liveness>,
        restart: Arc<dyn RestartHandle>,
    ) -> Self {
        let stager = Stager::new(
            store.clone(),
            remote.clone(),
            restart,
            config.remote.payload_url.clone(),
        );
        Self {
            config,
            link,
            remote,
            store,
            liveness,
            stager,
        }
    }

    /// Run forever. No cycle failure escapes this loop.
    pub async fn run(&self) {
        info!("Supervisory loop started");
        loop {
            match self.run_cycle().await {
                CycleOutcome::LinkDown => debug!("Cycle skipped: link down"),
                CycleOutcome::Current => debug!("No update needed"),
                CycleOutcome::Staged => info!("Update staged, awaiting restart"),
                CycleOutcome::StageFailed(reason) => {
                    warn!("Staging failed, will retry next cycle: {}", reason);
                    let delay = self.config.agent.stage_retry_delay_secs;
                    if delay > 0 {
                        tokio::time::sleep(Duration::from_secs(delay)).await;
                    }
                }
            }
            self.idle().await;
        }
    }

    /// One pass through Connecting -> Checking -> Staging. Idle pacing is
    /// the caller's job, so tests can drive single cycles.
    pub async fn run_cycle(&self) -> CycleOutcome {
        self.enter(Phase::Connecting);
        let timeout = Duration::from_secs(self.config.network.connect_timeout_secs);
        if !self.link.ensure_link(timeout).await {
            warn!("{}", AgentError::ConnectivityTimeout(timeout.as_secs()));
            self.enter(Phase::Disconnected);
            return CycleOutcome::LinkDown;
        }

        self.enter(Phase::Checking);
        let local = self.local_version();
        let remote = self.remote_version().await;

        if !is_stale(&local, remote.as_ref()) {
            debug!("Version {} is current", local);
            return CycleOutcome::Current;
        }
        // The oracle only reports stale for a known remote.
        let Some(target) = remote else {
            return CycleOutcome::Current;
        };

        self.enter(Phase::Staging);
        info!("New version available: {} (current: {})", target, local);
        match self.stager.stage(&target).await {
            StageOutcome::Scheduled => CycleOutcome::Staged,
            StageOutcome::Failed(reason) => CycleOutcome::StageFailed(reason),
        }
    }

    /// Heartbeat period between checks, pulsing the liveness indicator at
    /// the configured sub-interval.
    pub(crate) async fn idle(&self) {
        self.enter(Phase::Idle);
        let period = self.config.heartbeat.period_secs;
        let pulse = self.config.heartbeat.pulse_secs.max(1);

        let mut elapsed = 0;
        while elapsed < period {
            self.liveness.pulse();
            let step = pulse.min(period - elapsed);
            tokio::time::sleep(Duration::from_secs(step)).await;
            elapsed += step;
        }
    }

    /// Local version record, falling back to the first-boot sentinel when
    /// the record is missing or unreadable.
    fn local_version(&self) -> Version {
        match self.store.read_text(VERSION_RECORD) {
            Ok(text) if !text.is_empty() => Version::new(text),
            _ => Version::default(),
        }
    }

    /// Remote version probe. Any transport failure or empty body reduces
    /// to the distinguished "unknown".
    async fn remote_version(&self) -> Option<Version> {
        match self.remote.fetch_text(&self.config.remote.version_url).await {
            Ok(body) => {
                let version = Version::from_probe(&body);
                if version.as_str().is_empty() {
                    warn!("Version probe returned an empty body");
                    None
                } else {
                    Some(version)
                }
            }
            Err(e) => {
                warn!("Version probe failed: {}", e);
                None
            }
        }
    }

    fn enter(&self, phase: Phase) {
        debug!("Phase: {:?}", phase);
    }
}
