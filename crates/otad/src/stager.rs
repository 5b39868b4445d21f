//! Update stager: downloads a candidate program and arms it for promotion.
//!
//! The write order is the whole protocol: payload first, marker second,
//! version record third. A crash after any single step leaves storage in a
//! state boot recovery can classify. The stager never touches the active
//! program - the swap belongs to boot recovery alone.

use crate::remote::RemoteSource;
use crate::restart::RestartHandle;
use chrono::Utc;
use ota_common::store::{ObjectStore, CANDIDATE_PAYLOAD, UPDATE_MARKER, VERSION_RECORD};
use ota_common::Version;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of one staging attempt.
#[derive(Debug)]
pub enum StageOutcome {
    /// Candidate and marker are durable; a restart has been requested.
    Scheduled,
    /// Nothing promotable was left behind; the active program is untouched.
    Failed(String),
}

/// Marker body. Presence is the signal; the content only aids debugging.
#[derive(Debug, Serialize)]
struct MarkerRecord<'a> {
    version: &'a str,
    staged_at: String,
}

pub struct Stager {
    store: Arc<dyn ObjectStore>,
    remote: Arc<dyn RemoteSource>,
    restart: Arc<dyn RestartHandle>,
    payload_url: String,
}

impl Stager {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        remote: Arc<dyn RemoteSource>,
        restart: Arc<dyn RestartHandle>,
        payload_url: String,
    ) -> Self {
        Self {
            store,
            remote,
            restart,
            payload_url,
        }
    }

    /// Download the candidate for `remote_version` and arm it for the next
    /// boot.
    pub async fn stage(&self, remote_version: &Version) -> StageOutcome {
        let payload = match self.remote.fetch_bytes(&self.payload_url).await {
            Ok(bytes) => bytes,
            Err(e) => return StageOutcome::Failed(format!("payload fetch: {}", e)),
        };

        if let Err(e) = self.store.write(CANDIDATE_PAYLOAD, &payload) {
            self.discard_partial_candidate();
            return StageOutcome::Failed(format!("candidate write: {}", e));
        }

        let marker = MarkerRecord {
            version: remote_version.as_str(),
            staged_at: Utc::now().to_rfc3339(),
        };
        let body = serde_json::to_vec(&marker).unwrap_or_default();
        if let Err(e) = self.store.write(UPDATE_MARKER, &body) {
            return StageOutcome::Failed(format!("marker write: {}", e));
        }

        // The version record moves forward before the reboot so that a
        // failed promotion cannot re-download the same payload forever.
        if let Err(e) = self
            .store
            .write(VERSION_RECORD, remote_version.as_str().as_bytes())
        {
            warn!("Version record write failed: {}", e);
        }

        info!(
            "Staged update to {} ({} bytes)",
            remote_version,
            payload.len()
        );
        self.restart.request_restart("update staged");
        StageOutcome::Scheduled
    }

    /// A candidate without a marker is inert, but don't leave a partial one
    /// around to be mistaken for progress.
    fn discard_partial_candidate(&self) {
        if let Err(e) = self.store.delete(CANDIDATE_PAYLOAD) {
            if !e.is_not_found() {
                warn!("Could not remove partial candidate: {}", e);
            }
        }
    }
}
