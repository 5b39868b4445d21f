//! Boot recovery: make the active program authoritative before anything
//! else observes storage.
//!
//! Exactly three states can be found at start: no marker (normal boot),
//! marker plus complete candidate (promote), marker without a usable
//! candidate (repair). Promotion steps tolerate a prior interrupted
//! attempt, so re-running after a mid-promotion crash converges.

use crate::restart::RestartHandle;
use ota_common::store::{ObjectStore, ACTIVE_PROGRAM, CANDIDATE_PAYLOAD, UPDATE_MARKER};
use ota_common::AgentError;
use tracing::{error, info, warn};

/// Run recovery once, synchronously, before the supervisory loop starts.
///
/// Storage failures are logged and swallowed: a device that failed to
/// promote still boots its old program rather than crash-looping, accepting
/// that it may remain on the old version.
pub fn run(store: &dyn ObjectStore, restart: &dyn RestartHandle) {
    if !store.exists(UPDATE_MARKER) {
        return;
    }

    if candidate_is_complete(store) {
        match promote(store) {
            Ok(()) => {
                info!("Promoted staged update to active program");
                restart.request_restart("update promoted");
            }
            Err(e) => {
                error!("Promotion failed, keeping previous program: {}", e);
            }
        }
    } else {
        // Should not occur under the stager's write-order contract, but
        // partial-write states are defended against. Continuity of the
        // known-good program wins over an unknown candidate.
        warn!(
            "{}",
            AgentError::StorageInconsistency(
                "marker present without complete candidate, discarding marker".to_string()
            )
        );
        if let Err(e) = store.delete(UPDATE_MARKER) {
            if !e.is_not_found() {
                error!("Could not discard stale marker: {}", e);
            }
        }
    }
}

/// A candidate counts only when present, readable, and non-empty.
fn candidate_is_complete(store: &dyn ObjectStore) -> bool {
    match store.read(CANDIDATE_PAYLOAD) {
        Ok(bytes) => !bytes.is_empty(),
        Err(_) => false,
    }
}

/// Delete active, rename candidate into place, delete marker. Each step
/// tolerates an earlier partial attempt already having done its work.
fn promote(store: &dyn ObjectStore) -> Result<(), AgentError> {
    match store.delete(ACTIVE_PROGRAM) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    match store.rename(CANDIDATE_PAYLOAD, ACTIVE_PROGRAM) {
        Ok(()) => {}
        Err(e) if e.is_not_found() && store.exists(ACTIVE_PROGRAM) => {}
        Err(e) => return Err(e),
    }

    match store.delete(UPDATE_MARKER) {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e),
    }

    Ok(())
}
