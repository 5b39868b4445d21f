//! Restart signaling after a staged update or a promotion.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Requests a full process restart.
///
/// The restart is the boundary that forces every boot path - first boot,
/// fresh stage, recovered crash - through the same promotion logic in boot
/// recovery.
pub trait RestartHandle: Send + Sync {
    fn request_restart(&self, reason: &str);
}

/// Production restart: drops a marker for the service manager and exits
/// cleanly. The platform supervisor relaunches the process, which re-enters
/// boot recovery before anything else runs.
pub struct ProcessRestart {
    marker_path: PathBuf,
}

impl ProcessRestart {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            marker_path: data_dir.as_ref().join("restart_requested"),
        }
    }
}

impl RestartHandle for ProcessRestart {
    fn request_restart(&self, reason: &str) {
        if let Err(e) = fs::write(&self.marker_path, Utc::now().to_rfc3339()) {
            warn!("Failed to write restart marker: {}", e);
        }

        info!("Restart requested ({}), exiting for relaunch", reason);

        // Give logs time to flush, then exit cleanly.
        std::thread::sleep(Duration::from_secs(1));
        std::process::exit(0);
    }
}
