//! Version tokens and the staleness oracle.
//!
//! Versions are opaque: two tokens are equal or they are not. No ordering
//! is defined, so a remote rollback to an older token counts as "new" and
//! gets applied like any other change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel recorded on first boot, before any update has ever applied.
pub const VERSION_SENTINEL: &str = "0.0.0";

/// Opaque version token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version(String);

impl Version {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Parse a token out of a probe body. Bodies arrive with trailing
    /// newlines from plain-text version files.
    pub fn from_probe(body: &str) -> Self {
        Self(body.trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Version {
    fn default() -> Self {
        Self(VERSION_SENTINEL.to_string())
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Staleness oracle: pure equality mismatch, no network or storage access.
///
/// `None` is the distinguished "unknown" from a failed probe. An
/// inconclusive check never reports stale - the device must not update on
/// guesswork.
pub fn is_stale(local: &Version, remote: Option<&Version>) -> bool {
    match remote {
        Some(remote) => remote != local,
        None => false,
    }
}
