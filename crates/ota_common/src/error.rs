//! Error types for the otad agent.

use thiserror::Error;

/// Failure taxonomy for agent operations.
///
/// Every collaborator reduces its failures to one of these variants and
/// returns it by value. Nothing is allowed to propagate out of the
/// supervisory loop: a crashed supervisor means the device drops off the
/// update channel forever, which is worse than any skipped cycle.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Connectivity timeout after {0}s")]
    ConnectivityTimeout(u64),

    #[error("Remote fetch failed: {0}")]
    RemoteFetch(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Storage inconsistency: {0}")]
    StorageInconsistency(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AgentError {
    /// Missing-object conditions are benign in several recovery steps
    /// (deleting an already-deleted file, renaming an already-renamed one).
    pub fn is_not_found(&self) -> bool {
        matches!(self, AgentError::NotFound(_))
    }
}
