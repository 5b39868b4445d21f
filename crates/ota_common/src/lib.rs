//! Shared library for the otad agent: error taxonomy, version oracle,
//! persistent store seam, and configuration.

pub mod config;
pub mod error;
pub mod store;
pub mod version;

// Re-exports
pub use config::Config;
pub use error::AgentError;
pub use store::{FsStore, MemStore, ObjectStore};
pub use store::{ACTIVE_PROGRAM, CANDIDATE_PAYLOAD, UPDATE_MARKER, VERSION_RECORD};
pub use version::{is_stale, Version, VERSION_SENTINEL};
