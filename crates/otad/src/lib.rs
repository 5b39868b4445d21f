//! Otad daemon library - exposes modules for testing.

pub mod liveness;
pub mod net;
pub mod recovery;
pub mod remote;
pub mod restart;
pub mod stager;
pub mod supervisor;
#[cfg(test)]
pub mod update_cycle_tests;
