//! End-to-end scenarios for the staging and recovery protocol, driven
//! through in-memory collaborators.

use crate::liveness::Liveness;
use crate::net::Connectivity;
use crate::recovery;
use crate::remote::RemoteSource;
use crate::restart::RestartHandle;
use crate::supervisor::{CycleOutcome, Supervisor};
use async_trait::async_trait;
use ota_common::store::{
    MemStore, ObjectStore, ACTIVE_PROGRAM, CANDIDATE_PAYLOAD, UPDATE_MARKER, VERSION_RECORD,
};
use ota_common::{AgentError, Config};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

struct FakeLink {
    up: bool,
}

#[async_trait]
impl Connectivity for FakeLink {
    async fn ensure_link(&self, _timeout: Duration) -> bool {
        self.up
    }
}

/// Scripted remote: `None` plays a transport failure for that fetch.
#[derive(Default)]
struct FakeRemote {
    version: Option<String>,
    payload: Option<Vec<u8>>,
    fetches: AtomicUsize,
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn fetch_text(&self, _url: &str) -> Result<String, AgentError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.version
            .clone()
            .ok_or_else(|| AgentError::RemoteFetch("probe unreachable".to_string()))
    }

    async fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, AgentError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.payload
            .clone()
            .ok_or_else(|| AgentError::RemoteFetch("payload unreachable".to_string()))
    }
}

#[derive(Default)]
struct PulseCounter {
    pulses: AtomicUsize,
}

impl Liveness for PulseCounter {
    fn pulse(&self) {
        self.pulses.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeRestart {
    requested: AtomicBool,
}

impl FakeRestart {
    fn was_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

impl RestartHandle for FakeRestart {
    fn request_restart(&self, _reason: &str) {
        self.requested.store(true, Ordering::SeqCst);
    }
}

struct Harness {
    store: Arc<MemStore>,
    remote: Arc<FakeRemote>,
    restart: Arc<FakeRestart>,
    liveness: Arc<PulseCounter>,
    supervisor: Supervisor,
}

fn harness(link_up: bool, remote: FakeRemote, config: Config) -> Harness {
    let store = Arc::new(MemStore::new());
    let remote = Arc::new(remote);
    let restart = Arc::new(FakeRestart::default());
    let liveness = Arc::new(PulseCounter::default());
    let supervisor = Supervisor::new(
        config,
        Arc::new(FakeLink { up: link_up }),
        remote.clone(),
        store.clone(),
        liveness.clone(),
        restart.clone(),
    );
    Harness {
        store,
        remote,
        restart,
        liveness,
        supervisor,
    }
}

fn remote_serving(version: &str, payload: &[u8]) -> FakeRemote {
    FakeRemote {
        version: Some(version.to_string()),
        payload: Some(payload.to_vec()),
        fetches: AtomicUsize::new(0),
    }
}

#[tokio::test]
async fn test_same_version_no_staging() {
    let h = harness(true, remote_serving("1.0.0\n", b"payload"), Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");
    h.store.seed(VERSION_RECORD, b"1.0.0");

    assert_eq!(h.supervisor.run_cycle().await, CycleOutcome::Current);
    assert!(!h.store.exists(UPDATE_MARKER));
    assert!(!h.store.exists(CANDIDATE_PAYLOAD));
    assert!(!h.restart.was_requested());
}

#[tokio::test]
async fn test_stale_version_stages_and_promotes() {
    let h = harness(true, remote_serving("1.1.0", b"new program"), Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");
    h.store.seed(VERSION_RECORD, b"1.0.0");

    assert_eq!(h.supervisor.run_cycle().await, CycleOutcome::Staged);

    // Candidate, marker, and version record are all durable; active is
    // untouched until recovery runs.
    assert_eq!(
        h.store.contents(CANDIDATE_PAYLOAD).unwrap(),
        b"new program"
    );
    assert!(h.store.exists(UPDATE_MARKER));
    assert_eq!(h.store.contents(ACTIVE_PROGRAM).unwrap(), b"old program");
    assert_eq!(h.store.contents(VERSION_RECORD).unwrap(), b"1.1.0");
    assert!(h.restart.was_requested());

    // Next boot: recovery promotes.
    let boot_restart = FakeRestart::default();
    recovery::run(h.store.as_ref(), &boot_restart);
    assert_eq!(h.store.contents(ACTIVE_PROGRAM).unwrap(), b"new program");
    assert!(!h.store.exists(UPDATE_MARKER));
    assert!(!h.store.exists(CANDIDATE_PAYLOAD));
    assert!(boot_restart.was_requested());
}

#[tokio::test]
async fn test_unknown_remote_is_not_stale() {
    let remote = FakeRemote {
        version: None,
        payload: Some(b"new program".to_vec()),
        fetches: AtomicUsize::new(0),
    };
    let h = harness(true, remote, Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");
    h.store.seed(VERSION_RECORD, b"1.0.0");

    assert_eq!(h.supervisor.run_cycle().await, CycleOutcome::Current);
    assert!(!h.store.exists(UPDATE_MARKER));
    assert_eq!(h.store.contents(VERSION_RECORD).unwrap(), b"1.0.0");
}

#[tokio::test]
async fn test_staging_write_failure_leaves_no_marker() {
    let h = harness(true, remote_serving("1.1.0", b"new program"), Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");
    h.store.seed(VERSION_RECORD, b"1.0.0");
    h.store.fail_writes_of(CANDIDATE_PAYLOAD);

    match h.supervisor.run_cycle().await {
        CycleOutcome::StageFailed(reason) => assert!(reason.contains("candidate write")),
        other => panic!("expected StageFailed, got {:?}", other),
    }
    assert!(!h.store.exists(UPDATE_MARKER));
    assert_eq!(h.store.contents(VERSION_RECORD).unwrap(), b"1.0.0");
    assert_eq!(h.store.contents(ACTIVE_PROGRAM).unwrap(), b"old program");
    assert!(!h.restart.was_requested());
}

#[tokio::test]
async fn test_marker_write_failure_leaves_version_record_alone() {
    let h = harness(true, remote_serving("1.1.0", b"new program"), Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");
    h.store.seed(VERSION_RECORD, b"1.0.0");
    h.store.fail_writes_of(UPDATE_MARKER);

    match h.supervisor.run_cycle().await {
        CycleOutcome::StageFailed(reason) => assert!(reason.contains("marker write")),
        other => panic!("expected StageFailed, got {:?}", other),
    }
    // A stray candidate without a marker is inert; the invariant is about
    // the marker, and the version record must not have moved.
    assert!(!h.store.exists(UPDATE_MARKER));
    assert_eq!(h.store.contents(VERSION_RECORD).unwrap(), b"1.0.0");
    assert!(!h.restart.was_requested());
}

#[tokio::test]
async fn test_link_down_skips_cycle_entirely() {
    let remote = remote_serving("1.1.0", b"new program");
    let h = harness(false, remote, Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"old program");

    assert_eq!(h.supervisor.run_cycle().await, CycleOutcome::LinkDown);
    assert!(!h.store.exists(UPDATE_MARKER));
    assert!(!h.restart.was_requested());
    // The remote was never consulted.
    assert_eq!(h.remote.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_first_boot_uses_sentinel_version() {
    // No version record at all: any known remote version counts as new.
    let h = harness(true, remote_serving("1.0.0", b"program"), Config::default());
    h.store.seed(ACTIVE_PROGRAM, b"factory program");

    assert_eq!(h.supervisor.run_cycle().await, CycleOutcome::Staged);
    assert_eq!(h.store.contents(VERSION_RECORD).unwrap(), b"1.0.0");
}

#[test]
fn test_recovery_repairs_marker_without_candidate() {
    let store = MemStore::new();
    store.seed(ACTIVE_PROGRAM, b"old program");
    store.seed(UPDATE_MARKER, b"ready");
    let restart = FakeRestart::default();

    recovery::run(&store, &restart);
    assert!(!store.exists(UPDATE_MARKER));
    assert_eq!(store.contents(ACTIVE_PROGRAM).unwrap(), b"old program");
    assert!(!restart.was_requested());
}

#[test]
fn test_recovery_discards_empty_candidate() {
    let store = MemStore::new();
    store.seed(ACTIVE_PROGRAM, b"old program");
    store.seed(CANDIDATE_PAYLOAD, b"");
    store.seed(UPDATE_MARKER, b"ready");
    let restart = FakeRestart::default();

    recovery::run(&store, &restart);
    assert!(!store.exists(UPDATE_MARKER));
    assert_eq!(store.contents(ACTIVE_PROGRAM).unwrap(), b"old program");
    assert!(!restart.was_requested());
}

#[test]
fn test_recovery_no_marker_is_noop() {
    let store = MemStore::new();
    store.seed(ACTIVE_PROGRAM, b"program");
    let restart = FakeRestart::default();

    recovery::run(&store, &restart);
    assert_eq!(store.list().unwrap(), vec![ACTIVE_PROGRAM]);
    assert!(!restart.was_requested());
}

#[test]
fn test_recovery_is_idempotent() {
    let store = MemStore::new();
    store.seed(ACTIVE_PROGRAM, b"old program");
    store.seed(CANDIDATE_PAYLOAD, b"new program");
    store.seed(UPDATE_MARKER, b"ready");

    let first = FakeRestart::default();
    recovery::run(&store, &first);
    assert!(first.was_requested());
    let after_first = store.list().unwrap();

    // Second run on the same storage is a no-op: no restart, no mutation.
    let second = FakeRestart::default();
    recovery::run(&store, &second);
    assert!(!second.was_requested());
    assert_eq!(store.list().unwrap(), after_first);
    assert_eq!(store.contents(ACTIVE_PROGRAM).unwrap(), b"new program");
}

#[test]
fn test_recovery_resumes_interrupted_promotion() {
    // Crash happened after the rename but before the marker delete: the
    // candidate is gone, the new program is active, the marker remains.
    let store = MemStore::new();
    store.seed(ACTIVE_PROGRAM, b"new program");
    store.seed(UPDATE_MARKER, b"ready");
    let restart = FakeRestart::default();

    recovery::run(&store, &restart);
    assert!(!store.exists(UPDATE_MARKER));
    assert_eq!(store.contents(ACTIVE_PROGRAM).unwrap(), b"new program");
}

#[test]
fn test_recovery_promotes_without_prior_active() {
    let store = MemStore::new();
    store.seed(CANDIDATE_PAYLOAD, b"first program");
    store.seed(UPDATE_MARKER, b"ready");
    let restart = FakeRestart::default();

    recovery::run(&store, &restart);
    assert_eq!(store.contents(ACTIVE_PROGRAM).unwrap(), b"first program");
    assert!(!store.exists(UPDATE_MARKER));
    assert!(restart.was_requested());
}

#[tokio::test(start_paused = true)]
async fn test_idle_heartbeat_pulses_at_subinterval() {
    let mut config = Config::default();
    config.heartbeat.period_secs = 30;
    config.heartbeat.pulse_secs = 10;

    let h = harness(true, FakeRemote::default(), config);
    h.supervisor.idle().await;

    assert_eq!(h.liveness.pulses.load(Ordering::SeqCst), 3);
}
