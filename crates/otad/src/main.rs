//! Otad - self-updating firmware agent daemon.
//!
//! Boots, repairs or promotes any staged update, then supervises the
//! running program: connect, check the remote version, stage when stale,
//! idle, repeat.

use anyhow::Result;
use ota_common::{Config, FsStore};
use otad::liveness::Indicator;
use otad::net::NetLink;
use otad::recovery;
use otad::remote::HttpSource;
use otad::restart::ProcessRestart;
use otad::supervisor::Supervisor;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Otad v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::load();
    let store = Arc::new(FsStore::open(&config.agent.data_dir)?);
    let restart = Arc::new(ProcessRestart::new(&config.agent.data_dir));

    // Storage must be authoritative before anything else observes it.
    recovery::run(store.as_ref(), restart.as_ref());

    let link = Arc::new(NetLink::new(&config.network));
    let remote = Arc::new(HttpSource::new(Duration::from_secs(
        config.remote.request_timeout_secs,
    )));
    let liveness = Arc::new(Indicator::new(config.heartbeat.led_path.clone()));

    let supervisor = Supervisor::new(config, link, remote, store, liveness, restart);
    supervisor.run().await;

    Ok(())
}
