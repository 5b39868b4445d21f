//! Liveness indicator pulsed during the idle heartbeat.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Observational liveness signal. Purely cosmetic: it must never block or
/// fail the supervisory loop.
pub trait Liveness: Send + Sync {
    fn pulse(&self);
}

/// Production indicator.
///
/// Toggles an LED brightness file when the platform exposes one, otherwise
/// just traces the pulse.
pub struct Indicator {
    led_path: Option<String>,
    lit: AtomicBool,
}

impl Indicator {
    pub fn new(led_path: Option<String>) -> Self {
        Self {
            led_path,
            lit: AtomicBool::new(false),
        }
    }
}

impl Liveness for Indicator {
    fn pulse(&self) {
        let lit = !self.lit.fetch_xor(true, Ordering::Relaxed);
        match &self.led_path {
            Some(path) => {
                let value = if lit { "1" } else { "0" };
                if let Err(e) = fs::write(path, value) {
                    debug!("Heartbeat LED write failed: {}", e);
                }
            }
            None => debug!("Heartbeat pulse"),
        }
    }
}
