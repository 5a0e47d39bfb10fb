//! Application state shared across request handlers.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Mutex;

use crate::config::Config;
use crate::relay::Relay;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Single writer for all relay state. Never held across an `.await`.
    pub relay: Arc<Mutex<Relay>>,
    pub config: Arc<Config>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            relay: Arc::new(Mutex::new(Relay::new())),
            config: Arc::new(config),
            started_at: Instant::now(),
        }
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}
