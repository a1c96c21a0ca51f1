use super::utils::get_current_timestamp_ms;
use server::analyzer::Analyzer;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct ServerState {
    pub last_ping_request_timestamp_ms: Arc<RwLock<u128>>,
    /// Built once at startup and shared, read-only, by every request.
    pub analyzer: Arc<Analyzer>,
    pub is_shutdown_enabled: bool,
    pub is_keepalive_enabled: bool,
}

impl ServerState {
    pub fn new(analyzer: Analyzer, is_shutdown_enabled: bool) -> Self {
        Self {
            last_ping_request_timestamp_ms: Arc::new(RwLock::new(get_current_timestamp_ms())),
            analyzer: Arc::new(analyzer),
            is_shutdown_enabled,
            is_keepalive_enabled: false,
        }
    }

    /// Moves the keep-alive deadline forward. Skipped when the watcher holds the lock.
    pub fn record_activity(&self) {
        if !self.is_keepalive_enabled {
            return;
        }
        if let Ok(mut timestamp) = self.last_ping_request_timestamp_ms.try_write() {
            *timestamp = get_current_timestamp_ms();
        }
    }
}
