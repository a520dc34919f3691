use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::Instant;

use crate::server::config::Config;

#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub request_count: Arc<AtomicU64>,
    pub start_time: Instant,
}

impl ServerState {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            request_count: Arc::new(AtomicU64::new(0)),
            start_time: Instant::now(),
        }
    }
}
