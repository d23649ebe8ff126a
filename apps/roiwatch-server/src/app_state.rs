use std::path::PathBuf;
use std::sync::Arc;

use roiwatch_events::Bus;
use tokio::sync::Mutex;

use crate::feed::FeedState;

#[derive(Clone)]
pub(crate) struct AppState {
    pub bus: Bus,
    pub feed: Arc<Mutex<FeedState>>,
    pub log_path: PathBuf,
}

impl AppState {
    pub fn new(log_path: PathBuf, bus_capacity: usize) -> Self {
        Self {
            bus: Bus::new(bus_capacity),
            feed: Arc::new(Mutex::new(FeedState::new())),
            log_path,
        }
    }
}
