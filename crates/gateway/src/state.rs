use std::sync::Arc;

use chime_domain::config::Config;
use chime_engine::Scheduler;

/// Shared application state passed to all API handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// The scheduling engine — job table, timers, history.
    pub scheduler: Arc<Scheduler>,
}
