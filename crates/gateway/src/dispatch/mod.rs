//! Dispatcher transports. The engine only knows the [`Dispatcher`] contract;
//! which transport actually carries a notification is a config decision.

pub mod log;
pub mod webhook;

pub use log::LogDispatcher;
pub use webhook::{validate_url, WebhookDispatcher};

use std::sync::Arc;

use chime_domain::config::{DispatchConfig, DispatchMode};
use chime_engine::Dispatcher;

/// Build the dispatcher selected by `[dispatch]` config.
pub fn from_config(config: &DispatchConfig) -> Arc<dyn Dispatcher> {
    match config.mode {
        DispatchMode::Log => Arc::new(LogDispatcher),
        DispatchMode::Webhook => Arc::new(WebhookDispatcher::new(config)),
    }
}
