//! Delivery contract between the scheduler and the transport.
//!
//! The engine is agnostic to how a notification actually reaches the user —
//! webhook, chat channel, OS notification. Implementations live with the
//! gateway; tests plug in recording stubs.

use crate::model::Payload;

#[async_trait::async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Attempt delivery of a rendered notification.
    ///
    /// Returns a transport-assigned delivery id on success. Any error means
    /// the attempt failed; the scheduler records the outcome and moves on —
    /// no distinction beyond success/failure is required.
    async fn deliver(&self, payload: &Payload) -> chime_domain::Result<String>;
}
