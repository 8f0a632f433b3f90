//! Log-only transport for local development: every "delivery" is a tracing
//! line, nothing leaves the process.

use chime_engine::{Dispatcher, Payload};

pub struct LogDispatcher;

#[async_trait::async_trait]
impl Dispatcher for LogDispatcher {
    async fn deliver(&self, payload: &Payload) -> chime_domain::Result<String> {
        let delivery_id = uuid::Uuid::new_v4().to_string();
        tracing::info!(
            delivery_id = %delivery_id,
            title = %payload.title,
            destination = %payload.destination,
            priority = ?payload.priority,
            "notification delivered (log transport): {}",
            payload.message
        );
        Ok(delivery_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chime_engine::Priority;

    #[tokio::test]
    async fn log_dispatcher_always_succeeds() {
        let payload = Payload {
            title: "t".into(),
            message: "m".into(),
            destination: "anywhere".into(),
            priority: Priority::High,
        };
        let id = LogDispatcher.deliver(&payload).await.unwrap();
        assert!(!id.is_empty());
    }
}
