//! `chimed send` — one-shot delivery from the terminal.
//!
//! Boots the store and dispatcher but performs no recovery, so armed jobs
//! belonging to a running daemon are left alone; the attempt is still
//! recorded to the shared delivery history.

use std::sync::Arc;

use chime_domain::config::{Config, DispatchMode};
use chime_engine::{Payload, Priority};

pub async fn run(
    config: Arc<Config>,
    title: String,
    message: String,
    destination: String,
    priority: String,
) -> anyhow::Result<()> {
    let priority = parse_priority(&priority)?;

    if config.dispatch.mode == DispatchMode::Webhook {
        if let Err(msg) = crate::dispatch::validate_url(&destination) {
            anyhow::bail!("invalid destination URL '{destination}': {msg}");
        }
    }

    let state = crate::bootstrap::build_app_state(config).await?;
    let entry = state
        .scheduler
        .dispatch_now(Payload {
            title,
            message,
            destination,
            priority,
        })
        .await
        .map_err(|e| anyhow::anyhow!("recording delivery: {e}"))?;

    if entry.success {
        println!("delivered ({})", entry.id);
        Ok(())
    } else {
        anyhow::bail!(
            "delivery failed: {}",
            entry.error_detail.unwrap_or_else(|| "unknown error".into())
        )
    }
}

fn parse_priority(s: &str) -> anyhow::Result<Priority> {
    match s {
        "low" => Ok(Priority::Low),
        "normal" => Ok(Priority::Normal),
        "high" => Ok(Priority::High),
        other => anyhow::bail!("unknown priority '{other}' — use low, normal, or high"),
    }
}
