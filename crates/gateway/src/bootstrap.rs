//! AppState construction shared by `serve` and `send`.
//!
//! Builds the store, the configured dispatcher, and the scheduler. Recovery
//! (loading persisted jobs, catch-up firing, re-arming timers) is a separate
//! step so one-shot CLI commands can boot without touching armed jobs.

use std::sync::Arc;

use anyhow::Context;

use chime_domain::config::{Config, ConfigSeverity};
use chime_engine::{Clock, FsStore, Scheduler, Store, SystemClock};

use crate::state::AppState;

/// Validate config and wire the scheduling engine. Does NOT recover
/// persisted jobs — call [`Scheduler::recover`] before serving.
pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── State store ──────────────────────────────────────────────────
    let store: Arc<dyn Store> = Arc::new(
        FsStore::open(&config.store.state_path, config.store.history_limit)
            .context("opening state store")?,
    );
    tracing::info!(
        path = %config.store.state_path.display(),
        history_limit = config.store.history_limit,
        "state store ready"
    );

    // ── Dispatcher ───────────────────────────────────────────────────
    let dispatcher = crate::dispatch::from_config(&config.dispatch);
    tracing::info!(mode = ?config.dispatch.mode, "dispatcher ready");

    // ── Scheduler ────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let scheduler = Arc::new(Scheduler::new(
        store,
        dispatcher,
        clock,
        config.store.history_limit,
    ));
    tracing::info!("scheduler ready");

    Ok(AppState { config, scheduler })
}
