//! Time abstraction so timing-sensitive code stays deterministic in tests.
//!
//! The scheduler never calls `Utc::now()` or `tokio::time::sleep` directly;
//! it goes through a [`Clock`] so tests can fast-forward a [`ManualClock`]
//! instead of sleeping in real time.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::Notify;

#[async_trait::async_trait]
pub trait Clock: Send + Sync + 'static {
    /// Current wall-clock time.
    fn now(&self) -> DateTime<Utc>;
    /// Suspend the calling task for `duration`. Cancel-safe.
    async fn sleep(&self, duration: Duration);
}

/// Real clock backed by system time and the tokio timer.
pub struct SystemClock;

#[async_trait::async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Manual clock — time only moves when [`advance`](ManualClock::advance) or
/// [`set`](ManualClock::set) is called, and every pending `sleep` is
/// re-checked against the new time.
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
    tick: Notify,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
            tick: Notify::new(),
        }
    }

    /// Move time forward by `duration` and wake all sleepers.
    pub fn advance(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        {
            let mut now = self.now.write();
            *now += delta;
        }
        self.tick.notify_waiters();
    }

    /// Jump time to an absolute instant and wake all sleepers.
    pub fn set(&self, to: DateTime<Utc>) {
        {
            let mut now = self.now.write();
            *now = to;
        }
        self.tick.notify_waiters();
    }
}

#[async_trait::async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read()
    }

    async fn sleep(&self, duration: Duration) {
        let delta = chrono::Duration::from_std(duration)
            .unwrap_or_else(|_| chrono::Duration::max_value());
        let deadline = self
            .now()
            .checked_add_signed(delta)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        loop {
            // Register interest before the check so a concurrent advance()
            // between the check and the await is not lost.
            let notified = self.tick.notified();
            if self.now() >= deadline {
                return;
            }
            notified.await;
        }
    }
}
