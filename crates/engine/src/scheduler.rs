//! Scheduler — owns the job table, arms per-job timers, runs the firing
//! protocol, writes through to the store, and records delivery history.
//!
//! Concurrency model: one suspended timer task per armed job. Firings of
//! different jobs proceed independently; firings of the same job are
//! serialized by a per-job lock. Table-level structural changes take a
//! short-lived write lock; per-job field mutation takes the job's own lock,
//! so `cancel` never waits behind an in-flight dispatch.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use chime_domain::{Error, Result};

use crate::clock::Clock;
use crate::dispatch::Dispatcher;
use crate::model::{HistoryEntry, Job, JobEvent, Payload};
use crate::recurrence::{self, RecurrenceRule};
use crate::store::Store;
use crate::validation::validate_rule;

/// Per-job slot. `state` guards quick field mutation; `fire_lock` serializes
/// firing-protocol executions; `timer` holds the armed sleeper task.
struct JobSlot {
    state: Mutex<Job>,
    fire_lock: tokio::sync::Mutex<()>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl JobSlot {
    fn new(job: Job) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(job),
            fire_lock: tokio::sync::Mutex::new(()),
            timer: Mutex::new(None),
        })
    }

    fn disarm(&self) {
        if let Some(handle) = self.timer.lock().take() {
            handle.abort();
        }
    }
}

pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: RwLock<HashMap<Uuid, Arc<JobSlot>>>,
    history: Mutex<VecDeque<HistoryEntry>>,
    history_limit: usize,
    store: Arc<dyn Store>,
    dispatcher: Arc<dyn Dispatcher>,
    clock: Arc<dyn Clock>,
    event_tx: broadcast::Sender<JobEvent>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn Store>,
        dispatcher: Arc<dyn Dispatcher>,
        clock: Arc<dyn Clock>,
        history_limit: usize,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                history: Mutex::new(VecDeque::new()),
                history_limit,
                store,
                dispatcher,
                clock,
                event_tx,
            }),
        }
    }

    /// Load persisted state and re-arm timers. Jobs whose fire time elapsed
    /// while the process was down are fired once, synchronously, before this
    /// returns — one catch-up dispatch per job no matter how long the outage.
    pub async fn recover(&self) -> Result<usize> {
        let entries = self
            .inner
            .store
            .load_history(self.inner.history_limit)
            .await?;
        *self.inner.history.lock() = entries.into();

        let jobs = self.inner.store.load_all().await?;
        let count = jobs.len();

        let mut due = Vec::new();
        {
            let mut table = self.inner.jobs.write();
            let now = self.inner.clock.now();
            for job in jobs {
                let id = job.id;
                let pending = job.active.then_some(job.next_fire_time).flatten();
                table.insert(id, JobSlot::new(job));
                match pending {
                    Some(at) if at <= now => due.push(id),
                    Some(at) => Inner::arm_locked(&self.inner, &table, id, at),
                    None => {}
                }
            }
        }

        for id in due {
            debug!(job_id = %id, "catch-up fire for missed occurrence");
            Inner::fire(&self.inner, id).await;
        }

        info!(count, "scheduler recovered persisted jobs");
        Ok(count)
    }

    /// Schedule a notification. One-shot jobs must have a future fire time;
    /// recurring jobs with a past `first_fire_time` are accepted and fire
    /// immediately (they catch up exactly once, then resume their cadence).
    ///
    /// The job is armed before the durable write; if the write fails the
    /// error is surfaced but the job stays scheduled in this process.
    pub async fn submit(
        &self,
        payload: Payload,
        first_fire_time: DateTime<Utc>,
        recurrence: Option<RecurrenceRule>,
    ) -> Result<Uuid> {
        if let Some(rule) = &recurrence {
            validate_rule(rule)?;
        }
        let now = self.inner.clock.now();
        if recurrence.is_none() && first_fire_time <= now {
            return Err(Error::PastScheduleTime(first_fire_time));
        }

        let job = Job {
            id: Uuid::new_v4(),
            payload,
            first_fire_time,
            recurrence,
            next_fire_time: Some(first_fire_time),
            last_fire_time: None,
            active: true,
            created_at: now,
        };
        let id = job.id;

        {
            let mut table = self.inner.jobs.write();
            table.insert(id, JobSlot::new(job.clone()));
            Inner::arm_locked(&self.inner, &table, id, first_fire_time);
        }
        info!(job_id = %id, fire_at = %first_fire_time, recurring = job.recurrence.is_some(), "job submitted");

        self.inner.store.upsert_job(&job).await?;
        let _ = self.inner.event_tx.send(JobEvent::JobUpdated { job: job.to_view() });
        Ok(id)
    }

    /// Disarm and deactivate. Returns `Ok(false)` for unknown ids. Idempotent.
    pub async fn cancel(&self, id: Uuid) -> Result<bool> {
        let Some(slot) = self.slot(&id) else {
            return Ok(false);
        };
        let job = {
            let mut state = slot.state.lock();
            state.active = false;
            state.next_fire_time = None;
            state.clone()
        };
        slot.disarm();
        info!(job_id = %id, "job cancelled");

        self.inner.store.upsert_job(&job).await?;
        let _ = self.inner.event_tx.send(JobEvent::JobUpdated { job: job.to_view() });
        Ok(true)
    }

    /// Like cancel, but the pending occurrence is preserved so the job can
    /// be resumed.
    pub async fn pause(&self, id: Uuid) -> Result<bool> {
        let Some(slot) = self.slot(&id) else {
            return Ok(false);
        };
        let job = {
            let mut state = slot.state.lock();
            state.active = false;
            state.clone()
        };
        slot.disarm();
        info!(job_id = %id, "job paused");

        self.inner.store.upsert_job(&job).await?;
        let _ = self.inner.event_tx.send(JobEvent::JobUpdated { job: job.to_view() });
        Ok(true)
    }

    /// Re-activate a paused (or cancelled) job and re-arm its timer.
    ///
    /// A recurring job whose pending occurrence already passed gets a fresh
    /// one computed from the current time. One-shot jobs that already fired
    /// or whose fire time passed are permanently done.
    pub async fn resume(&self, id: Uuid) -> Result<Job> {
        let slot = self.slot(&id).ok_or(Error::UnknownJob(id))?;
        let now = self.inner.clock.now();

        let job = {
            let mut state = slot.state.lock();
            if !state.active {
                let rule = state.recurrence.clone();
                match rule {
                    None => {
                        if state.last_fire_time.is_some() || state.first_fire_time <= now {
                            return Err(Error::CannotResumeCompletedJob(id));
                        }
                        state.next_fire_time = Some(state.first_fire_time);
                    }
                    Some(rule) => {
                        let next = match state.next_fire_time {
                            Some(next) if next > now => next,
                            _ => recurrence::next_occurrence(now, &rule)?,
                        };
                        state.next_fire_time = Some(next);
                    }
                }
                state.active = true;
            }
            state.clone()
        };

        if let Some(at) = job.next_fire_time {
            Inner::arm(&self.inner, id, at);
        }
        info!(job_id = %id, next_fire = ?job.next_fire_time, "job resumed");

        self.inner.store.upsert_job(&job).await?;
        let _ = self.inner.event_tx.send(JobEvent::JobUpdated { job: job.to_view() });
        Ok(job)
    }

    /// Snapshot of every job, oldest submission first.
    pub fn list(&self) -> Vec<Job> {
        let mut jobs: Vec<Job> = self
            .inner
            .jobs
            .read()
            .values()
            .map(|slot| slot.state.lock().clone())
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    pub fn get(&self, id: &Uuid) -> Option<Job> {
        self.slot(id).map(|slot| slot.state.lock().clone())
    }

    /// Most recent first.
    pub fn history(&self, limit: usize) -> Vec<HistoryEntry> {
        self.inner
            .history
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    /// Bypass scheduling entirely and deliver right now. The attempt is
    /// recorded to history with no job id; the entry's `success` flag
    /// carries the outcome.
    pub async fn dispatch_now(&self, payload: Payload) -> Result<HistoryEntry> {
        let outcome = self.inner.dispatch_guarded(&payload).await;
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            job_id: None,
            fired_at: self.inner.clock.now(),
            success: outcome.is_ok(),
            error_detail: outcome.err(),
            destination: payload.destination,
        };
        self.inner.push_history(entry.clone());
        self.inner.store.append_history(&entry).await?;
        Ok(entry)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.event_tx.subscribe()
    }

    fn slot(&self, id: &Uuid) -> Option<Arc<JobSlot>> {
        self.inner.jobs.read().get(id).cloned()
    }
}

impl Inner {
    /// Arm (or re-arm) the timer for `id`. The sleeper only sleeps; the
    /// firing protocol runs in its own task so that aborting a pending
    /// timer can never interrupt an in-flight dispatch.
    fn arm(inner: &Arc<Inner>, id: Uuid, fire_at: DateTime<Utc>) {
        let table = inner.jobs.read();
        Inner::arm_locked(inner, &table, id, fire_at);
    }

    fn arm_locked(
        inner: &Arc<Inner>,
        table: &HashMap<Uuid, Arc<JobSlot>>,
        id: Uuid,
        fire_at: DateTime<Utc>,
    ) {
        let Some(slot) = table.get(&id) else { return };
        let inner = inner.clone();
        let handle = tokio::spawn(async move {
            let delay = (fire_at - inner.clock.now())
                .to_std()
                .unwrap_or(Duration::ZERO);
            if !delay.is_zero() {
                inner.clock.sleep(delay).await;
            }
            tokio::spawn(async move { Inner::fire(&inner, id).await });
        });
        let mut timer = slot.timer.lock();
        if let Some(old) = timer.replace(handle) {
            old.abort();
        }
    }

    /// The firing protocol: dispatch, record, recompute, re-arm, persist.
    async fn fire(inner: &Arc<Inner>, id: Uuid) {
        let Some(slot) = inner.jobs.read().get(&id).cloned() else {
            return;
        };
        let _serialized = slot.fire_lock.lock().await;

        // The job may have been cancelled between arming and firing — a
        // benign race, not an error.
        let (payload, rule) = {
            let state = slot.state.lock();
            if !state.active {
                debug!(job_id = %id, "skipping fire for inactive job");
                return;
            }
            (state.payload.clone(), state.recurrence.clone())
        };

        let outcome = inner.dispatch_guarded(&payload).await;
        let now = inner.clock.now();
        match &outcome {
            Ok(delivery_id) => info!(job_id = %id, delivery_id, "dispatched"),
            Err(e) => warn!(job_id = %id, error = %e, "dispatch failed"),
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            job_id: Some(id),
            fired_at: now,
            success: outcome.is_ok(),
            error_detail: outcome.err(),
            destination: payload.destination,
        };
        inner.push_history(entry.clone());
        if let Err(e) = inner.store.append_history(&entry).await {
            warn!(job_id = %id, error = %e, "failed to persist history entry");
        }

        // Recompute from `now`, never from the previous next_fire_time: a
        // process suspended for ten days fires once on resume, not ten
        // times. A failed dispatch does not break the chain — the job
        // self-heals on its next cycle.
        let (job, rearm_at) = {
            let mut state = slot.state.lock();
            state.last_fire_time = Some(now);
            let mut rearm_at = None;
            match &rule {
                None => {
                    state.active = false;
                    state.next_fire_time = None;
                }
                Some(rule) => match recurrence::next_occurrence(now, rule) {
                    Ok(candidate) => {
                        let expired = rule.end_time.is_some_and(|end| candidate > end);
                        if expired {
                            state.active = false;
                            state.next_fire_time = None;
                            info!(job_id = %id, "recurrence end reached, job done");
                        } else if !state.active {
                            // Cancelled while the dispatch was in flight:
                            // deliver stands, but never re-arm.
                        } else {
                            state.next_fire_time = Some(candidate);
                            rearm_at = Some(candidate);
                        }
                    }
                    Err(e) => {
                        warn!(job_id = %id, error = %e, "recurrence stopped advancing, deactivating job");
                        state.active = false;
                        state.next_fire_time = None;
                    }
                },
            }
            (state.clone(), rearm_at)
        };

        if let Err(e) = inner.store.upsert_job(&job).await {
            warn!(job_id = %id, error = %e, "failed to persist job after fire");
        }
        let _ = inner.event_tx.send(JobEvent::JobFired {
            job_id: id,
            entry_id: entry.id,
            success: entry.success,
        });
        let _ = inner.event_tx.send(JobEvent::JobUpdated { job: job.to_view() });

        if let Some(at) = rearm_at {
            Inner::arm(inner, id, at);
        }
    }

    /// Run the dispatcher in its own task so a panicking transport is
    /// contained and recorded as a failure instead of killing the firing
    /// task for all future occurrences.
    async fn dispatch_guarded(&self, payload: &Payload) -> std::result::Result<String, String> {
        let dispatcher = self.dispatcher.clone();
        let payload = payload.clone();
        let attempt = tokio::spawn(async move { dispatcher.deliver(&payload).await });
        match attempt.await {
            Ok(Ok(delivery_id)) => Ok(delivery_id),
            Ok(Err(e)) => Err(e.to_string()),
            Err(join_err) => Err(format!("dispatcher panicked: {join_err}")),
        }
    }

    fn push_history(&self, entry: HistoryEntry) {
        let mut history = self.history.lock();
        history.push_back(entry);
        while history.len() > self.history_limit {
            history.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::Priority;
    use crate::recurrence::RecurrenceKind;
    use crate::store::MemoryStore;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Dispatcher stub that records every payload it is handed.
    #[derive(Default)]
    struct StubDispatcher {
        delivered: Mutex<Vec<Payload>>,
        fail: AtomicBool,
        panic: AtomicBool,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Dispatcher for StubDispatcher {
        async fn deliver(&self, payload: &Payload) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic.load(Ordering::SeqCst) {
                panic!("transport blew up");
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Dispatch("stub transport refused".into()));
            }
            self.delivered.lock().push(payload.clone());
            Ok(format!("delivery-{}", self.calls.load(Ordering::SeqCst)))
        }
    }

    struct Harness {
        scheduler: Scheduler,
        clock: Arc<ManualClock>,
        dispatcher: Arc<StubDispatcher>,
        store: Arc<MemoryStore>,
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    }

    fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(t0()));
        let dispatcher = Arc::new(StubDispatcher::default());
        let store = Arc::new(MemoryStore::new());
        let scheduler = Scheduler::new(
            store.clone(),
            dispatcher.clone(),
            clock.clone(),
            100,
        );
        Harness { scheduler, clock, dispatcher, store }
    }

    fn payload() -> Payload {
        Payload {
            title: "X".into(),
            message: "body".into(),
            destination: "https://example.com/hook".into(),
            priority: Priority::Normal,
        }
    }

    fn daily() -> RecurrenceRule {
        RecurrenceRule {
            kind: RecurrenceKind::Daily,
            interval: 1,
            end_time: None,
            anchor_day_of_week: None,
            anchor_day_of_month: None,
        }
    }

    /// Poll until `cond` holds; the timer tasks run on the real executor
    /// even though job time is virtual.
    async fn wait_for(mut cond: impl FnMut() -> bool) {
        for _ in 0..200 {
            if cond() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    #[tokio::test]
    async fn one_shot_with_past_time_is_rejected() {
        let h = harness();
        let err = h
            .scheduler
            .submit(payload(), t0() - chrono::Duration::hours(1), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PastScheduleTime(_)));
        assert!(h.scheduler.list().is_empty());
    }

    #[tokio::test]
    async fn zero_interval_rule_is_rejected_at_submission() {
        let h = harness();
        let mut rule = daily();
        rule.interval = 0;
        let err = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::hours(1), Some(rule))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRecurrenceRule(_)));
    }

    #[tokio::test]
    async fn one_shot_fires_once_then_completes() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), None)
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let entries = h.scheduler.history(10);
        assert!(entries[0].success);
        assert_eq!(entries[0].job_id, Some(id));

        let job = h.scheduler.get(&id).unwrap();
        assert!(!job.active);
        assert!(job.next_fire_time.is_none());
        assert!(job.last_fire_time.is_some());

        // Nothing further happens no matter how far time goes.
        h.clock.advance(Duration::from_secs(86_400 * 7));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_job_never_dispatches() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(30), None)
            .await
            .unwrap();
        assert!(h.scheduler.cancel(id).await.unwrap());
        // Idempotent.
        assert!(h.scheduler.cancel(id).await.unwrap());
        assert!(!h.scheduler.cancel(Uuid::new_v4()).await.unwrap());

        h.clock.advance(Duration::from_secs(3600));
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 0);
        assert!(h.scheduler.history(10).is_empty());
    }

    #[tokio::test]
    async fn recurring_reschedules_relative_to_each_fire() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::hours(1), Some(daily()))
            .await
            .unwrap();

        let mut previous_next = h.scheduler.get(&id).unwrap().next_fire_time.unwrap();
        for round in 1..=3u32 {
            let fire_at = previous_next;
            h.clock.set(fire_at + chrono::Duration::minutes(5));
            wait_for(|| h.scheduler.history(10).len() == round as usize).await;

            let job = h.scheduler.get(&id).unwrap();
            let next = job.next_fire_time.unwrap();
            // Advanced ~1 day from the fire time, not from the original anchor.
            assert_eq!(next, h.clock.now() + chrono::Duration::days(1));
            assert!(next > previous_next);
            assert!(job.active);
            previous_next = next;
        }
        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn recurring_submitted_in_past_fires_immediately_once() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() - chrono::Duration::days(10), Some(daily()))
            .await
            .unwrap();

        wait_for(|| h.scheduler.history(10).len() == 1).await;
        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 1);

        // Next occurrence is anchored to now, so no catch-up storm follows.
        let job = h.scheduler.get(&id).unwrap();
        assert_eq!(job.next_fire_time.unwrap(), h.clock.now() + chrono::Duration::days(1));
    }

    #[tokio::test]
    async fn failed_dispatch_keeps_recurrence_alive() {
        let h = harness();
        h.dispatcher.fail.store(true, Ordering::SeqCst);
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), Some(daily()))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let entries = h.scheduler.history(10);
        assert!(!entries[0].success);
        assert!(entries[0].error_detail.as_deref().unwrap().contains("refused"));

        // The chain survives: next cycle succeeds.
        let job = h.scheduler.get(&id).unwrap();
        assert!(job.active);
        let next = job.next_fire_time.unwrap();
        h.dispatcher.fail.store(false, Ordering::SeqCst);
        h.clock.set(next);
        wait_for(|| h.scheduler.history(10).len() == 2).await;
        assert!(h.scheduler.history(10)[0].success);
    }

    #[tokio::test]
    async fn one_shot_failure_is_not_retried() {
        let h = harness();
        h.dispatcher.fail.store(true, Ordering::SeqCst);
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), None)
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let job = h.scheduler.get(&id).unwrap();
        assert!(!job.active);
        assert!(job.next_fire_time.is_none());

        h.clock.advance(Duration::from_secs(86_400));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panicking_dispatcher_is_recorded_as_failure() {
        let h = harness();
        h.dispatcher.panic.store(true, Ordering::SeqCst);
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), Some(daily()))
            .await
            .unwrap();

        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let entries = h.scheduler.history(10);
        assert!(!entries[0].success);
        assert!(entries[0].error_detail.as_deref().unwrap().contains("panic"));

        // The job survived its own transport blowing up.
        let job = h.scheduler.get(&id).unwrap();
        assert!(job.active);
        assert!(job.next_fire_time.is_some());
    }

    #[tokio::test]
    async fn end_time_expires_recurrence() {
        let h = harness();
        let mut rule = daily();
        rule.end_time = Some(t0() + chrono::Duration::hours(20));
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::hours(1), Some(rule))
            .await
            .unwrap();

        // Fires at +1h; the next candidate (~+25h) exceeds the +20h end_time.
        h.clock.set(t0() + chrono::Duration::hours(1) + chrono::Duration::minutes(5));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let job = h.scheduler.get(&id).unwrap();
        assert!(!job.active);
        assert!(job.next_fire_time.is_none());
    }

    #[tokio::test]
    async fn pause_stops_firing_and_resume_recomputes() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::hours(1), Some(daily()))
            .await
            .unwrap();

        assert!(h.scheduler.pause(id).await.unwrap());
        let paused = h.scheduler.get(&id).unwrap();
        assert!(!paused.active);
        // Pause preserves the pending occurrence.
        assert!(paused.next_fire_time.is_some());

        // Let the original fire time sail past while paused.
        h.clock.advance(Duration::from_secs(3600 * 48));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(h.dispatcher.calls.load(Ordering::SeqCst), 0);

        // Resume recomputes the stale occurrence from the current time.
        let resumed = h.scheduler.resume(id).await.unwrap();
        let next = resumed.next_fire_time.unwrap();
        assert!(next > h.clock.now());

        h.clock.set(next);
        wait_for(|| h.scheduler.history(10).len() == 1).await;
    }

    #[tokio::test]
    async fn resume_of_completed_one_shot_fails() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), None)
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let err = h.scheduler.resume(id).await.unwrap_err();
        assert!(matches!(err, Error::CannotResumeCompletedJob(_)));
    }

    #[tokio::test]
    async fn resume_of_past_due_paused_one_shot_fails() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(30), None)
            .await
            .unwrap();
        assert!(h.scheduler.pause(id).await.unwrap());
        h.clock.advance(Duration::from_secs(120));

        let err = h.scheduler.resume(id).await.unwrap_err();
        assert!(matches!(err, Error::CannotResumeCompletedJob(_)));
    }

    #[tokio::test]
    async fn resume_unknown_job_errors() {
        let h = harness();
        let err = h.scheduler.resume(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, Error::UnknownJob(_)));
    }

    #[tokio::test]
    async fn dispatch_now_records_entry_without_job_id() {
        let h = harness();
        let entry = h.scheduler.dispatch_now(payload()).await.unwrap();
        assert!(entry.success);
        assert!(entry.job_id.is_none());

        let entries = h.scheduler.history(10);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, entry.id);
        // Persisted too.
        assert_eq!(h.store.load_history(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn history_is_most_recent_first_and_bounded() {
        let h = harness();
        for _ in 0..5 {
            h.scheduler.dispatch_now(payload()).await.unwrap();
        }
        let entries = h.scheduler.history(3);
        assert_eq!(entries.len(), 3);
        assert!(entries[0].fired_at >= entries[1].fired_at);
        assert!(entries[1].fired_at >= entries[2].fired_at);
    }

    #[tokio::test]
    async fn submit_persists_job_to_store() {
        let h = harness();
        let id = h
            .scheduler
            .submit(payload(), t0() + chrono::Duration::hours(1), None)
            .await
            .unwrap();
        let persisted = h.store.load_all().await.unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].id, id);
        assert!(persisted[0].active);
    }

    #[tokio::test]
    async fn events_broadcast_on_fire() {
        let h = harness();
        let mut rx = h.scheduler.subscribe();
        h.scheduler
            .submit(payload(), t0() + chrono::Duration::seconds(1), None)
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(2));
        wait_for(|| h.scheduler.history(10).len() == 1).await;

        let mut saw_fired = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, JobEvent::JobFired { success: true, .. }) {
                saw_fired = true;
            }
        }
        assert!(saw_fired);
    }
}
