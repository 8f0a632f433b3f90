//! Crash/restart recovery: persisted state drives catch-up and re-arming.
//!
//! The scheduler's observable behavior must be independent of how long the
//! process was down, aside from a single bounded catch-up dispatch per job.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use chime_engine::{
    Clock, Dispatcher, FsStore, HistoryEntry, Job, ManualClock, Payload, Priority,
    RecurrenceKind, RecurrenceRule, Scheduler, Store,
};

struct CountingDispatcher {
    calls: AtomicUsize,
}

#[async_trait::async_trait]
impl Dispatcher for CountingDispatcher {
    async fn deliver(&self, _payload: &Payload) -> chime_domain::Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("delivery-{n}"))
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
}

fn payload() -> Payload {
    Payload {
        title: "reminder".into(),
        message: "water the plants".into(),
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

fn persisted_job(
    next_fire_time: Option<DateTime<Utc>>,
    recurrence: Option<RecurrenceRule>,
    active: bool,
) -> Job {
    Job {
        id: Uuid::new_v4(),
        payload: payload(),
        first_fire_time: t0() - chrono::Duration::days(200),
        recurrence,
        next_fire_time,
        last_fire_time: None,
        active,
        created_at: t0() - chrono::Duration::days(200),
    }
}

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
async fn hundred_day_outage_produces_one_catchup_fire() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());

    // A daily job whose occurrence elapsed 100 days ago.
    let job = persisted_job(Some(t0() - chrono::Duration::days(100)), Some(daily()), true);
    let job_id = job.id;
    store.upsert_job(&job).await.unwrap();

    let clock = Arc::new(ManualClock::new(t0()));
    let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
    let scheduler = Scheduler::new(store, dispatcher.clone(), clock.clone(), 100);

    let loaded = scheduler.recover().await.unwrap();
    assert_eq!(loaded, 1);

    // Exactly one catch-up, not one hundred.
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    assert_eq!(scheduler.history(10).len(), 1);

    // The next occurrence is anchored to the recovery time.
    let recovered = scheduler.get(&job_id).unwrap();
    assert_eq!(
        recovered.next_fire_time.unwrap(),
        clock.now() + chrono::Duration::days(1)
    );
    assert!(recovered.active);
}

#[tokio::test]
async fn past_due_one_shot_catches_up_then_completes() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());

    let job = persisted_job(Some(t0() - chrono::Duration::hours(3)), None, true);
    let job_id = job.id;
    store.upsert_job(&job).await.unwrap();

    let clock = Arc::new(ManualClock::new(t0()));
    let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
    let scheduler = Scheduler::new(store, dispatcher.clone(), clock.clone(), 100);
    scheduler.recover().await.unwrap();

    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 1);
    let recovered = scheduler.get(&job_id).unwrap();
    assert!(!recovered.active);
    assert!(recovered.next_fire_time.is_none());
}

#[tokio::test]
async fn future_job_is_armed_not_fired() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());

    let job = persisted_job(Some(t0() + chrono::Duration::hours(2)), Some(daily()), true);
    store.upsert_job(&job).await.unwrap();

    let clock = Arc::new(ManualClock::new(t0()));
    let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
    let scheduler = Scheduler::new(store, dispatcher.clone(), clock.clone(), 100);
    scheduler.recover().await.unwrap();

    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);

    clock.advance(Duration::from_secs(3 * 3600));
    wait_for(|| dispatcher.calls.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn inactive_jobs_are_loaded_but_never_fired() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());

    let paused = persisted_job(Some(t0() - chrono::Duration::days(2)), Some(daily()), false);
    store.upsert_job(&paused).await.unwrap();

    let clock = Arc::new(ManualClock::new(t0()));
    let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
    let scheduler = Scheduler::new(store, dispatcher.clone(), clock.clone(), 100);
    scheduler.recover().await.unwrap();

    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    // Still visible to callers; pruning is their decision, not ours.
    assert_eq!(scheduler.list().len(), 1);

    clock.advance(Duration::from_secs(7 * 86_400));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn submitted_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let clock = Arc::new(ManualClock::new(t0()));

    // First process: submit a job and send one immediate notification.
    let submitted_id = {
        let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());
        let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
        let scheduler = Scheduler::new(store, dispatcher, clock.clone(), 100);
        let id = scheduler
            .submit(payload(), t0() + chrono::Duration::days(1), Some(daily()))
            .await
            .unwrap();
        scheduler.dispatch_now(payload()).await.unwrap();
        id
    };

    // Second process: recover from the same directory.
    let store = Arc::new(FsStore::open(dir.path(), 100).unwrap());
    let dispatcher = Arc::new(CountingDispatcher { calls: AtomicUsize::new(0) });
    let scheduler = Scheduler::new(store, dispatcher.clone(), clock.clone(), 100);
    scheduler.recover().await.unwrap();

    // No catch-up needed — the occurrence is still a day away.
    assert_eq!(dispatcher.calls.load(Ordering::SeqCst), 0);
    let job = scheduler.get(&submitted_id).unwrap();
    assert!(job.active);
    assert_eq!(job.next_fire_time.unwrap(), t0() + chrono::Duration::days(1));

    // The dispatch-now record came back too.
    let history: Vec<HistoryEntry> = scheduler.history(10);
    assert_eq!(history.len(), 1);
    assert!(history[0].job_id.is_none());
}
