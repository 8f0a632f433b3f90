//! Job and delivery-history data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recurrence::RecurrenceRule;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payload
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Notification priority, passed through to the dispatcher untouched.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Normal,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

/// What a notification says and where it goes. Immutable after submission —
/// edits are modeled as cancel + re-submit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payload {
    pub title: String,
    pub message: String,
    /// Destination understood by the configured dispatcher (webhook URL,
    /// channel id, ...). Opaque to the scheduler.
    pub destination: String,
    #[serde(default)]
    pub priority: Priority,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A scheduled notification with its current firing state.
///
/// `status` is NOT stored — it is derived from `active`/`next_fire_time` via
/// [`Job::computed_status`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub payload: Payload,
    /// Absolute timestamp of the first/only occurrence.
    pub first_fire_time: DateTime<Utc>,
    /// Absent = one-shot job.
    #[serde(default)]
    pub recurrence: Option<RecurrenceRule>,
    /// Next pending occurrence; `None` once no further occurrences exist.
    #[serde(default)]
    pub next_fire_time: Option<DateTime<Utc>>,
    /// Set after every dispatch attempt, success or failure.
    #[serde(default)]
    pub last_fire_time: Option<DateTime<Utc>>,
    /// `false` means the job will not be re-armed even if `next_fire_time`
    /// is set (paused or cancelled).
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl Job {
    pub fn is_one_shot(&self) -> bool {
        self.recurrence.is_none()
    }

    /// Derive status from firing state. Never stored.
    pub fn computed_status(&self) -> JobStatus {
        if self.active {
            JobStatus::Scheduled
        } else if self.next_fire_time.is_some() {
            JobStatus::Paused
        } else {
            JobStatus::Done
        }
    }

    /// Build an API-facing view with the computed `status` field.
    pub fn to_view(&self) -> JobView {
        JobView {
            job: self.clone(),
            status: self.computed_status(),
        }
    }
}

/// API response wrapper that includes the computed `status` field.
#[derive(Clone, Debug, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub job: Job,
    pub status: JobStatus,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Armed — a timer is (or will be) pending for `next_fire_time`.
    Scheduled,
    /// Deactivated with a pending occurrence preserved; resumable.
    Paused,
    /// No further occurrences: completed one-shot, expired, or cancelled.
    Done,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// History
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One dispatch attempt, success or failure. Append-only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    /// `None` for direct dispatch-now sends.
    #[serde(default)]
    pub job_id: Option<Uuid>,
    pub fired_at: DateTime<Utc>,
    pub success: bool,
    #[serde(default)]
    pub error_detail: Option<String>,
    /// Destination the dispatcher was handed, echoed for the record.
    pub destination: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Job events (for SSE)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    JobUpdated { job: JobView },
    JobFired { job_id: Uuid, entry_id: Uuid, success: bool },
}
