/// Shared error type used across all Chime crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A one-shot job was submitted with a fire time that already passed.
    #[error("schedule time {0} is in the past")]
    PastScheduleTime(chrono::DateTime<chrono::Utc>),

    /// Zero/negative interval, bad anchor, or a rule whose next occurrence
    /// would not advance. Rejected at submission, never at fire time.
    #[error("invalid recurrence rule: {0}")]
    InvalidRecurrenceRule(String),

    #[error("unknown job: {0}")]
    UnknownJob(uuid::Uuid),

    /// One-shot jobs that already fired are permanently done.
    #[error("job {0} has completed and cannot be resumed")]
    CannotResumeCompletedJob(uuid::Uuid),

    #[error("dispatch: {0}")]
    Dispatch(String),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
