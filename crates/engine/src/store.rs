//! Persistence contract and the built-in stores.
//!
//! The scheduler writes through after every state transition and never reads
//! back — the store is load-on-start, save-on-every-mutation. Jobs are
//! persisted one JSON file per record (so concurrent firings of different
//! jobs never clobber each other), history as an append-only JSONL capped at
//! `history_limit`.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use uuid::Uuid;

use chime_domain::{Error, Result};

use crate::model::{HistoryEntry, Job};

#[async_trait::async_trait]
pub trait Store: Send + Sync + 'static {
    /// Load every persisted job, active or not.
    async fn load_all(&self) -> Result<Vec<Job>>;
    /// Load up to `limit` of the most recent history entries, oldest first.
    async fn load_history(&self, limit: usize) -> Result<Vec<HistoryEntry>>;
    /// Insert or replace a single job record.
    async fn upsert_job(&self, job: &Job) -> Result<()>;
    /// Append one history entry.
    async fn append_history(&self, entry: &HistoryEntry) -> Result<()>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// FsStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Filesystem-backed store: `jobs/<id>.json` per job, `history.jsonl`
/// appended per entry and trimmed to `history_limit` on load.
pub struct FsStore {
    jobs_dir: PathBuf,
    history_path: PathBuf,
    history_limit: usize,
}

impl FsStore {
    pub fn open(state_path: &Path, history_limit: usize) -> Result<Self> {
        let jobs_dir = state_path.join("jobs");
        fs::create_dir_all(&jobs_dir)?;
        Ok(Self {
            jobs_dir,
            history_path: state_path.join("history.jsonl"),
            history_limit,
        })
    }

    fn job_path(&self, id: &Uuid) -> PathBuf {
        self.jobs_dir.join(format!("{id}.json"))
    }

    /// Write temp then rename so readers never observe a partial record.
    fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
        let tmp = path.with_extension("tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, path)
    }

    fn rewrite_history(path: &Path, entries: &[HistoryEntry]) -> Result<()> {
        let mut buf = Vec::new();
        for entry in entries {
            serde_json::to_writer(&mut buf, entry)?;
            buf.push(b'\n');
        }
        Self::write_atomic(path, &buf)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Store for FsStore {
    async fn load_all(&self) -> Result<Vec<Job>> {
        let mut jobs = Vec::new();
        for dirent in fs::read_dir(&self.jobs_dir)? {
            let path = dirent?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = fs::read_to_string(&path)?;
            match serde_json::from_str::<Job>(&data) {
                Ok(job) => jobs.push(job),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable job record");
                }
            }
        }
        Ok(jobs)
    }

    async fn load_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let data = match fs::read_to_string(&self.history_path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries: Vec<HistoryEntry> = Vec::new();
        for line in data.lines() {
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(e) => tracing::warn!(error = %e, "skipping unreadable history line"),
            }
        }

        // Enforce the retention cap on disk, not just in memory.
        if entries.len() > self.history_limit {
            let excess = entries.len() - self.history_limit;
            entries.drain(..excess);
            Self::rewrite_history(&self.history_path, &entries)?;
            tracing::info!(dropped = excess, "trimmed history to retention cap");
        }

        if entries.len() > limit {
            let skip = entries.len() - limit;
            entries.drain(..skip);
        }
        Ok(entries)
    }

    async fn upsert_job(&self, job: &Job) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(job)?;
        let path = self.job_path(&job.id);
        tokio::task::spawn_blocking(move || Self::write_atomic(&path, &bytes))
            .await
            .map_err(|e| Error::Store(format!("job write task failed: {e}")))??;
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        let path = self.history_path.clone();
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut f = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)?;
            f.write_all(&line)
        })
        .await
        .map_err(|e| Error::Store(format!("history write task failed: {e}")))??;
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MemoryStore
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Volatile store for tests and embedded use.
#[derive(Default)]
pub struct MemoryStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
    history: RwLock<Vec<HistoryEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn load_all(&self) -> Result<Vec<Job>> {
        Ok(self.jobs.read().values().cloned().collect())
    }

    async fn load_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let history = self.history.read();
        let skip = history.len().saturating_sub(limit);
        Ok(history[skip..].to_vec())
    }

    async fn upsert_job(&self, job: &Job) -> Result<()> {
        self.jobs.write().insert(job.id, job.clone());
        Ok(())
    }

    async fn append_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.history.write().push(entry.clone());
        Ok(())
    }
}
