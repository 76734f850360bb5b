use mediaconv_common::{JobId, JobStatus};
use mediaconv_db::pool::{get_conn, DbPool};
use mediaconv_db::queries::jobs;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Point-in-time view of a job, safe to take while the job is running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub name: String,
    pub category: String,
    pub status: JobStatus,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub messages: Vec<String>,
}

#[derive(Debug, Default)]
struct Progress {
    processed: u64,
    skipped: u64,
    failed: u64,
    messages: Vec<String>,
}

struct Inner {
    id: JobId,
    name: String,
    category: String,
    pool: DbPool,
    progress: RwLock<Progress>,
    status_tx: watch::Sender<JobStatus>,
}

/// Shared handle to a registered job.
///
/// The worker running the job reports through it; any number of readers
/// may poll it concurrently.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<Inner>,
}

impl JobHandle {
    pub(super) fn new(id: JobId, name: &str, category: &str, pool: DbPool) -> Self {
        let (status_tx, _) = watch::channel(JobStatus::Queued);
        Self {
            inner: Arc::new(Inner {
                id,
                name: name.to_string(),
                category: category.to_string(),
                pool,
                progress: RwLock::new(Progress::default()),
                status_tx,
            }),
        }
    }

    pub fn id(&self) -> JobId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn category(&self) -> &str {
        &self.inner.category
    }

    pub fn status(&self) -> JobStatus {
        *self.inner.status_tx.borrow()
    }

    /// Append a human-readable status line.
    pub fn add_message(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(job = %self.inner.name, "{}", message);

        match get_conn(&self.inner.pool)
            .and_then(|conn| jobs::append_job_message(&conn, self.inner.id, &message))
        {
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to persist job message: {}", e),
        }

        self.inner.progress.write().messages.push(message);
    }

    pub fn messages(&self) -> Vec<String> {
        self.inner.progress.read().messages.clone()
    }

    /// Replace the outcome counters.
    pub fn update_counts(&self, processed: u64, skipped: u64, failed: u64) {
        {
            let mut progress = self.inner.progress.write();
            progress.processed = processed;
            progress.skipped = skipped;
            progress.failed = failed;
        }

        if let Err(e) = get_conn(&self.inner.pool).and_then(|conn| {
            jobs::update_job_counts(&conn, self.inner.id, processed, skipped, failed)
        }) {
            tracing::warn!("Failed to persist job counts: {}", e);
        }
    }

    pub fn snapshot(&self) -> JobSnapshot {
        let progress = self.inner.progress.read();
        JobSnapshot {
            id: self.inner.id,
            name: self.inner.name.clone(),
            category: self.inner.category.clone(),
            status: self.status(),
            processed: progress.processed,
            skipped: progress.skipped,
            failed: progress.failed,
            messages: progress.messages.clone(),
        }
    }

    pub(super) fn set_status(&self, status: JobStatus) {
        if let Err(e) = get_conn(&self.inner.pool)
            .and_then(|conn| jobs::update_job_status(&conn, self.inner.id, status))
        {
            tracing::warn!("Failed to persist job status: {}", e);
        }
        self.inner.status_tx.send_replace(status);
    }

    /// Wait until the job has completed or failed.
    pub async fn wait(&self) -> JobStatus {
        let mut rx = self.inner.status_tx.subscribe();
        let status = match rx.wait_for(|status| status.is_finished()).await {
            Ok(status) => *status,
            // sender is owned by `self`
            Err(_) => self.status(),
        };
        status
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}
