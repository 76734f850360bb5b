//! Background job subsystem.
//!
//! Long-running operations are registered under a name, persisted to the
//! `jobs` table and executed on tokio's blocking thread pool. Callers get a
//! [`JobHandle`] to append status lines, report counters, take snapshots
//! and wait for completion.

mod handle;

pub use handle::{JobHandle, JobSnapshot};

use dashmap::DashMap;
use mediaconv_common::{Error, JobStatus, Result};
use mediaconv_db::models::{Job, JobMessage};
use mediaconv_db::pool::{get_conn, DbPool};
use mediaconv_db::queries::jobs;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{error, info};

/// Registry of named jobs.
pub struct JobManager {
    pool: DbPool,
    jobs: DashMap<String, JobHandle>,
}

impl JobManager {
    pub fn new(pool: DbPool) -> Self {
        Self {
            pool,
            jobs: DashMap::new(),
        }
    }

    /// Register a job and run `work` on a blocking worker thread.
    ///
    /// Must be called from within a tokio runtime. The job is marked
    /// completed when `work` returns `Ok`, and failed when it returns an
    /// error or panics.
    pub fn start<F>(&self, name: &str, category: &str, work: F) -> Result<JobHandle>
    where
        F: FnOnce(&JobHandle) -> anyhow::Result<()> + Send + 'static,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::internal(format!("No async runtime to run job '{}': {}", name, e)))?;

        let job = {
            let conn = get_conn(&self.pool)?;
            jobs::create_job(&conn, name, category)?
        };

        let handle = JobHandle::new(job.id, name, category, self.pool.clone());
        self.jobs.insert(name.to_string(), handle.clone());
        info!("Job '{}' ({}) queued in category {}", name, job.id, category);

        let worker = handle.clone();
        runtime.spawn_blocking(move || {
            worker.set_status(JobStatus::Running);
            info!("Job '{}' started", worker.name());

            let result = catch_unwind(AssertUnwindSafe(|| work(&worker)));
            match result {
                Ok(Ok(())) => {
                    worker.set_status(JobStatus::Completed);
                    info!("Job '{}' completed", worker.name());
                }
                Ok(Err(e)) => {
                    error!("Job '{}' failed: {:#}", worker.name(), e);
                    worker.add_message(format!("Job failed: {:#}", e));
                    worker.set_status(JobStatus::Failed);
                }
                Err(_) => {
                    error!("Job '{}' panicked", worker.name());
                    worker.add_message("Job failed: worker panicked");
                    worker.set_status(JobStatus::Failed);
                }
            }
        });

        Ok(handle)
    }

    /// The most recently started job with the given name, if started by
    /// this manager.
    pub fn get_job(&self, name: &str) -> Option<JobHandle> {
        self.jobs.get(name).map(|entry| entry.value().clone())
    }

    /// Whether a job with the given name is queued or running.
    pub fn is_active(&self, name: &str) -> bool {
        self.get_job(name)
            .map(|job| !job.status().is_finished())
            .unwrap_or(false)
    }

    /// Persisted record and status lines of the latest job with the given
    /// name, including jobs from earlier processes.
    pub fn load_persisted(&self, name: &str) -> Result<Option<(Job, Vec<JobMessage>)>> {
        let conn = get_conn(&self.pool)?;
        match jobs::get_latest_job_by_name(&conn, name)? {
            Some(job) => {
                let messages = jobs::list_job_messages(&conn, job.id)?;
                Ok(Some((job, messages)))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaconv_db::pool::init_pool;

    fn manager() -> (tempfile::TempDir, JobManager) {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&dir.path().join("jobs.db").to_string_lossy()).unwrap();
        (dir, JobManager::new(pool))
    }

    #[tokio::test]
    async fn test_job_completes_and_persists_messages() {
        let (_dir, manager) = manager();

        let handle = manager
            .start("Sample", "Tests", |job| {
                job.add_message("hello");
                job.update_counts(1, 2, 3);
                Ok(())
            })
            .unwrap();

        assert_eq!(handle.wait().await, JobStatus::Completed);
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.messages, vec!["hello"]);
        assert_eq!((snapshot.processed, snapshot.skipped, snapshot.failed), (1, 2, 3));

        let (job, messages) = manager.load_persisted("Sample").unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.category, "Tests");
        assert_eq!(job.failed, 3);
        assert_eq!(messages.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_job_is_marked_failed() {
        let (_dir, manager) = manager();

        let handle = manager
            .start("Broken", "Tests", |_| anyhow::bail!("boom"))
            .unwrap();

        assert_eq!(handle.wait().await, JobStatus::Failed);
        assert!(handle.messages()[0].contains("boom"));
    }

    #[tokio::test]
    async fn test_panicking_job_is_marked_failed() {
        let (_dir, manager) = manager();

        let handle = manager
            .start("Panics", "Tests", |_| panic!("worker exploded"))
            .unwrap();

        assert_eq!(handle.wait().await, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_get_job_by_name() {
        let (_dir, manager) = manager();
        assert!(manager.get_job("Sample").is_none());

        let handle = manager.start("Sample", "Tests", |_| Ok(())).unwrap();
        let found = manager.get_job("Sample").unwrap();
        assert_eq!(found.id(), handle.id());

        found.wait().await;
        assert!(!manager.is_active("Sample"));
    }

    #[test]
    fn test_start_outside_runtime_fails() {
        let (_dir, manager) = manager();
        let result = manager.start("Sample", "Tests", |_| Ok(()));
        assert!(matches!(result, Err(Error::Internal(_))));
    }
}
