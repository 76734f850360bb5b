//! Persisted job records and their status messages.

use chrono::Utc;
use mediaconv_common::{Error, JobId, JobStatus, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Job, JobMessage};

const COLS: &str = "id, name, category, status, processed, skipped, failed,
    created_at, started_at, completed_at";

/// Register a new queued job.
pub fn create_job(conn: &Connection, name: &str, category: &str) -> Result<Job> {
    let id = JobId::new();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO jobs (id, name, category, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
            id.to_string(),
            name,
            category,
            JobStatus::Queued.to_string(),
            now.to_rfc3339()
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Job {
        id,
        name: name.to_string(),
        category: category.to_string(),
        status: JobStatus::Queued,
        processed: 0,
        skipped: 0,
        failed: 0,
        created_at: now,
        started_at: None,
        completed_at: None,
    })
}

/// Get a job by ID.
pub fn get_job(conn: &Connection, id: JobId) -> Result<Option<Job>> {
    let q = format!("SELECT {COLS} FROM jobs WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], Job::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// The most recently created job with the given name.
pub fn get_latest_job_by_name(conn: &Connection, name: &str) -> Result<Option<Job>> {
    let q = format!(
        "SELECT {COLS} FROM jobs WHERE name = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1"
    );
    conn.query_row(&q, [name], Job::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Move a job to `status`, stamping start/completion times as appropriate.
pub fn update_job_status(conn: &Connection, id: JobId, status: JobStatus) -> Result<bool> {
    let now = Utc::now().to_rfc3339();
    let n = match status {
        JobStatus::Running => conn.execute(
            "UPDATE jobs SET status = ?1, started_at = ?2 WHERE id = ?3",
            rusqlite::params![status.to_string(), now, id.to_string()],
        ),
        JobStatus::Completed | JobStatus::Failed => conn.execute(
            "UPDATE jobs SET status = ?1, completed_at = ?2 WHERE id = ?3",
            rusqlite::params![status.to_string(), now, id.to_string()],
        ),
        JobStatus::Queued => conn.execute(
            "UPDATE jobs SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.to_string(), id.to_string()],
        ),
    }
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Store the job's outcome counters.
pub fn update_job_counts(
    conn: &Connection,
    id: JobId,
    processed: u64,
    skipped: u64,
    failed: u64,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE jobs SET processed = ?1, skipped = ?2, failed = ?3 WHERE id = ?4",
            rusqlite::params![processed as i64, skipped as i64, failed as i64, id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Append a status line to a job. Returns its sequence number.
pub fn append_job_message(conn: &Connection, id: JobId, message: &str) -> Result<u32> {
    let seq: u32 = conn
        .query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM job_messages WHERE job_id = ?1",
            [id.to_string()],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO job_messages (job_id, seq, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![id.to_string(), seq, message, Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(seq)
}

/// All status lines of a job in the order they were added.
pub fn list_job_messages(conn: &Connection, id: JobId) -> Result<Vec<JobMessage>> {
    let mut stmt = conn
        .prepare("SELECT seq, message FROM job_messages WHERE job_id = ?1 ORDER BY seq")
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([id.to_string()], |row| {
            Ok(JobMessage {
                seq: row.get(0)?,
                message: row.get(1)?,
            })
        })
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}
