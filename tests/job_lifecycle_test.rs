//! Job lifecycle integration tests.
//!
//! Starts conversions through [`MediaConversionManager`] and checks the job
//! status record, persisted counters and queued cleanup references.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{reference, TestHarness};
use mediaconv::conversion::{ConversionOptions, MediaConversionManager, JOB_CATEGORY, JOB_NAME};
use mediaconv::jobs::JobManager;
use mediaconv_common::{CleanupKind, ConversionTarget, Error, ItemId, ItemUri, JobStatus};
use mediaconv_db::queries::cleanup;

fn manager(h: &TestHarness) -> MediaConversionManager {
    MediaConversionManager::new(
        h.repo.clone(),
        Arc::new(JobManager::new(h.pool.clone())),
        h.settings.clone(),
    )
}

// ---------------------------------------------------------------------------
// Queue -> run -> complete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn conversion_job_reports_summary_and_persists_state() {
    let h = TestHarness::new();
    let folder = h.folder(&h.media_root, "images");
    h.blob_item(&folder, "one", "unversioned image", b"first");
    h.blob_item(&folder, "two", "unversioned image", b"second");
    h.blob_item(&folder, "empty", "unversioned image", b"");

    let manager = manager(&h);
    let job = manager
        .start_conversion(
            vec![reference(&folder, true)],
            ConversionOptions::new(ConversionTarget::File),
            "admin",
        )
        .unwrap();
    assert_eq!(job.name(), JOB_NAME);
    assert_eq!(job.category(), JOB_CATEGORY);

    assert_eq!(job.wait().await, JobStatus::Completed);

    let messages = job.messages();
    assert_eq!(messages.len(), 4);
    assert!(messages[0].starts_with("Failed item://master/"));
    assert!(messages[0].contains("does not have any media content"));
    assert_eq!(
        &messages[1..],
        ["Items processed: 2", "Items skipped: 0", "Items failed: 1"]
    );

    let snapshot = job.snapshot();
    assert_eq!((snapshot.processed, snapshot.skipped, snapshot.failed), (2, 0, 1));
    assert_eq!(manager.current_job().map(|j| j.id()), Some(job.id()));

    let (persisted, persisted_messages) = JobManager::new(h.pool.clone())
        .load_persisted(JOB_NAME)
        .unwrap()
        .expect("persisted job");
    assert_eq!(persisted.id, job.id());
    assert_eq!(persisted.status, JobStatus::Completed);
    assert_eq!((persisted.processed, persisted.skipped, persisted.failed), (2, 0, 1));
    assert!(persisted.started_at.is_some());
    assert!(persisted.completed_at.is_some());
    let lines: Vec<_> = persisted_messages.into_iter().map(|m| m.message).collect();
    assert_eq!(lines, messages);

    let pending = cleanup::list_pending(&h.conn()).unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|entry| entry.kind == CleanupKind::Blob));
}

#[tokio::test]
async fn cleanup_queue_failure_is_reported_before_the_summary() {
    let h = TestHarness::new();
    let item = h.blob_item(&h.media_root, "logo", "unversioned image", b"png");
    h.conn().execute_batch("DROP TABLE cleanup_queue").unwrap();

    let job = manager(&h)
        .start_conversion(
            vec![reference(&item, false)],
            ConversionOptions::new(ConversionTarget::File),
            "admin",
        )
        .unwrap();
    assert_eq!(job.wait().await, JobStatus::Completed);

    // The conversion itself committed.
    assert!(h.item(&item.uri).field_value("file path").starts_with("/App_Data/MediaFiles/"));
    assert_eq!(
        job.messages(),
        [
            "Failed to queue 1 cleanup reference(s)",
            "Items processed: 1",
            "Items skipped: 0",
            "Items failed: 0",
        ]
    );
}

#[test]
fn cleanup_references_are_queued_as_versions_commit() {
    let h = TestHarness::new();
    let item = h.blob_item(&h.media_root, "banner", "versioned image", b"first");
    h.add_blob_version(&item, b"second");

    // No job and no manager: the processor queues on its own.
    let ctx = h.run(ConversionTarget::File, vec![reference(&item, false)], &h.admin);
    assert_eq!(ctx.statistics.processed(), 2);

    let pending = cleanup::list_pending(&h.conn()).unwrap();
    let queued: Vec<_> = pending.iter().map(|entry| entry.reference.clone()).collect();
    let expected: Vec<_> = ctx
        .cleanup_references
        .iter()
        .map(|(_, cleanup)| cleanup.reference.clone())
        .collect();
    assert_eq!(queued.len(), 2);
    assert_eq!(queued, expected);
}

#[tokio::test]
async fn stop_signal_set_before_start_converts_nothing() {
    let h = TestHarness::new();
    let item = h.blob_item(&h.media_root, "logo", "unversioned image", b"png");

    let options = ConversionOptions::new(ConversionTarget::File);
    options.force_stop.set();
    let job = manager(&h)
        .start_conversion(vec![reference(&item, false)], options, "admin")
        .unwrap();

    assert_eq!(job.wait().await, JobStatus::Completed);
    assert_eq!(
        job.messages(),
        ["Items processed: 0", "Items skipped: 0", "Items failed: 0"]
    );
    assert_eq!(h.item(&item.uri).field_value("file path"), "");
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_references_are_rejected() {
    let h = TestHarness::new();
    let manager = manager(&h);

    let result = manager.start_conversion(Vec::new(), ConversionOptions::new(ConversionTarget::File), "admin");
    assert_matches!(result, Err(Error::InvalidInput(_)));
    assert!(manager.current_job().is_none());
}

#[tokio::test]
async fn unknown_user_is_rejected() {
    let h = TestHarness::new();
    let item = h.blob_item(&h.media_root, "logo", "unversioned image", b"png");
    let manager = manager(&h);

    let result = manager.start_conversion(
        vec![reference(&item, false)],
        ConversionOptions::new(ConversionTarget::File),
        "nobody",
    );
    assert_matches!(result, Err(Error::NotFound(_)));
    assert!(manager.current_job().is_none());
}

#[tokio::test]
async fn unknown_reference_is_rejected() {
    let h = TestHarness::new();
    let manager = manager(&h);
    let missing = mediaconv::conversion::ConversionReference::new(
        ItemUri::latest(common::DATABASE, ItemId::new()),
        true,
    );

    let result = manager.start_conversion(vec![missing], ConversionOptions::new(ConversionTarget::File), "admin");
    assert_matches!(result, Err(Error::NotFound(_)));
    assert!(JobManager::new(h.pool.clone()).load_persisted(JOB_NAME).unwrap().is_none());
}

#[test]
fn starting_outside_a_runtime_fails() {
    let h = TestHarness::new();
    let item = h.blob_item(&h.media_root, "logo", "unversioned image", b"png");

    let result = manager(&h).start_conversion(
        vec![reference(&item, false)],
        ConversionOptions::new(ConversionTarget::File),
        "admin",
    );
    assert_matches!(result, Err(Error::Internal(_)));
}

// ---------------------------------------------------------------------------
// Generic jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn failing_work_marks_job_failed() {
    let h = TestHarness::new();
    let jobs = JobManager::new(h.pool.clone());

    let job = jobs
        .start("Broken", "Tests", |job| {
            job.add_message("starting");
            anyhow::bail!("disk on fire")
        })
        .unwrap();

    assert_eq!(job.wait().await, JobStatus::Failed);
    assert_eq!(job.messages(), ["starting", "Job failed: disk on fire"]);
    assert!(!jobs.is_active("Broken"));
}
