//! Deferred purge of prior storage locations.
//!
//! Conversions never delete the data they moved away from. They queue the old
//! blob id or file path instead, and [`purge`] removes it later, but only
//! once no field value references it anymore.

use mediaconv_common::{paths, CleanupKind, Result};
use mediaconv_db::models::CleanupEntry;
use mediaconv_db::pool::{get_conn, DbPool};
use mediaconv_db::queries::{blobs, cleanup, fields};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::MediaConfig;

/// What a purge pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub blobs_deleted: u64,
    pub files_deleted: u64,
    /// Entries whose location is still referenced and was kept.
    pub retained: u64,
    /// Entries that could not be processed; they stay queued.
    pub failed: u64,
}

/// Process every pending cleanup entry.
pub fn purge(pool: &DbPool, media: &MediaConfig) -> Result<PurgeReport> {
    let pending = {
        let conn = get_conn(pool)?;
        cleanup::list_pending(&conn)?
    };

    let mut report = PurgeReport::default();
    for entry in pending {
        match purge_entry(pool, media, &entry) {
            Ok(Purged::Blob) => report.blobs_deleted += 1,
            Ok(Purged::File) => report.files_deleted += 1,
            Ok(Purged::Retained) => report.retained += 1,
            Err(e) => {
                warn!("Failed to purge {} {}: {}", entry.kind, entry.reference, e);
                report.failed += 1;
            }
        }
    }

    info!(
        "Purge finished: {} blob(s) and {} file(s) deleted, {} retained, {} failed",
        report.blobs_deleted, report.files_deleted, report.retained, report.failed
    );
    Ok(report)
}

enum Purged {
    Blob,
    File,
    Retained,
}

fn purge_entry(pool: &DbPool, media: &MediaConfig, entry: &CleanupEntry) -> Result<Purged> {
    let conn = get_conn(pool)?;

    let field = match entry.kind {
        CleanupKind::Blob => &media.blob_field,
        CleanupKind::File => &media.file_path_field,
    };
    let references = fields::count_value_references(&conn, field, &entry.reference)?;

    let purged = if references > 0 {
        debug!(
            "Keeping {} {}: still referenced {} time(s)",
            entry.kind, entry.reference, references
        );
        Purged::Retained
    } else {
        match entry.kind {
            CleanupKind::Blob => {
                if !blobs::delete_blob(&conn, &entry.reference)? {
                    debug!("Blob {} was already gone", entry.reference);
                }
                Purged::Blob
            }
            CleanupKind::File => {
                let path = paths::map_path(&media.data_root, &entry.reference);
                match std::fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!("File {:?} was already gone", path);
                    }
                    Err(e) => return Err(e.into()),
                }
                Purged::File
            }
        }
    };

    cleanup::mark_purged(&conn, entry.id)?;
    Ok(purged)
}
