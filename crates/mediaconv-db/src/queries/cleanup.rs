//! Cleanup queue: prior storage locations awaiting deferred purge.

use chrono::Utc;
use mediaconv_common::{CleanupKind, Error, Result};
use rusqlite::Connection;

use crate::models::CleanupEntry;

/// Queue a prior storage location for later purge.
pub fn enqueue_cleanup(
    conn: &Connection,
    kind: CleanupKind,
    reference: &str,
    item_uri: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO cleanup_queue (kind, reference, item_uri, created_at) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![kind.to_string(), reference, item_uri, Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(conn.last_insert_rowid())
}

/// Entries not yet purged, oldest first.
pub fn list_pending(conn: &Connection) -> Result<Vec<CleanupEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, kind, reference, item_uri, purged_at FROM cleanup_queue
             WHERE purged_at IS NULL ORDER BY id",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let rows = stmt
        .query_map([], CleanupEntry::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Mark an entry as handled.
pub fn mark_purged(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE cleanup_queue SET purged_at = ?1 WHERE id = ?2 AND purged_at IS NULL",
            rusqlite::params![Utc::now().to_rfc3339(), id],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};

    #[test]
    fn test_enqueue_and_purge() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let first = enqueue_cleanup(&conn, CleanupKind::Blob, "blob-1", "item://master/x").unwrap();
        enqueue_cleanup(&conn, CleanupKind::File, "/App_Data/a.png", "item://master/y").unwrap();

        let pending = list_pending(&conn).unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].kind, CleanupKind::Blob);
        assert_eq!(pending[1].reference, "/App_Data/a.png");
        assert!(!pending[0].purged);

        assert!(mark_purged(&conn, first).unwrap());
        assert!(!mark_purged(&conn, first).unwrap());
        assert_eq!(list_pending(&conn).unwrap().len(), 1);
    }
}
