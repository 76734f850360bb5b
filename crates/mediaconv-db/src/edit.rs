//! Scoped edit transaction.
//!
//! [`EditContext`] wraps every field mutation of an item: it opens an
//! immediate transaction when created and either commits explicitly via
//! [`EditContext::commit`] or rolls back when dropped. No exit path leaves
//! the transaction open.

use std::ops::Deref;

use mediaconv_common::{Error, Result};
use rusqlite::Connection;

/// Acquire/commit-or-discard guard around a set of field writes.
///
/// Generic over the connection handle so it works with both borrowed
/// connections and pooled connections owned by the guard.
pub struct EditContext<C: Deref<Target = Connection>> {
    conn: C,
    finished: bool,
}

impl<C: Deref<Target = Connection>> EditContext<C> {
    /// Begin an edit. Takes the database write lock immediately so that a
    /// conflicting writer fails here rather than at commit.
    pub fn begin(conn: C) -> Result<Self> {
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| Error::database(format!("Failed to begin edit: {}", e)))?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    /// Connection to run the edit's statements on.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Commit all writes made through this edit.
    pub fn commit(mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Error::database(format!("Failed to commit edit: {}", e)))?;
        self.finished = true;
        Ok(())
    }

    /// Discard all writes made through this edit.
    pub fn rollback(mut self) -> Result<()> {
        self.finished = true;
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::database(format!("Failed to roll back edit: {}", e)))
    }
}

impl<C: Deref<Target = Connection>> Drop for EditContext<C> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                tracing::warn!("Failed to roll back abandoned edit: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::upgrade;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        upgrade(&conn).unwrap();
        conn
    }

    fn user_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap()
    }

    fn insert_user(conn: &Connection, name: &str) {
        conn.execute(
            "INSERT INTO users (id, name, is_admin) VALUES (?, ?, 0)",
            rusqlite::params![name, name],
        )
        .unwrap();
    }

    #[test]
    fn test_commit_persists_writes() {
        let conn = setup();
        let edit = EditContext::begin(&conn).unwrap();
        insert_user(edit.conn(), "a");
        edit.commit().unwrap();
        assert_eq!(user_count(&conn), 1);
    }

    #[test]
    fn test_drop_discards_writes() {
        let conn = setup();
        {
            let edit = EditContext::begin(&conn).unwrap();
            insert_user(edit.conn(), "a");
        }
        assert_eq!(user_count(&conn), 0);
    }

    #[test]
    fn test_early_return_discards_writes() {
        fn failing_edit(conn: &Connection) -> Result<()> {
            let edit = EditContext::begin(conn)?;
            insert_user(edit.conn(), "a");
            Err(Error::internal("write failed"))?;
            edit.commit()
        }

        let conn = setup();
        assert!(failing_edit(&conn).is_err());
        assert_eq!(user_count(&conn), 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn test_explicit_rollback() {
        let conn = setup();
        let edit = EditContext::begin(&conn).unwrap();
        insert_user(edit.conn(), "a");
        edit.rollback().unwrap();
        assert_eq!(user_count(&conn), 0);
        assert!(conn.is_autocommit());
    }
}
