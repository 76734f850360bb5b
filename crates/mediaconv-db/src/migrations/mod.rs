//! Content store schema upgrades.
//!
//! The schema version lives in SQLite's `PRAGMA user_version`. Each step
//! below brings the store from `version - 1` to `version` inside its own
//! transaction, bumping `user_version` as its last statement so a failed
//! step leaves the store at the previous version.

use rusqlite::Connection;
use thiserror::Error;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Upgrade steps, indexed by `version - 1`.
const STEPS: [&str; SCHEMA_VERSION as usize] = [include_str!("001_initial.sql")];

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Upgrade to schema version {version} failed: {source}")]
    Step {
        version: u32,
        source: rusqlite::Error,
    },

    #[error("Content store has schema version {found}, this build supports up to {supported}")]
    Unsupported { found: u32, supported: u32 },
}

/// Versions before and after [`upgrade`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaUpgrade {
    pub from: u32,
    pub to: u32,
}

impl SchemaUpgrade {
    pub fn applied(&self) -> u32 {
        self.to - self.from
    }
}

pub fn schema_version(conn: &Connection) -> Result<u32, SchemaError> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

/// Bring the store up to [`SCHEMA_VERSION`].
///
/// Refuses stores written by a newer build.
pub fn upgrade(conn: &Connection) -> Result<SchemaUpgrade, SchemaError> {
    let from = schema_version(conn)?;
    if from > SCHEMA_VERSION {
        return Err(SchemaError::Unsupported {
            found: from,
            supported: SCHEMA_VERSION,
        });
    }

    for version in from + 1..=SCHEMA_VERSION {
        let step = |e| SchemaError::Step { version, source: e };
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(STEPS[version as usize - 1]).map_err(step)?;
        tx.pragma_update(None, "user_version", version).map_err(step)?;
        tx.commit().map_err(step)?;
        tracing::info!("Upgraded content store schema to version {}", version);
    }

    Ok(SchemaUpgrade {
        from,
        to: SCHEMA_VERSION,
    })
}
