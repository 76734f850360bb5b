//! Connection pooling for the content store.
//!
//! Every pooled connection is prepared by [`StoreCustomizer`] when r2d2
//! opens it; the schema is upgraded once, through the first connection, when
//! the pool is created.

use std::time::Duration;

use mediaconv_common::{Error, Result};
use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Connections for a file-backed store.
const FILE_POOL_SIZE: u32 = 4;

/// Per-connection settings applied when r2d2 opens a connection.
#[derive(Debug, Clone, Copy)]
struct StoreCustomizer {
    busy_timeout: Option<Duration>,
}

impl CustomizeConnection<Connection, rusqlite::Error> for StoreCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        if let Some(timeout) = self.busy_timeout {
            conn.busy_timeout(timeout)?;
        }
        conn.pragma_update(None, "foreign_keys", true)
    }
}

/// Open (creating if needed) the content store at `db_path`.
///
/// Connections enforce foreign keys and wait up to five seconds on a locked
/// database. Pending schema upgrades run before the pool is returned.
///
/// # Example
///
/// ```no_run
/// use mediaconv_db::pool::init_pool;
///
/// let pool = init_pool("/var/lib/mediaconv/content.db").unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_pool(db_path: &str) -> Result<DbPool> {
    let pool = build(
        SqliteConnectionManager::file(db_path),
        FILE_POOL_SIZE,
        StoreCustomizer {
            busy_timeout: Some(Duration::from_secs(5)),
        },
    )?;
    tracing::debug!("Opened content store at {}", db_path);
    Ok(pool)
}

/// An in-memory content store.
///
/// Every SQLite in-memory connection is a separate database, so this pool
/// holds exactly one connection. Callers must not hold a connection while
/// requesting another one.
///
/// ```
/// use mediaconv_db::pool::init_memory_pool;
///
/// let pool = init_memory_pool().unwrap();
/// let conn = pool.get().unwrap();
/// ```
pub fn init_memory_pool() -> Result<DbPool> {
    build(
        SqliteConnectionManager::memory(),
        1,
        StoreCustomizer { busy_timeout: None },
    )
}

fn build(manager: SqliteConnectionManager, size: u32, customizer: StoreCustomizer) -> Result<DbPool> {
    let pool = Pool::builder()
        .max_size(size)
        .connection_customizer(Box::new(customizer))
        .build(manager)
        .map_err(|e| Error::database(format!("Failed to create connection pool: {}", e)))?;

    let conn = get_conn(&pool)?;
    let upgrade = migrations::upgrade(&conn)
        .map_err(|e| Error::database(format!("Failed to upgrade content store schema: {}", e)))?;
    if upgrade.applied() > 0 {
        tracing::info!(
            "Content store schema upgraded from version {} to {}",
            upgrade.from,
            upgrade.to
        );
    }
    drop(conn);

    Ok(pool)
}

/// `pool.get()` with the r2d2 error mapped into [`Error::Database`].
pub fn get_conn(pool: &DbPool) -> Result<PooledConnection> {
    pool.get()
        .map_err(|e| Error::database(format!("Failed to get connection from pool: {}", e)))
}
