//! Binary content stored inline in the database.
//!
//! Blob data is streamed through SQLite incremental blob I/O in caller-sized
//! chunks, so large payloads are never held in memory as a whole.

use std::io::{Read, Write};

use chrono::Utc;
use mediaconv_common::{Error, Result};
use rusqlite::{Connection, DatabaseName, OptionalExtension};
use uuid::Uuid;

fn blob_rowid(conn: &Connection, id: &str) -> Result<Option<i64>> {
    conn.query_row("SELECT rowid FROM blobs WHERE id = ?1", [id], |row| row.get(0))
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Store `len` bytes read from `reader` as a new blob and return its id.
///
/// Fails when the reader yields fewer than `len` bytes.
pub fn create_blob_from_reader(
    conn: &Connection,
    reader: &mut dyn Read,
    len: u64,
    chunk_size: usize,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let size = i64::try_from(len)
        .map_err(|_| Error::invalid_input(format!("Blob of {} bytes is too large", len)))?;

    conn.execute(
        "INSERT INTO blobs (id, data, created_at) VALUES (?1, zeroblob(?2), ?3)",
        rusqlite::params![&id, size, Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    let rowid = conn.last_insert_rowid();
    let mut blob = conn
        .blob_open(DatabaseName::Main, "blobs", "data", rowid, false)
        .map_err(|e| Error::database(e.to_string()))?;

    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut written: u64 = 0;
    while written < len {
        let want = buffer.len().min((len - written) as usize);
        let read = reader.read(&mut buffer[..want])?;
        if read == 0 {
            return Err(Error::internal(format!(
                "Content stream ended after {} of {} bytes",
                written, len
            )));
        }
        blob.write_all(&buffer[..read])?;
        written += read as u64;
    }

    Ok(id)
}

/// Store an in-memory byte slice as a new blob.
pub fn create_blob(conn: &Connection, data: &[u8]) -> Result<String> {
    let mut reader = data;
    create_blob_from_reader(conn, &mut reader, data.len() as u64, 8192)
}

/// Size of a blob in bytes, `None` when the id is unknown.
pub fn blob_size(conn: &Connection, id: &str) -> Result<Option<u64>> {
    conn.query_row("SELECT length(data) FROM blobs WHERE id = ?1", [id], |row| {
        row.get::<_, i64>(0)
    })
    .optional()
    .map(|size| size.map(|s| s as u64))
    .map_err(|e| Error::database(e.to_string()))
}

/// Stream a blob into `writer` in `chunk_size` pieces.
///
/// Returns the number of bytes copied, or `None` when the id is unknown.
pub fn copy_blob_to(
    conn: &Connection,
    id: &str,
    writer: &mut dyn Write,
    chunk_size: usize,
) -> Result<Option<u64>> {
    let Some(rowid) = blob_rowid(conn, id)? else {
        return Ok(None);
    };

    let mut blob = conn
        .blob_open(DatabaseName::Main, "blobs", "data", rowid, true)
        .map_err(|e| Error::database(e.to_string()))?;

    let mut buffer = vec![0u8; chunk_size.max(1)];
    let mut copied: u64 = 0;
    loop {
        let read = blob.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        writer.write_all(&buffer[..read])?;
        copied += read as u64;
    }

    Ok(Some(copied))
}

/// Read a whole blob into memory.
pub fn get_blob(conn: &Connection, id: &str) -> Result<Option<Vec<u8>>> {
    let mut data = Vec::new();
    Ok(copy_blob_to(conn, id, &mut data, 8192)?.map(|_| data))
}

/// Delete a blob. Returns whether a row was removed.
pub fn delete_blob(conn: &Connection, id: &str) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM blobs WHERE id = ?1", [id])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}
