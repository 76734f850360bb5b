//! User account queries.

use mediaconv_common::{Error, Result, UserId};
use rusqlite::{Connection, OptionalExtension};

use crate::models::User;

/// Create a new user.
pub fn create_user(conn: &Connection, name: &str, is_admin: bool) -> Result<User> {
    if name.trim().is_empty() {
        return Err(Error::invalid_input("User name must not be empty"));
    }

    let id = UserId::new();
    conn.execute(
        "INSERT INTO users (id, name, is_admin) VALUES (?1, ?2, ?3)",
        rusqlite::params![id.to_string(), name, is_admin],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(User {
        id,
        name: name.to_string(),
        is_admin,
    })
}

/// Get a user by ID.
pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, is_admin FROM users WHERE id = ?1",
        [id.to_string()],
        User::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Get a user by name (case-insensitive).
pub fn get_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, name, is_admin FROM users WHERE name = ?1 COLLATE NOCASE",
        [name],
        User::from_row,
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}
