//! Item access rules and authorization checks.
//!
//! A rule grants or denies one access right on one item to one user. Rules
//! are inherited down the tree: the nearest explicit rule on the item or one
//! of its ancestors decides. Administrators are always allowed; everyone else
//! is denied by default.

use mediaconv_common::{AccessRight, Error, ItemId, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{parse_opt_column, User};

/// Set (or replace) an explicit rule on an item.
pub fn set_access(
    conn: &Connection,
    item_id: ItemId,
    user: &User,
    right: AccessRight,
    allowed: bool,
) -> Result<()> {
    conn.execute(
        "INSERT INTO access_rules (item_id, user_id, access_right, allowed)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(item_id, user_id, access_right) DO UPDATE SET allowed = excluded.allowed",
        rusqlite::params![item_id.to_string(), user.id.to_string(), right.to_string(), allowed],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Check whether `user` holds `right` on `item_id`.
pub fn is_allowed(conn: &Connection, item_id: ItemId, user: &User, right: AccessRight) -> Result<bool> {
    if user.is_admin {
        return Ok(true);
    }

    let mut current = Some(item_id);
    while let Some(id) = current {
        let rule: Option<bool> = conn
            .query_row(
                "SELECT allowed FROM access_rules
                 WHERE item_id = ?1 AND user_id = ?2 AND access_right = ?3",
                rusqlite::params![id.to_string(), user.id.to_string(), right.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::database(e.to_string()))?;

        if let Some(allowed) = rule {
            return Ok(allowed);
        }

        current = conn
            .query_row(
                "SELECT parent_id FROM items WHERE id = ?1",
                [id.to_string()],
                |row| parse_opt_column(row, 0),
            )
            .optional()
            .map_err(|e| Error::database(e.to_string()))?
            .flatten();
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{get_conn, init_memory_pool};
    use crate::queries::{items, users};

    #[test]
    fn test_default_deny_and_admin_allow() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let root = items::create_item(&conn, "master", None, "media library", "media folder").unwrap();
        let editor = users::create_user(&conn, "editor", false).unwrap();
        let admin = users::create_user(&conn, "admin", true).unwrap();

        assert!(!is_allowed(&conn, root.id(), &editor, AccessRight::ItemRead).unwrap());
        assert!(is_allowed(&conn, root.id(), &admin, AccessRight::ItemWrite).unwrap());
    }

    #[test]
    fn test_rules_inherit_and_nearest_wins() {
        let pool = init_memory_pool().unwrap();
        let conn = get_conn(&pool).unwrap();

        let root = items::create_item(&conn, "master", None, "media library", "media folder").unwrap();
        let folder = items::create_item(&conn, "master", Some(root.id()), "locked", "media folder").unwrap();
        let file = items::create_item(&conn, "master", Some(folder.id()), "f", "unversioned file").unwrap();
        let editor = users::create_user(&conn, "editor", false).unwrap();

        set_access(&conn, root.id(), &editor, AccessRight::ItemWrite, true).unwrap();
        assert!(is_allowed(&conn, file.id(), &editor, AccessRight::ItemWrite).unwrap());

        set_access(&conn, folder.id(), &editor, AccessRight::ItemWrite, false).unwrap();
        assert!(!is_allowed(&conn, file.id(), &editor, AccessRight::ItemWrite).unwrap());
        assert!(is_allowed(&conn, root.id(), &editor, AccessRight::ItemWrite).unwrap());

        // rights are independent
        assert!(!is_allowed(&conn, file.id(), &editor, AccessRight::ItemRead).unwrap());
    }
}
