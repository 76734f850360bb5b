//! Item database queries.
//!
//! Items form a tree per named database. Each item has one or more numbered
//! versions; version numbers start at 1 and `ItemUri::LATEST` (0) addresses
//! the highest one.

use chrono::Utc;
use mediaconv_common::{Error, ItemId, ItemUri, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{parse_opt_column, timestamp_column, Field, Item};

struct ItemRow {
    parent_id: Option<ItemId>,
    name: String,
    path: String,
    long_id: String,
    template: String,
    template_is_folder: bool,
    created_at: chrono::DateTime<Utc>,
}

impl ItemRow {
    fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            parent_id: parse_opt_column(row, 0)?,
            name: row.get(1)?,
            path: row.get(2)?,
            long_id: row.get(3)?,
            template: row.get(4)?,
            template_is_folder: row.get(5)?,
            created_at: timestamp_column(row, 6)?,
        })
    }
}

/// Create a new item with a single version (version 1).
///
/// Root items (no parent) get the path `/{name}`; children extend their
/// parent's path and long id.
pub fn create_item(
    conn: &Connection,
    database: &str,
    parent_id: Option<ItemId>,
    name: &str,
    template: &str,
) -> Result<Item> {
    if name.is_empty() || name.contains('/') {
        return Err(Error::invalid_input(format!("Invalid item name: '{}'", name)));
    }

    let template_exists: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM templates WHERE name = ?1)",
            [template],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    if !template_exists {
        return Err(Error::not_found(format!("template '{}'", template)));
    }

    let id = ItemId::new();
    let (path, long_id, sort_order) = match parent_id {
        Some(pid) => {
            let parent: Option<(String, String, String)> = conn
                .query_row(
                    "SELECT database, path, long_id FROM items WHERE id = ?1",
                    [pid.to_string()],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()
                .map_err(|e| Error::database(e.to_string()))?;
            let (parent_db, parent_path, parent_long_id) =
                parent.ok_or_else(|| Error::not_found(format!("parent item {}", pid)))?;
            if parent_db != database {
                return Err(Error::invalid_input(format!(
                    "Parent item {} belongs to database '{}', not '{}'",
                    pid, parent_db, database
                )));
            }
            let siblings: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM items WHERE parent_id = ?1",
                    [pid.to_string()],
                    |row| row.get(0),
                )
                .map_err(|e| Error::database(e.to_string()))?;
            (
                format!("{}/{}", parent_path, name),
                format!("{}/{}", parent_long_id, id),
                siblings,
            )
        }
        None => (format!("/{}", name), format!("/{}", id), 0),
    };

    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO items (id, database, parent_id, name, path, long_id, template, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            id.to_string(),
            database,
            parent_id.map(|p| p.to_string()),
            name,
            path,
            long_id,
            template,
            sort_order,
            &now,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO item_versions (item_id, version, created_at) VALUES (?1, 1, ?2)",
        rusqlite::params![id.to_string(), &now],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    get_item(conn, &ItemUri::new(database, id, 1))?
        .ok_or_else(|| Error::internal(format!("Item {} vanished after insert", id)))
}

/// Resolve a requested version to a concrete existing version number.
///
/// `ItemUri::LATEST` resolves to the highest version. Returns `None` when the
/// item or the requested version does not exist.
pub fn resolve_version(conn: &Connection, item_id: ItemId, version: u32) -> Result<Option<u32>> {
    let result = if version == ItemUri::LATEST {
        conn.query_row(
            "SELECT MAX(version) FROM item_versions WHERE item_id = ?1",
            [item_id.to_string()],
            |row| row.get::<_, Option<u32>>(0),
        )
    } else {
        conn.query_row(
            "SELECT version FROM item_versions WHERE item_id = ?1 AND version = ?2",
            rusqlite::params![item_id.to_string(), version],
            |row| row.get::<_, u32>(0).map(Some),
        )
        .optional()
        .map(Option::flatten)
    };
    result.map_err(|e| Error::database(e.to_string()))
}

/// Load one item version with all the fields its template declares.
pub fn get_item(conn: &Connection, uri: &ItemUri) -> Result<Option<Item>> {
    let Some(version) = resolve_version(conn, uri.item_id(), uri.version())? else {
        return Ok(None);
    };

    let row = conn
        .query_row(
            "SELECT i.parent_id, i.name, i.path, i.long_id, i.template, t.folder, i.created_at
             FROM items i JOIN templates t ON t.name = i.template
             WHERE i.id = ?1 AND i.database = ?2",
            rusqlite::params![uri.item_id().to_string(), uri.database()],
            ItemRow::from_row,
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let fields = load_fields(conn, uri.item_id(), &row.template, version)?;

    Ok(Some(Item {
        uri: uri.with_version(version),
        parent_id: row.parent_id,
        name: row.name,
        path: row.path,
        long_id: row.long_id,
        template: row.template,
        template_is_folder: row.template_is_folder,
        fields,
        created_at: row.created_at,
    }))
}

fn load_fields(conn: &Connection, item_id: ItemId, template: &str, version: u32) -> Result<Vec<Field>> {
    let mut stmt = conn
        .prepare(
            "SELECT tf.field_name, tf.shared, COALESCE(fv.value, '')
             FROM template_fields tf
             LEFT JOIN field_values fv
               ON fv.item_id = ?1
              AND fv.field_name = tf.field_name
              AND fv.version = CASE WHEN tf.shared THEN 0 ELSE ?2 END
             WHERE tf.template = ?3
             ORDER BY tf.field_name",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let fields = stmt
        .query_map(
            rusqlite::params![item_id.to_string(), version, template],
            |row| {
                Ok(Field {
                    name: row.get(0)?,
                    shared: row.get(1)?,
                    value: row.get(2)?,
                })
            },
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(fields)
}

/// Look up the latest version of an item by its path (case-insensitive).
pub fn get_item_by_path(conn: &Connection, database: &str, path: &str) -> Result<Option<Item>> {
    let normalized = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };

    let id: Option<ItemId> = conn
        .query_row(
            "SELECT id FROM items WHERE database = ?1 AND path = ?2 COLLATE NOCASE
             ORDER BY sort_order LIMIT 1",
            rusqlite::params![database, normalized],
            |row| crate::models::parse_column(row, 0),
        )
        .optional()
        .map_err(|e| Error::database(e.to_string()))?;

    match id {
        Some(id) => get_item(conn, &ItemUri::latest(database, id)),
        None => Ok(None),
    }
}

/// Direct children of an item, in sort order.
pub fn list_child_ids(conn: &Connection, database: &str, parent_id: ItemId) -> Result<Vec<ItemId>> {
    let mut stmt = conn
        .prepare(
            "SELECT id FROM items WHERE database = ?1 AND parent_id = ?2
             ORDER BY sort_order, name",
        )
        .map_err(|e| Error::database(e.to_string()))?;

    let ids = stmt
        .query_map(
            rusqlite::params![database, parent_id.to_string()],
            |row| crate::models::parse_column(row, 0),
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<ItemId>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(ids)
}

/// All version numbers of an item, ascending.
pub fn list_versions(conn: &Connection, item_id: ItemId) -> Result<Vec<u32>> {
    let mut stmt = conn
        .prepare("SELECT version FROM item_versions WHERE item_id = ?1 ORDER BY version")
        .map_err(|e| Error::database(e.to_string()))?;

    let versions = stmt
        .query_map([item_id.to_string()], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<u32>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;

    Ok(versions)
}

/// Add a new version to an item, copying the latest version's unshared field
/// values. Returns the new version number.
pub fn add_version(conn: &Connection, item_id: ItemId) -> Result<u32> {
    let latest = resolve_version(conn, item_id, ItemUri::LATEST)?
        .ok_or_else(|| Error::not_found(format!("item {}", item_id)))?;
    let next = latest + 1;

    conn.execute(
        "INSERT INTO item_versions (item_id, version, created_at) VALUES (?1, ?2, ?3)",
        rusqlite::params![item_id.to_string(), next, Utc::now().to_rfc3339()],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    conn.execute(
        "INSERT INTO field_values (item_id, version, field_name, value)
         SELECT item_id, ?2, field_name, value FROM field_values
         WHERE item_id = ?1 AND version = ?3",
        rusqlite::params![item_id.to_string(), next, latest],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(next)
}
