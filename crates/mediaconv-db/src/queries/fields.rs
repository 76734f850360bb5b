//! Field definition and field value queries.
//!
//! Field names are matched case-insensitively. Values of shared fields live
//! at version 0 and are visible from every version of the item.

use mediaconv_common::{Error, ItemId, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::FieldDefinition;

/// The definition of `field_name` on the template of `item_id`, if declared.
pub fn get_field_definition(
    conn: &Connection,
    item_id: ItemId,
    field_name: &str,
) -> Result<Option<FieldDefinition>> {
    conn.query_row(
        "SELECT tf.field_name, tf.shared
         FROM items i JOIN template_fields tf ON tf.template = i.template
         WHERE i.id = ?1 AND tf.field_name = ?2 COLLATE NOCASE",
        rusqlite::params![item_id.to_string(), field_name],
        |row| {
            Ok(FieldDefinition {
                name: row.get(0)?,
                shared: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(|e| Error::database(e.to_string()))
}

/// Set the value of a field on one item version.
///
/// Shared fields are written once for all versions. Fails with `NotFound`
/// when the template does not declare the field or the version is unknown.
pub fn set_field_value(
    conn: &Connection,
    item_id: ItemId,
    version: u32,
    field_name: &str,
    value: &str,
) -> Result<()> {
    let definition = get_field_definition(conn, item_id, field_name)?.ok_or_else(|| {
        Error::not_found(format!("field '{}' on item {}", field_name, item_id))
    })?;

    let storage_version = if definition.shared {
        0
    } else {
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM item_versions WHERE item_id = ?1 AND version = ?2)",
                rusqlite::params![item_id.to_string(), version],
                |row| row.get(0),
            )
            .map_err(|e| Error::database(e.to_string()))?;
        if !exists {
            return Err(Error::not_found(format!(
                "version {} of item {}",
                version, item_id
            )));
        }
        version
    };

    conn.execute(
        "INSERT INTO field_values (item_id, version, field_name, value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(item_id, version, field_name) DO UPDATE SET value = excluded.value",
        rusqlite::params![item_id.to_string(), storage_version, definition.name, value],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(())
}

/// Number of stored field values of `field_name` equal to `value`, across
/// all items and versions.
pub fn count_value_references(conn: &Connection, field_name: &str, value: &str) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM field_values WHERE field_name = ?1 COLLATE NOCASE AND value = ?2",
            rusqlite::params![field_name, value],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count as u64)
}
