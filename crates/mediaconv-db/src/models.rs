//! Internal Rust models matching the database schema.
//!
//! This module provides strongly-typed Rust structures that map to database tables.
//! All models use types from mediaconv-common where appropriate. Row-backed
//! models implement `from_row` for constructing themselves from a
//! `rusqlite::Row`.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use mediaconv_common::{CleanupKind, ItemId, ItemUri, JobId, JobStatus, UserId};
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_failure<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

/// Parse a text column into any type with a `FromStr` impl from mediaconv-common.
pub(crate) fn parse_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = mediaconv_common::Error>,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn parse_opt_column<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr<Err = mediaconv_common::Error>,
{
    let s: Option<String> = row.get(idx)?;
    s.map(|v| v.parse().map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

/// Parse a timestamp column. Accepts RFC 3339 and SQLite's `datetime('now')` form.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("invalid timestamp '{}'", s).into(),
        )
    })
}

fn opt_timestamp_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let s: Option<String> = row.get(idx)?;
    match s {
        Some(_) => timestamp_column(row, idx).map(Some),
        None => Ok(None),
    }
}

/// A field declared by an item's template.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    pub name: String,
    /// Shared fields hold one value for all versions of an item.
    pub shared: bool,
}

/// A field of one item version together with its current value.
///
/// Unset fields have an empty value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub shared: bool,
    pub value: String,
}

impl Field {
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// One version of a content item, with the fields its template declares.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    /// Concrete reference; never addresses "latest".
    pub uri: ItemUri,
    pub parent_id: Option<ItemId>,
    pub name: String,
    /// Slash separated item path (`/media library/images/logo`).
    pub path: String,
    /// Slash separated ids of the item and all its ancestors, root first.
    pub long_id: String,
    pub template: String,
    /// Whether the template is an organizational folder template.
    pub template_is_folder: bool,
    pub fields: Vec<Field>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn id(&self) -> ItemId {
        self.uri.item_id()
    }

    pub fn version(&self) -> u32 {
        self.uri.version()
    }

    /// Look up a field by name; `None` when the template does not declare it.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Value of a field, or an empty string when absent or unset.
    pub fn field_value(&self, name: &str) -> &str {
        self.field(name).map(|f| f.value.as_str()).unwrap_or("")
    }

    /// Long id of the parent item (the item's ancestor path).
    pub fn parent_long_id(&self) -> &str {
        match self.long_id.rfind('/') {
            Some(idx) => &self.long_id[..idx],
            None => "",
        }
    }
}

/// User account model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub is_admin: bool,
}

impl User {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_column(row, 0)?,
            name: row.get(1)?,
            is_admin: row.get(2)?,
        })
    }
}

/// Persisted background job record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub category: String,
    pub status: JobStatus,
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_column(row, 0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            status: parse_column(row, 3)?,
            processed: row.get::<_, i64>(4)? as u64,
            skipped: row.get::<_, i64>(5)? as u64,
            failed: row.get::<_, i64>(6)? as u64,
            created_at: timestamp_column(row, 7)?,
            started_at: opt_timestamp_column(row, 8)?,
            completed_at: opt_timestamp_column(row, 9)?,
        })
    }
}

/// One human-readable status line of a job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobMessage {
    pub seq: u32,
    pub message: String,
}

/// A prior storage location waiting for deferred purge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanupEntry {
    pub id: i64,
    pub kind: CleanupKind,
    pub reference: String,
    pub item_uri: String,
    pub purged: bool,
}

impl CleanupEntry {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            kind: parse_column(row, 1)?,
            reference: row.get(2)?,
            item_uri: row.get(3)?,
            purged: row.get::<_, Option<String>>(4)?.is_some(),
        })
    }
}
