//! Typed ID wrappers and item references.
//!
//! This module provides newtype wrappers around UUIDs to prevent mixing different
//! types of identifiers (e.g., using a UserId where an ItemId is expected), and
//! [`ItemUri`], the value-typed reference to one version of one item in one
//! named store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Unique identifier for a content item (shared by all of its versions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Generate a new random item ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Hyphen-less lowercase hex form, used for storage folder names.
    pub fn simple(&self) -> String {
        self.0.simple().to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ItemId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<ItemId> for Uuid {
    fn from(id: ItemId) -> Self {
        id.0
    }
}

impl FromStr for ItemId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("Invalid item id '{}': {}", s, e)))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a new random user ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("Invalid user id '{}': {}", s, e)))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a background job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a new random job ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for JobId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::invalid_input(format!("Invalid job id '{}': {}", s, e)))
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const URI_SCHEME: &str = "item://";

/// Reference to one version of one item within one named store.
///
/// Versions start at 1. Version 0 addresses the latest version and is
/// resolved by the repository on lookup; items returned from the repository
/// always carry a concrete version.
///
/// The string form is `item://<database>/<item-id>[?ver=<n>]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemUri {
    database: String,
    item_id: ItemId,
    version: u32,
}

impl ItemUri {
    /// Version number that addresses the latest version of an item.
    pub const LATEST: u32 = 0;

    pub fn new(database: impl Into<String>, item_id: ItemId, version: u32) -> Self {
        Self {
            database: database.into(),
            item_id,
            version,
        }
    }

    /// Reference to the latest version of an item.
    pub fn latest(database: impl Into<String>, item_id: ItemId) -> Self {
        Self::new(database, item_id, Self::LATEST)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_latest(&self) -> bool {
        self.version == Self::LATEST
    }

    /// The same item in the same store at another version.
    #[must_use]
    pub fn with_version(&self, version: u32) -> Self {
        Self::new(self.database.clone(), self.item_id, version)
    }
}

impl fmt::Display for ItemUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", URI_SCHEME, self.database, self.item_id)?;
        if !self.is_latest() {
            write!(f, "?ver={}", self.version)?;
        }
        Ok(())
    }
}

impl FromStr for ItemUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(URI_SCHEME)
            .ok_or_else(|| Error::invalid_input(format!("Item uri must start with {}: {}", URI_SCHEME, s)))?;

        let (path, query) = match rest.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (rest, None),
        };

        let (database, id) = path
            .split_once('/')
            .ok_or_else(|| Error::invalid_input(format!("Item uri is missing an item id: {}", s)))?;
        if database.is_empty() {
            return Err(Error::invalid_input(format!("Item uri has an empty database: {}", s)));
        }
        let item_id: ItemId = id.parse()?;

        let mut version = Self::LATEST;
        if let Some(query) = query {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                match pair.split_once('=') {
                    Some(("ver", value)) => {
                        version = value.parse().map_err(|_| {
                            Error::invalid_input(format!("Invalid version '{}' in item uri: {}", value, s))
                        })?;
                    }
                    _ => {
                        return Err(Error::invalid_input(format!(
                            "Unsupported item uri parameter '{}': {}",
                            pair, s
                        )))
                    }
                }
            }
        }

        Ok(Self::new(database, item_id, version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_unique() {
        assert_ne!(ItemId::new(), ItemId::new());
    }

    #[test]
    fn test_item_id_simple_has_no_hyphens() {
        let id = ItemId::new();
        let simple = id.simple();
        assert_eq!(simple.len(), 32);
        assert!(!simple.contains('-'));
    }

    #[test]
    fn test_item_id_parse_roundtrip() {
        let id = ItemId::new();
        let parsed: ItemId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!("not-a-uuid".parse::<ItemId>().is_err());
    }

    #[test]
    fn test_item_uri_display_latest() {
        let id = ItemId::new();
        let uri = ItemUri::latest("master", id);
        assert_eq!(uri.to_string(), format!("item://master/{}", id));
        assert!(uri.is_latest());
    }

    #[test]
    fn test_item_uri_display_with_version() {
        let id = ItemId::new();
        let uri = ItemUri::new("web", id, 3);
        assert_eq!(uri.to_string(), format!("item://web/{}?ver=3", id));
    }

    #[test]
    fn test_item_uri_parse() {
        let id = ItemId::new();
        let uri: ItemUri = format!("item://master/{}?ver=2", id).parse().unwrap();
        assert_eq!(uri.database(), "master");
        assert_eq!(uri.item_id(), id);
        assert_eq!(uri.version(), 2);

        let uri: ItemUri = format!("item://master/{}", id).parse().unwrap();
        assert_eq!(uri.version(), ItemUri::LATEST);
    }

    #[test]
    fn test_item_uri_parse_rejects_malformed() {
        let id = ItemId::new();
        assert!("master/abc".parse::<ItemUri>().is_err());
        assert!(format!("item:///{}", id).parse::<ItemUri>().is_err());
        assert!("item://master".parse::<ItemUri>().is_err());
        assert!(format!("item://master/{}?ver=x", id).parse::<ItemUri>().is_err());
        assert!(format!("item://master/{}?lang=en", id).parse::<ItemUri>().is_err());
    }

    #[test]
    fn test_item_uri_equality_is_by_value() {
        let id = ItemId::new();
        let a = ItemUri::new("master", id, 1);
        let b: ItemUri = a.to_string().parse().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, a.with_version(2));
    }
}
