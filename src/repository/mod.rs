//! Content repository collaborator.
//!
//! The conversion pipeline never talks to the database directly. Everything
//! it needs from the content store (item lookup, tree and version
//! enumeration, field content, authorization and scoped edits) goes through
//! [`ContentRepository`]. [`SqliteRepository`] is the implementation backed
//! by the `mediaconv-db` store.

mod sqlite;

pub use sqlite::SqliteRepository;

use bytes::Bytes;
use mediaconv_common::{AccessRight, CleanupKind, ItemUri, Result};
use mediaconv_db::models::{Item, User};

/// Blocking access to the content store.
///
/// Implementations must be shareable with the conversion worker thread.
pub trait ContentRepository: Send + Sync {
    /// Resolve a reference to one item version. Version 0 resolves to the
    /// latest version; the returned item always carries a concrete version.
    fn get_item(&self, uri: &ItemUri) -> Result<Option<Item>>;

    /// Latest version of the item at `path` in `database`.
    fn get_item_by_path(&self, database: &str, path: &str) -> Result<Option<Item>>;

    /// References to the direct children of an item (latest versions).
    fn child_uris(&self, uri: &ItemUri) -> Result<Vec<ItemUri>>;

    /// References to every version of an item, ascending.
    fn version_uris(&self, uri: &ItemUri) -> Result<Vec<ItemUri>>;

    fn get_user(&self, name: &str) -> Result<Option<User>>;

    /// Authorization check. Security is always enforced; there is no
    /// ambient context that can disable it.
    fn is_allowed(&self, uri: &ItemUri, right: AccessRight, user: &User) -> Result<bool>;

    /// Binary content referenced by `field` on the item version, read
    /// directly from the store. `None` when the field is empty or the blob
    /// it names does not exist.
    fn blob_content(&self, uri: &ItemUri, field: &str) -> Result<Option<Bytes>>;

    /// Media content of the item version through the cache. File-based items
    /// are read from their mapped file path, others from their blob field.
    fn media_content(&self, uri: &ItemUri) -> Result<Option<Bytes>>;

    /// Open a scoped edit on one item version.
    fn edit(&self, uri: &ItemUri) -> Result<Box<dyn ItemEditor + '_>>;

    /// Record a prior storage location for deferred purge.
    fn enqueue_cleanup(&self, kind: CleanupKind, reference: &str, uri: &ItemUri) -> Result<()>;
}

/// Scoped edit of a single item version.
///
/// Writes become visible only after [`ItemEditor::commit`]. Dropping the
/// editor without committing discards them.
pub trait ItemEditor {
    fn set_field(&mut self, field: &str, value: &str) -> Result<()>;

    /// Store `content` as a new blob referenced by `field`. Returns the blob id.
    fn set_blob(&mut self, field: &str, content: &[u8]) -> Result<String>;

    fn commit(self: Box<Self>) -> Result<()>;
}
