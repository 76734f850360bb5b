use bytes::Bytes;
use dashmap::DashMap;
use mediaconv_common::{paths, AccessRight, CleanupKind, Error, ItemId, ItemUri, Result};
use mediaconv_db::{
    edit::EditContext,
    models::{Item, User},
    pool::{get_conn, DbPool, PooledConnection},
    queries::{access, blobs, cleanup, fields, items, users},
};
use tracing::debug;

use super::{ContentRepository, ItemEditor};
use crate::config::MediaConfig;
use crate::conversion::eligibility;

/// Media payloads larger than this are never cached.
const MAX_CACHED_SIZE: usize = 1024 * 1024;

/// [`ContentRepository`] over the SQLite content store.
pub struct SqliteRepository {
    pool: DbPool,
    media: MediaConfig,
    chunk_size: usize,
    media_cache: DashMap<ItemUri, Bytes>,
}

impl SqliteRepository {
    pub fn new(pool: DbPool, media: MediaConfig, chunk_size: usize) -> Self {
        Self {
            pool,
            media,
            chunk_size: chunk_size.max(1),
            media_cache: DashMap::new(),
        }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub fn media_config(&self) -> &MediaConfig {
        &self.media
    }

    /// Number of cached media payloads.
    pub fn cached_media_count(&self) -> usize {
        self.media_cache.len()
    }

    fn require_item(&self, uri: &ItemUri) -> Result<Item> {
        self.get_item(uri)?
            .ok_or_else(|| Error::not_found(format!("item {}", uri)))
    }

    fn read_blob(&self, blob_id: &str) -> Result<Option<Bytes>> {
        let conn = get_conn(&self.pool)?;
        let mut data = Vec::new();
        let copied = blobs::copy_blob_to(&conn, blob_id, &mut data, self.chunk_size)?;
        Ok(copied.map(|_| Bytes::from(data)))
    }
}

fn invalidate_item(cache: &DashMap<ItemUri, Bytes>, item_id: ItemId) {
    cache.retain(|uri, _| uri.item_id() != item_id);
}

impl ContentRepository for SqliteRepository {
    fn get_item(&self, uri: &ItemUri) -> Result<Option<Item>> {
        let conn = get_conn(&self.pool)?;
        items::get_item(&conn, uri)
    }

    fn get_item_by_path(&self, database: &str, path: &str) -> Result<Option<Item>> {
        let conn = get_conn(&self.pool)?;
        items::get_item_by_path(&conn, database, path)
    }

    fn child_uris(&self, uri: &ItemUri) -> Result<Vec<ItemUri>> {
        let conn = get_conn(&self.pool)?;
        let ids = items::list_child_ids(&conn, uri.database(), uri.item_id())?;
        Ok(ids
            .into_iter()
            .map(|id| ItemUri::latest(uri.database(), id))
            .collect())
    }

    fn version_uris(&self, uri: &ItemUri) -> Result<Vec<ItemUri>> {
        let conn = get_conn(&self.pool)?;
        let versions = items::list_versions(&conn, uri.item_id())?;
        Ok(versions.into_iter().map(|v| uri.with_version(v)).collect())
    }

    fn get_user(&self, name: &str) -> Result<Option<User>> {
        let conn = get_conn(&self.pool)?;
        users::get_user_by_name(&conn, name)
    }

    fn is_allowed(&self, uri: &ItemUri, right: AccessRight, user: &User) -> Result<bool> {
        let conn = get_conn(&self.pool)?;
        access::is_allowed(&conn, uri.item_id(), user, right)
    }

    fn blob_content(&self, uri: &ItemUri, field: &str) -> Result<Option<Bytes>> {
        let item = self.require_item(uri)?;
        let blob_id = item.field_value(field);
        if blob_id.is_empty() {
            return Ok(None);
        }
        self.read_blob(blob_id)
    }

    fn media_content(&self, uri: &ItemUri) -> Result<Option<Bytes>> {
        let item = self.require_item(uri)?;

        if let Some(hit) = self.media_cache.get(&item.uri) {
            debug!("Media cache hit for {}", item.uri);
            return Ok(Some(hit.value().clone()));
        }

        let content = if eligibility::is_file_based(&item, &self.media.file_path_field) {
            let store_path = item.field_value(&self.media.file_path_field);
            let path = paths::map_path(&self.media.data_root, store_path);
            Some(Bytes::from(std::fs::read(&path)?))
        } else {
            let blob_id = item.field_value(&self.media.blob_field);
            if blob_id.is_empty() {
                None
            } else {
                self.read_blob(blob_id)?
            }
        };

        if let Some(ref data) = content {
            if data.len() <= MAX_CACHED_SIZE {
                self.media_cache.insert(item.uri.clone(), data.clone());
            }
        }

        Ok(content)
    }

    fn edit(&self, uri: &ItemUri) -> Result<Box<dyn ItemEditor + '_>> {
        let item = self.require_item(uri)?;
        let conn = get_conn(&self.pool)?;
        let edit = EditContext::begin(conn)?;
        Ok(Box::new(SqliteItemEditor {
            edit,
            uri: item.uri,
            cache: &self.media_cache,
            chunk_size: self.chunk_size,
        }))
    }

    fn enqueue_cleanup(&self, kind: CleanupKind, reference: &str, uri: &ItemUri) -> Result<()> {
        let conn = get_conn(&self.pool)?;
        cleanup::enqueue_cleanup(&conn, kind, reference, &uri.to_string())?;
        Ok(())
    }
}

struct SqliteItemEditor<'a> {
    edit: EditContext<PooledConnection>,
    uri: ItemUri,
    cache: &'a DashMap<ItemUri, Bytes>,
    chunk_size: usize,
}

impl ItemEditor for SqliteItemEditor<'_> {
    fn set_field(&mut self, field: &str, value: &str) -> Result<()> {
        fields::set_field_value(
            self.edit.conn(),
            self.uri.item_id(),
            self.uri.version(),
            field,
            value,
        )
    }

    fn set_blob(&mut self, field: &str, content: &[u8]) -> Result<String> {
        let mut reader = content;
        let blob_id = blobs::create_blob_from_reader(
            self.edit.conn(),
            &mut reader,
            content.len() as u64,
            self.chunk_size,
        )?;
        self.set_field(field, &blob_id)?;
        Ok(blob_id)
    }

    fn commit(self: Box<Self>) -> Result<()> {
        let SqliteItemEditor {
            edit, uri, cache, ..
        } = *self;
        edit.commit()?;
        invalidate_item(cache, uri.item_id());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaconv_db::pool::init_pool;

    struct Fixture {
        _dir: tempfile::TempDir,
        repo: SqliteRepository,
        item: ItemUri,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let pool = init_pool(&dir.path().join("content.db").to_string_lossy()).unwrap();
        let media = MediaConfig {
            data_root: dir.path().to_path_buf(),
            ..MediaConfig::default()
        };

        let item = {
            let conn = get_conn(&pool).unwrap();
            let root = items::create_item(&conn, "master", None, "media library", "media folder").unwrap();
            let item = items::create_item(&conn, "master", Some(root.id()), "logo", "unversioned image").unwrap();
            let blob = blobs::create_blob(&conn, b"png bytes").unwrap();
            fields::set_field_value(&conn, item.id(), 1, "blob", &blob).unwrap();
            item.uri
        };

        Fixture {
            _dir: dir,
            repo: SqliteRepository::new(pool, media, 4),
            item,
        }
    }

    #[test]
    fn test_blob_content_reads_store() {
        let f = fixture();
        let content = f.repo.blob_content(&f.item, "blob").unwrap().unwrap();
        assert_eq!(&content[..], b"png bytes");
        assert!(f.repo.blob_content(&f.item, "file path").unwrap().is_none());
    }

    #[test]
    fn test_media_content_is_cached_and_invalidated() {
        let f = fixture();
        assert_eq!(f.repo.cached_media_count(), 0);
        let first = f.repo.media_content(&f.item).unwrap().unwrap();
        assert_eq!(&first[..], b"png bytes");
        assert_eq!(f.repo.cached_media_count(), 1);

        let mut editor = f.repo.edit(&f.item).unwrap();
        editor.set_blob("blob", b"new bytes").unwrap();
        editor.commit().unwrap();

        assert_eq!(f.repo.cached_media_count(), 0);
        let second = f.repo.media_content(&f.item).unwrap().unwrap();
        assert_eq!(&second[..], b"new bytes");
    }

    #[test]
    fn test_media_content_reads_mapped_file() {
        let f = fixture();
        let store_path = "/App_Data/MediaFiles/logo.png";
        let disk = paths::map_path(&f.repo.media_config().data_root, store_path);
        std::fs::create_dir_all(disk.parent().unwrap()).unwrap();
        std::fs::write(&disk, b"from disk").unwrap();

        let mut editor = f.repo.edit(&f.item).unwrap();
        editor.set_field("file path", store_path).unwrap();
        editor.commit().unwrap();

        let content = f.repo.media_content(&f.item).unwrap().unwrap();
        assert_eq!(&content[..], b"from disk");
    }

    #[test]
    fn test_dropped_editor_discards_changes() {
        let f = fixture();
        {
            let mut editor = f.repo.edit(&f.item).unwrap();
            editor.set_field("file path", "/somewhere.png").unwrap();
        }
        let item = f.repo.get_item(&f.item).unwrap().unwrap();
        assert_eq!(item.field_value("file path"), "");
    }

    #[test]
    fn test_child_and_version_uris() {
        let f = fixture();
        let item = f.repo.get_item(&f.item).unwrap().unwrap();
        let parent = ItemUri::latest("master", item.parent_id.unwrap());

        let children = f.repo.child_uris(&parent).unwrap();
        assert_eq!(children, vec![ItemUri::latest("master", item.id())]);

        let versions = f.repo.version_uris(&f.item).unwrap();
        assert_eq!(versions, vec![f.item.with_version(1)]);
    }

    #[test]
    fn test_edit_unknown_item_is_not_found() {
        let f = fixture();
        let missing = ItemUri::latest("master", ItemId::new());
        assert!(matches!(f.repo.edit(&missing), Err(Error::NotFound(_))));
    }
}
