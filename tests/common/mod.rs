//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates a tempdir-backed content store with
//! a media library root, an administrator and a restricted editor, and a
//! [`SqliteRepository`] whose data root is the tempdir.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use mediaconv::config::{Config, MediaConfig};
use mediaconv::conversion::{
    ConversionOptions, ConversionProcessor, ConversionReference, ConversionSettings, RunContext,
};
use mediaconv::repository::{ContentRepository, SqliteRepository};
use mediaconv_common::{paths, ConversionTarget, ItemUri};
use mediaconv_db::models::{Item, User};
use mediaconv_db::pool::{get_conn, init_pool, DbPool, PooledConnection};
use mediaconv_db::queries::{blobs, fields, items, users};
use tempfile::TempDir;

pub const DATABASE: &str = "master";

/// Template that is not a folder and declares no media fields.
pub const PLAIN_TEMPLATE: &str = "plain item";

/// Test harness wrapping a file-backed content store in a temporary
/// directory.
pub struct TestHarness {
    pub dir: TempDir,
    pub pool: DbPool,
    pub repo: Arc<SqliteRepository>,
    pub settings: ConversionSettings,
    pub admin: User,
    pub editor: User,
    pub media_root: Item,
}

impl TestHarness {
    /// Create a new harness with default settings.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Create a new harness, letting the caller adjust the configuration.
    /// The data root always points at the harness tempdir.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let mut config = Config::default();
        config.database.path = dir.path().join("content.db");
        config.media.data_root = dir.path().to_path_buf();
        adjust(&mut config);
        config.media.data_root = dir.path().to_path_buf();

        let pool = init_pool(&config.database.path.to_string_lossy()).expect("failed to create pool");
        let repo = Arc::new(SqliteRepository::new(
            pool.clone(),
            config.media.clone(),
            config.conversion.chunk_size,
        ));

        let (admin, editor, media_root) = {
            let conn = get_conn(&pool).expect("conn");
            conn.execute(
                "INSERT INTO templates (name, folder) VALUES (?1, 0)",
                [PLAIN_TEMPLATE],
            )
            .expect("plain template");
            let admin = users::create_user(&conn, "admin", true).expect("admin");
            let editor = users::create_user(&conn, "editor", false).expect("editor");
            let root =
                items::create_item(&conn, DATABASE, None, "media library", "media folder").expect("root");
            (admin, editor, root)
        };

        Self {
            settings: ConversionSettings::from(&config),
            dir,
            pool,
            repo,
            admin,
            editor,
            media_root,
        }
    }

    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.pool).expect("conn")
    }

    pub fn media(&self) -> &MediaConfig {
        self.repo.media_config()
    }

    /// Create a media folder below `parent`.
    pub fn folder(&self, parent: &Item, name: &str) -> Item {
        items::create_item(&self.conn(), DATABASE, Some(parent.id()), name, "media folder")
            .expect("folder")
    }

    /// Create an item without any media fields below `parent`.
    pub fn plain_item(&self, parent: &Item, name: &str) -> Item {
        items::create_item(&self.conn(), DATABASE, Some(parent.id()), name, PLAIN_TEMPLATE)
            .expect("plain item")
    }

    /// Create a media item whose version 1 content is stored as a blob.
    pub fn blob_item(&self, parent: &Item, name: &str, template: &str, content: &[u8]) -> Item {
        let conn = self.conn();
        let item = items::create_item(&conn, DATABASE, Some(parent.id()), name, template).expect("item");
        fields::set_field_value(&conn, item.id(), 1, "extension", "png").expect("extension");
        if !content.is_empty() {
            let blob = blobs::create_blob(&conn, content).expect("blob");
            fields::set_field_value(&conn, item.id(), 1, "blob", &blob).expect("blob field");
        }
        drop(conn);
        self.item(&item.uri)
    }

    /// Create a media item whose content lives in a file under the data
    /// root. Returns the item and the store path it points at.
    pub fn file_item(&self, parent: &Item, name: &str, template: &str, content: &[u8]) -> (Item, String) {
        let conn = self.conn();
        let item = items::create_item(&conn, DATABASE, Some(parent.id()), name, template).expect("item");
        fields::set_field_value(&conn, item.id(), 1, "extension", "png").expect("extension");

        let store_path = format!("/App_Data/Legacy/{}.png", item.id().simple());
        let disk = paths::map_path(self.dir.path(), &store_path);
        std::fs::create_dir_all(disk.parent().expect("parent")).expect("legacy dir");
        std::fs::write(&disk, content).expect("legacy file");
        fields::set_field_value(&conn, item.id(), 1, "file path", &store_path).expect("file path");
        drop(conn);
        (self.item(&item.uri), store_path)
    }

    /// Add a version to a versioned media item with its own blob content.
    pub fn add_blob_version(&self, item: &Item, content: &[u8]) -> u32 {
        let conn = self.conn();
        let version = items::add_version(&conn, item.id()).expect("version");
        let blob = blobs::create_blob(&conn, content).expect("blob");
        fields::set_field_value(&conn, item.id(), version, "blob", &blob).expect("blob field");
        version
    }

    /// Reload an item from the store.
    pub fn item(&self, uri: &ItemUri) -> Item {
        self.repo.get_item(uri).expect("get item").expect("item exists")
    }

    /// Absolute path of an item's file-path field value.
    pub fn disk_path(&self, item: &Item) -> PathBuf {
        paths::map_path(self.dir.path(), item.field_value("file path"))
    }

    /// Number of regular files below the data root's media folder.
    pub fn media_file_count(&self) -> usize {
        fn count(dir: &std::path::Path) -> usize {
            let Ok(entries) = std::fs::read_dir(dir) else {
                return 0;
            };
            entries
                .flatten()
                .map(|e| {
                    let path = e.path();
                    if path.is_dir() {
                        count(&path)
                    } else {
                        1
                    }
                })
                .sum()
        }
        count(&paths::map_path(self.dir.path(), &self.settings.file_folder))
    }

    pub fn context(&self, target: ConversionTarget, references: Vec<ConversionReference>, user: &User) -> RunContext {
        RunContext::new(
            references,
            ConversionOptions::new(target),
            user.clone(),
            self.settings.clone(),
            None,
        )
    }

    /// Run a conversion synchronously with the real item converter.
    pub fn run(&self, target: ConversionTarget, references: Vec<ConversionReference>, user: &User) -> RunContext {
        let mut ctx = self.context(target, references, user);
        ConversionProcessor::new(self.repo.as_ref()).run(&mut ctx);
        ctx
    }
}

pub fn reference(item: &Item, recursive: bool) -> ConversionReference {
    ConversionReference::new(item.uri.clone(), recursive)
}
