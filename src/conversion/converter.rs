//! Storage transfer for a single item version.
//!
//! To file: the blob is read straight from the store, written below the
//! media file folder (reusing an identical existing file or picking a free
//! variant name), and the version's file path field is pointed at it. To
//! database: the media content is read through the cache, checked against
//! the size limit and written into a new blob. Either way both fields are
//! updated in one scoped edit, so a version never ends up with two
//! representations, and the prior location is handed back as a cleanup
//! reference instead of being deleted.

use bytes::Bytes;
use mediaconv_common::{paths, CleanupKind, ConversionTarget};
use mediaconv_db::models::Item;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

use super::context::{ConversionSettings, RunContext};
use super::eligibility;
use super::outcome::{Abort, ConversionOutcome, ItemResult};
use crate::repository::ContentRepository;

/// Converts one item version. The processor dispatches through this trait.
pub trait Converter {
    fn convert(&self, item: &Item, ctx: &RunContext) -> ItemResult;
}

pub struct ItemConverter<'r> {
    repo: &'r dyn ContentRepository,
}

impl<'r> ItemConverter<'r> {
    pub fn new(repo: &'r dyn ContentRepository) -> Self {
        Self { repo }
    }

    fn ensure_access(&self, item: &Item, ctx: &RunContext) -> Result<(), Abort> {
        match eligibility::can_convert(self.repo, item, &ctx.user) {
            Ok(true) => Ok(()),
            Ok(false) => Err(Abort::failed(eligibility::access_denied_message(item, &ctx.user))),
            Err(e) => Err(Abort::failed(format!(
                "Failed to check access for item {} - {}: {}",
                item.name, item.uri, e
            ))),
        }
    }

    fn to_file(&self, item: &Item, ctx: &RunContext) -> Result<ItemResult, Abort> {
        let settings = &ctx.settings;

        let Some(blob_field) = item.field(&settings.blob_field) else {
            return Ok(ItemResult::completed(item.uri.clone(), skipped_without_blob_field(item)));
        };

        self.ensure_access(item, ctx)?;

        let content = match self.repo.blob_content(&item.uri, &settings.blob_field) {
            Ok(Some(content)) if !content.is_empty() => content,
            Ok(_) => {
                return Err(Abort::failed(format!(
                    "Item {} - {} does not have any media content.",
                    item.name, item.uri
                )))
            }
            Err(e) => return Err(transfer_failure(item, &e)),
        };

        let destination = destination_path(item, settings);
        let media_folder = paths::map_path(&settings.data_root, &settings.file_folder);
        if !paths::is_within(&settings.data_root, &destination)
            || !paths::is_within(&media_folder, &destination)
        {
            return Err(outside_media_folder(item, &destination));
        }

        let (path, reused) =
            place_file(&destination, settings, &content).map_err(|e| transfer_failure(item, &e))?;

        let Some(store_path) = paths::unmap_path(&settings.data_root, &path) else {
            if !reused {
                remove_orphan(&path);
            }
            return Err(outside_media_folder(item, &path));
        };

        let commit = self.repo.edit(&item.uri).and_then(|mut editor| {
            editor.set_field(&settings.file_path_field, &store_path)?;
            editor.set_field(&settings.blob_field, "")?;
            editor.commit()
        });
        if let Err(e) = commit {
            if !reused {
                remove_orphan(&path);
            }
            return Err(transfer_failure(item, &e));
        }

        let outcome = ConversionOutcome::processed(format!(
            "Media storage for item: {} - {} has been changed to file system: {} ({})",
            item.name,
            item.uri,
            store_path,
            paths::friendly_file_size(content.len() as u64)
        ));
        Ok(ItemResult::completed(item.uri.clone(), outcome)
            .with_cleanup(CleanupKind::Blob, blob_field.value.clone()))
    }

    fn to_database(&self, item: &Item, ctx: &RunContext) -> Result<ItemResult, Abort> {
        let settings = &ctx.settings;

        if item.field(&settings.blob_field).is_none() {
            return Ok(ItemResult::completed(item.uri.clone(), skipped_without_blob_field(item)));
        }

        self.ensure_access(item, ctx)?;

        let prior_path = item.field_value(&settings.file_path_field).to_string();

        let content: Bytes = match self.repo.media_content(&item.uri) {
            Ok(Some(content)) => content,
            Ok(None) => {
                return Err(Abort::failed(format!(
                    "Item {} - {} does not have any media content.",
                    item.name, item.uri
                )))
            }
            Err(e) => return Err(Abort::failed(e.to_string())),
        };

        if content.len() as u64 > settings.max_size_in_database {
            return Err(Abort::skipped(format!(
                "Media content size ({}) exceeds allowed limit configured in MaxSizeInDatabase setting. Adjust the setting if you want to store large media content in the database. Item: {} - {}",
                paths::friendly_file_size(content.len() as u64),
                item.name,
                item.uri
            )));
        }

        let blob_id = self
            .repo
            .edit(&item.uri)
            .and_then(|mut editor| {
                let blob_id = editor.set_blob(&settings.blob_field, &content)?;
                editor.set_field(&settings.file_path_field, "")?;
                editor.commit()?;
                Ok(blob_id)
            })
            .map_err(|e| Abort::failed(e.to_string()))?;

        let outcome = ConversionOutcome::processed(format!(
            "Media storage for item: {} - {} has been changed to database. Blob id: {}",
            item.name, item.uri, blob_id
        ));
        let result = ItemResult::completed(item.uri.clone(), outcome);
        if prior_path.is_empty() {
            return Ok(result);
        }
        Ok(result.with_cleanup(CleanupKind::File, prior_path))
    }
}

impl Converter for ItemConverter<'_> {
    fn convert(&self, item: &Item, ctx: &RunContext) -> ItemResult {
        let result = match ctx.options.target {
            ConversionTarget::File => self.to_file(item, ctx),
            ConversionTarget::Database => self.to_database(item, ctx),
        };

        match result {
            Ok(result) => result,
            Err(Abort(outcome)) => ItemResult::aborted(item.uri.clone(), outcome),
        }
    }
}

fn skipped_without_blob_field(item: &Item) -> ConversionOutcome {
    ConversionOutcome::skipped(format!(
        "Skipped item [{}:{}] because the item didn't contain a blob field",
        item.name,
        item.id()
    ))
}

fn outside_media_folder(item: &Item, path: &Path) -> Abort {
    Abort::failed(format!(
        "Failed to convert blob into file for item: {} - {}. {:?} is outside the media file folder",
        item.id(),
        item.uri,
        path
    ))
}

fn remove_orphan(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!("Failed to remove orphaned media file {:?}: {}", path, e);
    }
}

fn transfer_failure(item: &Item, error: &dyn std::fmt::Display) -> Abort {
    Abort::failed(format!(
        "Failed to convert blob into file for item: {} - {}. Error: {}",
        item.id(),
        item.uri,
        error
    ))
}

/// Absolute destination path for an item's media file.
///
/// `{data_root}{file_folder}/{h0}/{h1}/{h2}/{item id}/{parent long id}/{name}.{extension}`
///
/// Name and extension are sanitized together, so neither can add a path
/// segment.
pub fn destination_path(item: &Item, settings: &ConversionSettings) -> PathBuf {
    let file_name = paths::sanitize_file_name(&paths::make_path(
        &item.name,
        item.field_value(&settings.extension_field),
        '.',
    ));
    let file_name = paths::make_path(item.parent_long_id(), &file_name, '/');
    let folder = paths::media_storage_folder(&item.id().simple(), &file_name);
    let store_path = paths::make_path(&settings.file_folder, &folder, '/');
    paths::map_path(&settings.data_root, &store_path)
}

/// Choose the file to hold `content` and write it if needed.
///
/// Returns the chosen path and whether an identical existing file was reused.
fn place_file(destination: &Path, settings: &ConversionSettings, content: &[u8]) -> io::Result<(PathBuf, bool)> {
    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let (path, reused) = find_destination(destination, content, settings.chunk_size)?;
    if !reused {
        write_file(&path, content, settings.chunk_size)?;
    }
    Ok((path, reused))
}

/// First of `path`, `path_1`, `path_2`, ... that is either free or already
/// holds exactly `content`.
pub fn find_destination(path: &Path, content: &[u8], chunk_size: usize) -> io::Result<(PathBuf, bool)> {
    let mut candidate = path.to_path_buf();
    let mut variant = 0;
    while candidate.exists() {
        if file_matches(&candidate, content, chunk_size)? {
            return Ok((candidate, true));
        }
        variant += 1;
        candidate = paths::filename_variant(path, variant);
    }
    Ok((candidate, false))
}

/// Byte-for-byte comparison of a file with `content`: length first, then
/// chunk by chunk.
pub fn file_matches(path: &Path, content: &[u8], chunk_size: usize) -> io::Result<bool> {
    if std::fs::metadata(path)?.len() != content.len() as u64 {
        return Ok(false);
    }

    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; chunk_size.max(1)];
    for expected in content.chunks(chunk_size.max(1)) {
        let actual = &mut buffer[..expected.len()];
        file.read_exact(actual)?;
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Write `content` to a new file in `chunk_size` pieces.
pub fn write_file(path: &Path, content: &[u8], chunk_size: usize) -> io::Result<()> {
    let mut file = File::create(path)?;
    for chunk in content.chunks(chunk_size.max(1)) {
        file.write_all(chunk)?;
    }
    file.flush()?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mediaconv_common::{ItemId, ItemUri};
    use mediaconv_db::models::Field;

    fn item(name: &str, extension: &str) -> Item {
        let parent = ItemId::new();
        let id = ItemId::new();
        Item {
            uri: ItemUri::new("master", id, 1),
            parent_id: Some(parent),
            name: name.to_string(),
            path: format!("/media library/{}", name),
            long_id: format!("/{}/{}", parent, id),
            template: "unversioned image".to_string(),
            template_is_folder: false,
            fields: vec![Field {
                name: "extension".to_string(),
                shared: true,
                value: extension.to_string(),
            }],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_destination_path_layout() {
        let settings = ConversionSettings {
            data_root: PathBuf::from("/srv"),
            ..ConversionSettings::default()
        };
        let item = item("logo", "png");
        let path = destination_path(&item, &settings);

        let expected_tail = format!("{}{}/logo.png", item.id().simple(), item.parent_long_id());
        let text = path.to_string_lossy().to_string();
        assert!(text.starts_with("/srv/App_Data/MediaFiles/"));
        assert!(text.ends_with(&expected_tail), "{} should end with {}", text, expected_tail);
        assert_eq!(path, destination_path(&item, &settings));
    }

    #[test]
    fn test_destination_without_extension() {
        let settings = ConversionSettings::default();
        let path = destination_path(&item("README", ""), &settings);
        assert_eq!(path.file_name().unwrap(), "README");
    }

    #[test]
    fn test_destination_extension_cannot_add_segments() {
        let settings = ConversionSettings {
            data_root: PathBuf::from("/srv"),
            ..ConversionSettings::default()
        };
        let item = item("logo", "png/../../../../escaped");
        let path = destination_path(&item, &settings);

        assert_eq!(path.file_name().unwrap(), "logo.png_.._.._.._.._escaped");
        assert!(paths::is_within(Path::new("/srv/App_Data/MediaFiles"), &path));
    }

    #[test]
    fn test_destination_sanitizes_backslash_extension() {
        let settings = ConversionSettings::default();
        let path = destination_path(&item("logo", "..\\..\\x"), &settings);
        assert_eq!(path.file_name().unwrap(), "logo._.._x");
    }

    #[test]
    fn test_file_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, b"abcdefghij").unwrap();

        assert!(file_matches(&path, b"abcdefghij", 3).unwrap());
        assert!(!file_matches(&path, b"abcdefghiX", 3).unwrap());
        assert!(!file_matches(&path, b"abc", 3).unwrap());
    }

    #[test]
    fn test_find_destination_reuses_identical_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"same").unwrap();

        let (chosen, reused) = find_destination(&path, b"same", 2).unwrap();
        assert_eq!(chosen, path);
        assert!(reused);
    }

    #[test]
    fn test_find_destination_picks_free_variant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logo.png");
        std::fs::write(&path, b"old").unwrap();
        std::fs::write(dir.path().join("logo_1.png"), b"older").unwrap();

        let (chosen, reused) = find_destination(&path, b"new", 2).unwrap();
        assert_eq!(chosen, dir.path().join("logo_2.png"));
        assert!(!reused);
    }

    #[test]
    fn test_write_file_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.bin");
        let content: Vec<u8> = (0..1000u32).map(|i| i as u8).collect();

        write_file(&path, &content, 7).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), content);
    }
}
