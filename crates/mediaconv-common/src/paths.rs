//! Path utilities for media items and file-based media storage.
//!
//! Two kinds of paths appear in mediaconv:
//!
//! - **Item paths** inside the content tree (`/media library/images/logo`).
//! - **Store paths**: forward-slash separated, store-relative file locations
//!   (`/App_Data/MediaFiles/a/b/c/...`) kept in an item's file-path field.
//!   [`map_path`] and [`unmap_path`] convert between store paths and absolute
//!   filesystem paths under a data root.

use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};

/// Root of the media library in the content tree.
pub const MEDIA_LIBRARY_PATH: &str = "/media library";

/// Characters that may not appear in a stored file name.
const INVALID_FILE_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Check if an item path lies inside the media library.
///
/// Item paths are compared case-insensitively.
///
/// # Examples
///
/// ```
/// use mediaconv_common::paths::is_media_library_path;
///
/// assert!(is_media_library_path("/media library"));
/// assert!(is_media_library_path("/Media Library/Images/logo"));
/// assert!(!is_media_library_path("/content/home"));
/// assert!(!is_media_library_path("/media library backup/logo"));
/// ```
pub fn is_media_library_path(item_path: &str) -> bool {
    let path = item_path.to_lowercase();
    path == MEDIA_LIBRARY_PATH || path.starts_with(&format!("{}/", MEDIA_LIBRARY_PATH))
}

/// Join two path parts with exactly one separator between them.
///
/// # Examples
///
/// ```
/// use mediaconv_common::paths::make_path;
///
/// assert_eq!(make_path("/App_Data/", "/a/b", '/'), "/App_Data/a/b");
/// assert_eq!(make_path("logo", "png", '.'), "logo.png");
/// assert_eq!(make_path("", "b", '/'), "b");
/// ```
pub fn make_path(part1: &str, part2: &str, separator: char) -> String {
    if part1.is_empty() {
        return part2.to_string();
    }
    if part2.is_empty() {
        return part1.to_string();
    }
    format!(
        "{}{}{}",
        part1.trim_end_matches(separator),
        separator,
        part2.trim_start_matches(separator)
    )
}

/// Map a store path onto the filesystem below `data_root`.
///
/// # Examples
///
/// ```
/// use std::path::{Path, PathBuf};
/// use mediaconv_common::paths::map_path;
///
/// let mapped = map_path(Path::new("/srv/site"), "/App_Data/MediaFiles/logo.png");
/// assert_eq!(mapped, PathBuf::from("/srv/site/App_Data/MediaFiles/logo.png"));
/// ```
pub fn map_path(data_root: &Path, store_path: &str) -> PathBuf {
    store_path
        .split('/')
        .filter(|segment| !segment.is_empty())
        .fold(data_root.to_path_buf(), |path, segment| path.join(segment))
}

/// Convert an absolute filesystem path below `data_root` back into a store path.
///
/// Returns `None` when `path` is not inside `data_root`.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediaconv_common::paths::unmap_path;
///
/// let store = unmap_path(Path::new("/srv/site"), Path::new("/srv/site/App_Data/logo.png"));
/// assert_eq!(store.as_deref(), Some("/App_Data/logo.png"));
/// assert!(unmap_path(Path::new("/srv/site"), Path::new("/tmp/logo.png")).is_none());
/// ```
pub fn unmap_path(data_root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(data_root).ok()?;
    let mut store_path = String::new();
    for component in relative.components() {
        match component {
            Component::Normal(segment) => {
                store_path.push('/');
                store_path.push_str(&segment.to_string_lossy());
            }
            _ => return None,
        }
    }
    if store_path.is_empty() {
        store_path.push('/');
    }
    Some(store_path)
}

/// Check that `path` lies below `root` without stepping out through `..`.
///
/// Purely lexical; neither path has to exist.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use mediaconv_common::paths::is_within;
///
/// assert!(is_within(Path::new("/srv/media"), Path::new("/srv/media/a/logo.png")));
/// assert!(!is_within(Path::new("/srv/media"), Path::new("/srv/media/a/../../etc")));
/// assert!(!is_within(Path::new("/srv/media"), Path::new("/srv/media")));
/// ```
pub fn is_within(root: &Path, path: &Path) -> bool {
    match path.strip_prefix(root) {
        Ok(relative) => {
            relative.components().next().is_some()
                && relative
                    .components()
                    .all(|component| matches!(component, Component::Normal(_)))
        }
        Err(_) => false,
    }
}

/// Sharded storage folder for an item's media file.
///
/// The first three hex characters of the SHA-256 digest of the item id become
/// three nested folders, followed by the item id itself and `file_name`:
/// `{h0}/{h1}/{h2}/{item_id}/{file_name}`. Spreading items across shards keeps
/// directory sizes bounded on large libraries.
pub fn media_storage_folder(item_id_simple: &str, file_name: &str) -> String {
    let digest = Sha256::digest(item_id_simple.as_bytes());
    let shard = hex::encode(&digest[..2]);
    let mut chars = shard.chars();
    let (h0, h1, h2) = match (chars.next(), chars.next(), chars.next()) {
        (Some(a), Some(b), Some(c)) => (a, b, c),
        _ => ('0', '0', '0'),
    };
    let folder = format!("{}/{}/{}/{}", h0, h1, h2, item_id_simple);
    make_path(&folder, file_name, '/')
}

/// Replace characters that are invalid in file names with `_`.
///
/// # Examples
///
/// ```
/// use mediaconv_common::paths::sanitize_file_name;
///
/// assert_eq!(sanitize_file_name("logo: final?"), "logo_ final_");
/// assert_eq!(sanitize_file_name("report."), "report");
/// ```
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_control() || INVALID_FILE_NAME_CHARS.contains(&c) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = cleaned.trim_end_matches(['.', ' ']);
    if trimmed.is_empty() {
        "_".to_string()
    } else {
        trimmed.to_string()
    }
}

/// The `n`th alternative name for `path`: `logo.png` becomes `logo_n.png`.
///
/// # Examples
///
/// ```
/// use std::path::PathBuf;
/// use mediaconv_common::paths::filename_variant;
///
/// assert_eq!(filename_variant(&PathBuf::from("/m/logo.png"), 2), PathBuf::from("/m/logo_2.png"));
/// assert_eq!(filename_variant(&PathBuf::from("/m/README"), 1), PathBuf::from("/m/README_1"));
/// ```
pub fn filename_variant(path: &Path, n: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, n, ext.to_string_lossy()),
        None => format!("{}_{}", stem, n),
    };
    path.with_file_name(name)
}

/// Human readable size used in log and status messages.
///
/// # Examples
///
/// ```
/// use mediaconv_common::paths::friendly_file_size;
///
/// assert_eq!(friendly_file_size(512), "512 bytes");
/// assert_eq!(friendly_file_size(2_500), "2 kb");
/// assert_eq!(friendly_file_size(1_500_000), "1.50 mb");
/// ```
pub fn friendly_file_size(size_in_bytes: u64) -> String {
    if size_in_bytes < 1_000 {
        return format!("{} bytes", size_in_bytes);
    }
    if size_in_bytes < 1_000_000 {
        return format!("{} kb", size_in_bytes / 1_000);
    }
    let hundredths = size_in_bytes / 10_000;
    format!("{:.2} mb", hundredths as f64 / 100.0)
}
