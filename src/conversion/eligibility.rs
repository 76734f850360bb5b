//! Which items and versions qualify for conversion, and who may convert them.

use mediaconv_common::{paths, AccessRight, Result};
use mediaconv_db::models::{Item, User};

use crate::repository::ContentRepository;

/// An item inside the media library whose template is not a folder template.
pub fn is_media_item(item: &Item) -> bool {
    paths::is_media_library_path(&item.path) && !item.template_is_folder
}

/// The binary field exists and holds a separate value per version.
pub fn is_versionable(item: &Item, blob_field: &str) -> bool {
    item.field(blob_field).map(|f| !f.shared).unwrap_or(false)
}

/// The item's media lives on the file system.
pub fn is_file_based(item: &Item, file_path_field: &str) -> bool {
    !item.field_value(file_path_field).is_empty()
}

/// The versions of `item` that carry their own media content, ascending.
///
/// A media item with a shared (or absent) binary field has a single
/// candidate: the version it was resolved at.
pub fn versions_with_media(
    repo: &dyn ContentRepository,
    item: &Item,
    blob_field: &str,
) -> Result<Vec<Item>> {
    let versionable = is_versionable(item, blob_field);

    if !versionable {
        return Ok(if is_media_item(item) {
            vec![item.clone()]
        } else {
            Vec::new()
        });
    }

    let mut versions = Vec::new();
    for uri in repo.version_uris(&item.uri)? {
        if let Some(version) = repo.get_item(&uri)? {
            if is_media_item(&version) {
                versions.push(version);
            }
        }
    }
    Ok(versions)
}

/// Read and write access of `user` on `item`.
pub fn can_convert(repo: &dyn ContentRepository, item: &Item, user: &User) -> Result<bool> {
    Ok(repo.is_allowed(&item.uri, AccessRight::ItemRead, user)?
        && repo.is_allowed(&item.uri, AccessRight::ItemWrite, user)?)
}

pub fn access_denied_message(item: &Item, user: &User) -> String {
    format!(
        "User does not have the required Read/Write access. To convert a media asset the user must have read and write access. User: {}, Item: {}",
        user.name, item.uri
    )
}
