use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub media: MediaConfig,

    #[serde(default)]
    pub conversion: ConversionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite content store file
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("mediaconv.db")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Media storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaConfig {
    /// Field holding the inline binary payload (a blob id)
    #[serde(default = "default_blob_field")]
    pub blob_field: String,

    /// Field holding the store-relative path of file-based media
    #[serde(default = "default_file_path_field")]
    pub file_path_field: String,

    #[serde(default = "default_extension_field")]
    pub extension_field: String,

    /// Directory that store-relative paths are mapped onto
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,

    /// Store-relative root folder for file-based media
    #[serde(default = "default_file_folder")]
    pub file_folder: String,

    /// Largest payload (in bytes) that may be stored inline in the database
    #[serde(default = "default_max_size_in_database")]
    pub max_size_in_database: u64,
}

fn default_blob_field() -> String {
    "blob".to_string()
}
fn default_file_path_field() -> String {
    "file path".to_string()
}
fn default_extension_field() -> String {
    "extension".to_string()
}
fn default_data_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_file_folder() -> String {
    "/App_Data/MediaFiles".to_string()
}
fn default_max_size_in_database() -> u64 {
    20 * 1024 * 1024
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            blob_field: default_blob_field(),
            file_path_field: default_file_path_field(),
            extension_field: default_extension_field(),
            data_root: default_data_root(),
            file_folder: default_file_folder(),
            max_size_in_database: default_max_size_in_database(),
        }
    }
}

/// Where a conversion queue starts for each reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueRoot {
    /// The referenced item itself is the first candidate.
    #[default]
    Reference,
    /// Only the direct children of the referenced item are candidates.
    Children,
}

impl fmt::Display for QueueRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Children => write!(f, "children"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConversionConfig {
    /// Failures in a row that stop a run
    #[serde(default = "default_consecutive_error_limit")]
    pub consecutive_error_limit: u32,

    #[serde(default)]
    pub queue_root: QueueRoot,

    /// Buffer size for file compare and copy
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_consecutive_error_limit() -> u32 {
    10
}
fn default_chunk_size() -> usize {
    8192
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            consecutive_error_limit: default_consecutive_error_limit(),
            queue_root: QueueRoot::default(),
            chunk_size: default_chunk_size(),
        }
    }
}
