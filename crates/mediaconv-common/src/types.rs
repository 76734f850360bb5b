//! Core type definitions for conversions, access checks and jobs.
//!
//! All enums are serialized in lowercase so they can be stored as plain text
//! columns and written in TOML/CLI arguments unchanged.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Storage backend a conversion moves media content into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionTarget {
    /// Move the binary out of the database onto the filesystem.
    File,
    /// Move the binary from the filesystem into the database blob field.
    Database,
}

impl fmt::Display for ConversionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Database => write!(f, "database"),
        }
    }
}

impl FromStr for ConversionTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "database" | "db" | "blob" => Ok(Self::Database),
            _ => Err(Error::invalid_input(format!("Invalid conversion target: {}", s))),
        }
    }
}

/// What happened to a single item version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversionAction {
    Processed,
    Skipped,
    Failed,
}

impl fmt::Display for ConversionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Processed => write!(f, "processed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Access right checked by the authorization oracle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessRight {
    ItemRead,
    ItemWrite,
}

impl fmt::Display for AccessRight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ItemRead => write!(f, "item_read"),
            Self::ItemWrite => write!(f, "item_write"),
        }
    }
}

impl FromStr for AccessRight {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "item_read" => Ok(Self::ItemRead),
            "item_write" => Ok(Self::ItemWrite),
            _ => Err(Error::invalid_input(format!("Invalid access right: {}", s))),
        }
    }
}

/// Lifecycle state of a background job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(Error::invalid_input(format!("Invalid job status: {}", s))),
        }
    }
}

/// Kind of prior storage location kept for deferred purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CleanupKind {
    /// A blob id in the database.
    Blob,
    /// A store-relative file path.
    File,
}

impl fmt::Display for CleanupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blob => write!(f, "blob"),
            Self::File => write!(f, "file"),
        }
    }
}

impl FromStr for CleanupKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blob" => Ok(Self::Blob),
            "file" => Ok(Self::File),
            _ => Err(Error::invalid_input(format!("Invalid cleanup kind: {}", s))),
        }
    }
}
