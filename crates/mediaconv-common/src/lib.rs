//! Mediaconv-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across mediaconv:
//!
//! - **Typed IDs**: Type-safe UUID wrappers for items and users
//! - **Item references**: [`ItemUri`], the (store, item, version) triple
//! - **Core Types**: Enums for conversion targets, outcomes, and access rights
//! - **Path Utilities**: Media library checks and store-relative path mapping
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use mediaconv_common::{ItemId, ItemUri, ConversionTarget, Error, Result};
//! use mediaconv_common::paths::is_media_library_path;
//!
//! let uri = ItemUri::new("master", ItemId::new(), 1);
//! assert_eq!(uri.database(), "master");
//!
//! let target: ConversionTarget = "file".parse().unwrap();
//! assert_eq!(target, ConversionTarget::File);
//!
//! assert!(is_media_library_path("/media library/images/logo"));
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("item"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;
pub mod types;

pub use error::{Error, Result};
pub use ids::*;
pub use types::*;
