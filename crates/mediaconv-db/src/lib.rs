//! Mediaconv-DB: Content store schema, migrations, and query operations
//!
//! This crate provides the SQLite-backed content repository used by mediaconv,
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//! - `edit` - Scoped edit transaction guard
//!
//! # Example
//!
//! ```no_run
//! use mediaconv_db::pool::{init_pool, get_conn};
//! use mediaconv_db::queries::users;
//!
//! let pool = init_pool("/var/lib/mediaconv/content.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let user = users::create_user(&conn, "editor", false).unwrap();
//! println!("Created user: {}", user.name);
//! ```

pub mod edit;
pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use edit::EditContext;
