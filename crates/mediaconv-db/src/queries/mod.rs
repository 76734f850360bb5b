//! Database query modules.
//!
//! Every function takes a plain `&Connection`, so the same queries run on a
//! pooled connection or inside an [`EditContext`](crate::EditContext).

pub mod access;
pub mod blobs;
pub mod cleanup;
pub mod fields;
pub mod items;
pub mod jobs;
pub mod users;
