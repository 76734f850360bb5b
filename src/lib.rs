//! Mediaconv - media storage conversion between database blobs and files
//!
//! This library crate exposes the core functionality for integration testing.

pub mod cleanup;
pub mod config;
pub mod conversion;
pub mod jobs;
pub mod repository;
