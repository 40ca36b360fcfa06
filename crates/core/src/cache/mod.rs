//! SQLite-backed versioned cache stores.
//!
//! This module provides the persistent key→response storage the controller
//! caches into, using SQLite with async access via tokio-rusqlite. It supports:
//!
//! - Named stores (one per controller version) created on first write
//! - URL-keyed entries addressed by a SHA-256 key
//! - Atomic batch writes for install
//! - A registration record of the version governing each scope
//! - Automatic schema migrations and WAL mode for concurrent access

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod registrations;
pub mod storage;
pub mod stores;

pub use crate::Error;

pub use connection::CacheDb;
pub use registrations::Registration;
pub use storage::CacheStorage;
pub use stores::StoredEntry;
