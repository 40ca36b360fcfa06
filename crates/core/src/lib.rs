//! Core types and shared functionality for sitecache.
//!
//! This crate provides:
//! - Versioned cache stores with a SQLite backend
//! - The `CacheStorage` seam the controller is written against
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod response;

pub use cache::{CacheDb, CacheStorage};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use response::Response;
