//! Shared domain types for the chronicle recorder.
//!
//! This crate has no database or runtime dependencies so the cache and
//! error types can be used from any layer.

pub mod cache;
pub mod error;
pub mod types;

pub use cache::BoundedCache;
pub use error::CoreError;
