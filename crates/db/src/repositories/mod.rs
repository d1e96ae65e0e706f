//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept an executor or `&PgPool` as the first argument.

pub mod event_repo;
pub mod event_type_repo;

pub use event_repo::EventRepo;
pub use event_type_repo::EventTypeRepo;
