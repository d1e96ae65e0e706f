//! Chronicle event recording pipeline.
//!
//! This crate provides the write side of the recorder:
//!
//! - [`RecordedEvent`] — the event envelope accepted for persistence.
//! - [`Recorder`] — the single-writer background task that resolves
//!   event-type ids (via the `chronicle-db` resolver), inserts event rows,
//!   and services lookups and refresh tasks from other contexts.
//! - [`RecorderHandle`] — cloneable, channel-backed API for submitting
//!   events and lookups to the recorder.

pub mod recorder;

pub use recorder::{RecordedEvent, Recorder, RecorderError, RecorderHandle};
