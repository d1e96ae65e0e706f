//! Entity structs matching database rows.

pub mod event;
