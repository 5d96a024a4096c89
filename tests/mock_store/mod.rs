//! Tests for the in-memory mock store.
//!
//! Test organization:
//! - likes.rs: like counter emulation
//! - comments.rs: comment emulation
//! - lifecycle.rs: seeding, merging and reset

mod lifecycle;
