//! Core infrastructure for historias-db.
//!
//! This crate provides functionality shared by the mock store and the connection manager:
//! - Event system for observability
//! - The facade error taxonomy
//! - A prefixed logger on top of `tracing`

pub mod error;
pub mod events;
pub mod logger;

pub use error::FacadeError;
pub use events::{
    EventFilter, EventListener, EventListeners, FacadeEvent, FilteredListener, FnListener,
};
pub use logger::DbLogger;
