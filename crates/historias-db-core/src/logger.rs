//! Prefixed logging for database operations.
//!
//! Every message goes through `tracing` with the configured prefix attached as
//! a structured `prefix` field, so several facades in one process (or one
//! facade per database) stay distinguishable in the log output.

use std::fmt;
use std::sync::Arc;

/// Default prefix used when none is configured.
pub const DEFAULT_LOG_PREFIX: &str = "[DB]";

/// A cheap, cloneable logger that tags every message with a prefix.
#[derive(Clone)]
pub struct DbLogger {
    prefix: Arc<str>,
}

impl DbLogger {
    /// Creates a logger with the given prefix.
    pub fn new(prefix: impl AsRef<str>) -> Self {
        Self {
            prefix: Arc::from(prefix.as_ref()),
        }
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Logs a debug-level message.
    pub fn debug(&self, message: impl fmt::Display) {
        tracing::debug!(prefix = %self.prefix, "{}", message);
    }

    /// Logs an informational message.
    pub fn info(&self, message: impl fmt::Display) {
        tracing::info!(prefix = %self.prefix, "{}", message);
    }

    /// Logs a successful operation.
    pub fn success(&self, message: impl fmt::Display) {
        tracing::info!(prefix = %self.prefix, outcome = "success", "{}", message);
    }

    /// Logs a warning.
    pub fn warn(&self, message: impl fmt::Display) {
        tracing::warn!(prefix = %self.prefix, "{}", message);
    }

    /// Logs an error.
    pub fn error(&self, message: impl fmt::Display) {
        tracing::error!(prefix = %self.prefix, "{}", message);
    }
}

impl Default for DbLogger {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_PREFIX)
    }
}

impl fmt::Debug for DbLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbLogger")
            .field("prefix", &self.prefix)
            .finish()
    }
}
