//! Error taxonomy of the data-access facade.
//!
//! None of these errors ever reach a caller of `query`/`execute`. They are
//! recorded in the connection state (`last_error`), logged, and reported
//! through events. Each variant maps onto a recovery action:
//!
//! | variant | recovery |
//! |---|---|
//! | [`FacadeError::Configuration`] | permanent mock mode, immediately |
//! | [`FacadeError::Connection`] | retry with delay, then permanent mock mode |
//! | [`FacadeError::EmulationMiss`] | empty result `{rows: [], rowCount: 0}` |

use thiserror::Error;

/// Errors recorded by the facade.
///
/// The type is `Clone` so that it can be copied into state snapshots; driver
/// errors are flattened into their message when they are recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FacadeError {
    /// The configuration does not allow a live connection (for example the
    /// connection string is missing or cannot be parsed).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A connection could not be established or was lost.
    #[error("connection error: {0}")]
    Connection(String),

    /// No emulation rule matched the query text.
    #[error("no emulation rule matches query: {sql}")]
    EmulationMiss {
        /// The (possibly truncated) query text.
        sql: String,
    },
}

impl FacadeError {
    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Creates an emulation miss for the given query text.
    pub fn emulation_miss(sql: &str) -> Self {
        Self::EmulationMiss {
            sql: truncate(sql, 80),
        }
    }

    /// Returns `true` for configuration errors.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// Returns `true` for connection errors.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Returns `true` for emulation misses.
    pub fn is_emulation_miss(&self) -> bool {
        matches!(self, Self::EmulationMiss { .. })
    }
}

/// Truncates `text` to at most `max` characters, on a char boundary.
pub fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
