//! Database driver abstraction.
//!
//! A [`Driver`] owns a connection pool. The manager calls
//! [`connect`](Driver::connect) to probe it, sends queries through
//! [`query`](Driver::query), and listens on the receiver returned by
//! [`take_errors`](Driver::take_errors) for errors raised on established
//! connections outside of any caller's query.

use std::time::Duration;

use futures::future::BoxFuture;
use historias_db_core::FacadeError;
use historias_db_mock::QueryResult;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "postgres")]
pub use postgres::PgDriver;

/// Errors reported by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The database could not be reached or refused the connection.
    #[error("failed to connect: {0}")]
    Connect(String),

    /// The connection attempt did not finish in time.
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),

    /// The database rejected a statement.
    #[error("query failed: {0}")]
    Query(String),

    /// An established connection broke.
    #[error("connection lost: {0}")]
    Lost(String),

    /// The pool was closed.
    #[error("connection pool is closed")]
    Closed,

    /// The driver could not be built from the configuration.
    #[error("invalid driver configuration: {0}")]
    Config(String),
}

impl DriverError {
    /// Returns `true` when the error means the connection itself is unusable,
    /// as opposed to a single statement failing.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            DriverError::Connect(_)
                | DriverError::Timeout(_)
                | DriverError::Lost(_)
                | DriverError::Closed
        )
    }
}

impl From<DriverError> for FacadeError {
    fn from(error: DriverError) -> Self {
        match error {
            DriverError::Config(message) => FacadeError::configuration(message),
            other => FacadeError::connection(other.to_string()),
        }
    }
}

/// Receiving half of a driver's error channel.
pub type ErrorReceiver = mpsc::UnboundedReceiver<DriverError>;

/// Error channel a driver embeds to report pool errors.
///
/// The receiver can be taken once; reports made after that (or after the
/// receiver is dropped) go nowhere.
#[derive(Debug)]
pub struct ErrorChannel {
    tx: mpsc::UnboundedSender<DriverError>,
    rx: Mutex<Option<ErrorReceiver>>,
}

impl ErrorChannel {
    /// Creates a channel with its receiver still available.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }

    /// Reports an error. Returns `false` if nobody is listening.
    pub fn report(&self, error: DriverError) -> bool {
        self.tx.send(error).is_ok()
    }

    /// Takes the receiver. Returns `None` after the first call.
    pub fn take_receiver(&self) -> Option<ErrorReceiver> {
        self.rx.lock().take()
    }
}

impl Default for ErrorChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// A pooled connection to the stories database.
pub trait Driver: Send + Sync + 'static {
    /// Checks out a connection and runs a probe query.
    fn connect(&self) -> BoxFuture<'_, Result<(), DriverError>>;

    /// Runs a statement with positional parameters.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [Value],
    ) -> BoxFuture<'a, Result<QueryResult, DriverError>>;

    /// Closes the pool.
    fn end(&self) -> BoxFuture<'_, ()>;

    /// Takes the receiver of pool errors. Drivers without one return `None`.
    fn take_errors(&self) -> Option<ErrorReceiver> {
        None
    }
}
