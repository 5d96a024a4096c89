//! Resilient data-access facade for the stories database.
//!
//! A [`ConnectionManager`] supervises a pooled PostgreSQL connection. When
//! the database cannot be reached it retries on a fixed (or exponential)
//! delay, and once the retry budget is spent every query is answered by an
//! in-memory [`MockStore`] that emulates the handful of statements the site
//! issues. Callers go through a [`QueryRouter`] and never see a database
//! error: the only degraded-mode signal is [`ConnectionState`].
//!
//! # Features
//!
//! - **Supervised connection**: bounded connection attempts, retry with a
//!   single background task, reconnection after pool errors
//! - **Mock fallback**: likes and comments keep working from memory
//! - **Event system**: observability through [`ConnectionEvent`]s
//! - **Tower integration**: [`QueryRouter`] is a `Service<Query>` with `Infallible` errors
//! - **Environment configuration**: [`ConnectionConfig::from_env`]
//!
//! # Examples
//!
//! ```rust
//! use std::time::Duration;
//! use historias_db::{ConnectionConfig, ConnectionManager, QueryRouter};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = ConnectionConfig::builder()
//!     .max_retries(3)
//!     .retry_delay(Duration::from_millis(500))
//!     .log_prefix("[stories-db]")
//!     .on_event(|event| println!("{:?}", event))
//!     .build();
//!
//! let router = QueryRouter::new(ConnectionManager::initialize(config).await);
//! let likes = router
//!     .execute(
//!         "SELECT likes FROM story_interactions WHERE historia_id = $1",
//!         &[json!(1)],
//!     )
//!     .await;
//! assert_eq!(likes.row_count, 1);
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - `postgres` (default): PostgreSQL driver on an sqlx pool
//! - `metrics`: query route, connection attempt and mock mode metrics

mod config;
mod driver;
mod events;
mod manager;
mod policy;
mod router;
mod state;

pub use config::{
    ConnectionConfig, ConnectionConfigBuilder, ConnectionParams, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT,
};
#[cfg(feature = "postgres")]
pub use driver::PgDriver;
pub use driver::{Driver, DriverError, ErrorChannel, ErrorReceiver};
pub use events::{ConnectionEvent, QueryRoute};
pub use manager::ConnectionManager;
pub use policy::{Backoff, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};
pub use router::{Query, QueryRouter};
pub use state::{ConnectionPhase, ConnectionState};

pub use historias_db_core::{DbLogger, FacadeError, FacadeEvent};
pub use historias_db_mock::{
    Comment, MockData, MockDataOverride, MockStore, QueryResult, Row, RuleKind, Story,
};
