//! Events emitted by the connection manager.

use std::time::{Duration, Instant};

use historias_db_core::{FacadeError, FacadeEvent};

/// Which backend answered a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryRoute {
    /// The live database pool.
    Live,
    /// The mock store.
    Mock,
}

impl QueryRoute {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryRoute::Live => "live",
            QueryRoute::Mock => "mock",
        }
    }
}

/// Events emitted by the connection manager.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A connection attempt is starting.
    AttemptStarted {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// 1-based attempt number since the last success.
        attempt: u32,
    },

    /// The live database answered the probe query.
    Connected {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Time taken by the successful attempt.
        duration: Duration,
    },

    /// A connection attempt failed.
    ConnectionFailed {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Failed attempts so far.
        failed_attempts: u32,
        /// Why the attempt failed.
        error: FacadeError,
    },

    /// A retry is scheduled.
    RetryScheduled {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Delay before the next attempt.
        delay: Duration,
    },

    /// The driver reported an error on an established connection.
    PoolError {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The reported error.
        error: FacadeError,
    },

    /// Queries are now served by the mock store for good.
    MockModeActivated {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Last error before the switch, `None` when mock mode was forced.
        reason: Option<FacadeError>,
    },

    /// The `story_interactions` and `comentarios` tables exist.
    SchemaReady {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
    },

    /// A live query failed. A broken connection is answered by the mock
    /// store, a rejected statement with no rows.
    LiveQueryFailed {
        /// Name of the manager.
        name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The driver error.
        error: FacadeError,
    },
}

impl FacadeEvent for ConnectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            Self::AttemptStarted { .. } => "attempt_started",
            Self::Connected { .. } => "connected",
            Self::ConnectionFailed { .. } => "connection_failed",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::PoolError { .. } => "pool_error",
            Self::MockModeActivated { .. } => "mock_mode_activated",
            Self::SchemaReady { .. } => "schema_ready",
            Self::LiveQueryFailed { .. } => "live_query_failed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            Self::AttemptStarted { timestamp, .. }
            | Self::Connected { timestamp, .. }
            | Self::ConnectionFailed { timestamp, .. }
            | Self::RetryScheduled { timestamp, .. }
            | Self::PoolError { timestamp, .. }
            | Self::MockModeActivated { timestamp, .. }
            | Self::SchemaReady { timestamp, .. }
            | Self::LiveQueryFailed { timestamp, .. } => *timestamp,
        }
    }

    fn source_name(&self) -> &str {
        match self {
            Self::AttemptStarted { name, .. }
            | Self::Connected { name, .. }
            | Self::ConnectionFailed { name, .. }
            | Self::RetryScheduled { name, .. }
            | Self::PoolError { name, .. }
            | Self::MockModeActivated { name, .. }
            | Self::SchemaReady { name, .. }
            | Self::LiveQueryFailed { name, .. } => name,
        }
    }

    fn is_degraded(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::PoolError { .. }
                | Self::MockModeActivated { .. }
                | Self::LiveQueryFailed { .. }
        )
    }
}
