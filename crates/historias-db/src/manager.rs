//! The connection manager.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use historias_db_core::{DbLogger, FacadeError};
use historias_db_mock::{MockStore, QueryResult};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::config::ConnectionConfig;
use crate::driver::{Driver, DriverError, ErrorReceiver};
use crate::events::{ConnectionEvent, QueryRoute};
use crate::state::{ConnectionPhase, ConnectionState, StateTracker};

#[cfg(feature = "metrics")]
use metrics::{counter, describe_counter, describe_gauge, gauge};

#[cfg(feature = "metrics")]
use std::sync::Once;

#[cfg(feature = "metrics")]
static METRICS_INIT: Once = Once::new();

const CREATE_STORY_INTERACTIONS: &str = "CREATE TABLE IF NOT EXISTS story_interactions (
    id SERIAL PRIMARY KEY,
    historia_id INTEGER NOT NULL,
    likes INTEGER DEFAULT 0,
    views INTEGER DEFAULT 0,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT unique_historia_interaction UNIQUE (historia_id)
)";

const CREATE_COMENTARIOS: &str = "CREATE TABLE IF NOT EXISTS comentarios (
    id SERIAL PRIMARY KEY,
    historia_id INTEGER NOT NULL,
    autor VARCHAR(100) NOT NULL,
    contenido TEXT NOT NULL,
    fecha TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";

/// Supervises a pooled database connection and falls back to a [`MockStore`]
/// when the database stays unreachable.
///
/// The manager is a cheap handle; clones share the same pool, mock store and
/// state. Background work (the retry loop and the pool error listener) runs
/// on the Tokio runtime that called [`initialize`](Self::initialize) and is
/// stopped by [`shutdown`](Self::shutdown).
///
/// # Examples
///
/// ```
/// use historias_db::{ConnectionConfig, ConnectionManager};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// // No connection string: queries are served by the mock store.
/// let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;
/// assert!(manager.is_mock_mode());
///
/// let result = manager
///     .query("SELECT likes FROM story_interactions WHERE historia_id = $1", &[json!(42)])
///     .await;
/// assert_eq!(result.rows[0]["likes"], 0);
/// # }
/// ```
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    config: ConnectionConfig,
    driver: Option<Arc<dyn Driver>>,
    store: Arc<MockStore>,
    state: StateTracker,
    logger: DbLogger,
    schema_ready: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ConnectionManager {
    fn new(config: ConnectionConfig, driver: Option<Arc<dyn Driver>>) -> Self {
        #[cfg(feature = "metrics")]
        METRICS_INIT.call_once(|| {
            describe_counter!(
                "historias_db_queries_total",
                "Total number of queries, by the backend that answered them"
            );
            describe_counter!(
                "historias_db_connection_attempts_total",
                "Total number of connection attempts, by outcome"
            );
            describe_gauge!(
                "historias_db_mock_mode",
                "1 when queries are served by the mock store for good"
            );
        });

        let store = match config.mock_data() {
            Some(overrides) => MockStore::with_override(overrides),
            None => MockStore::new(),
        };
        let logger = DbLogger::new(config.log_prefix());

        Self {
            inner: Arc::new(Inner {
                config,
                driver,
                store: Arc::new(store),
                state: StateTracker::new(),
                logger,
                schema_ready: AtomicBool::new(false),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Builds the configured driver and makes the first connection attempt.
    ///
    /// Never fails. Without a connection string, with mock mode forced, or
    /// when no driver can be built, the manager starts in mock mode. A
    /// failed first attempt schedules retries in the background.
    pub async fn initialize(config: ConnectionConfig) -> Self {
        if config.force_mock() {
            let manager = Self::new(config, None);
            manager.activate_mock(None);
            return manager;
        }

        if !config.has_connection_target() {
            let manager = Self::new(config, None);
            manager.activate_mock(Some(FacadeError::configuration(
                "no connection string or host configured",
            )));
            return manager;
        }

        match Self::build_driver(&config) {
            Ok(driver) => Self::initialize_with_driver(config, driver).await,
            Err(error) => {
                let manager = Self::new(config, None);
                manager.activate_mock(Some(error));
                manager
            }
        }
    }

    #[cfg(feature = "postgres")]
    fn build_driver(config: &ConnectionConfig) -> Result<crate::driver::PgDriver, FacadeError> {
        crate::driver::PgDriver::new(config).map_err(FacadeError::from)
    }

    #[cfg(not(feature = "postgres"))]
    fn build_driver(_config: &ConnectionConfig) -> Result<NoDriver, FacadeError> {
        Err(FacadeError::configuration(
            "no database driver compiled in (enable the `postgres` feature)",
        ))
    }

    /// Like [`initialize`](Self::initialize) with a caller-supplied driver.
    ///
    /// The configuration's connection string is not used.
    pub async fn initialize_with_driver<D>(config: ConnectionConfig, driver: D) -> Self
    where
        D: Driver,
    {
        let force_mock = config.force_mock();
        let driver: Arc<dyn Driver> = Arc::new(driver);
        let manager = Self::new(config, Some(Arc::clone(&driver)));

        if force_mock {
            manager.activate_mock(None);
            return manager;
        }

        if let Some(errors) = driver.take_errors() {
            manager.spawn_error_listener(errors);
        }

        manager.test_connection().await;
        manager
    }

    /// Attempts a connection and creates the `story_interactions` and
    /// `comentarios` tables on success.
    ///
    /// Returns `true` without touching the database in mock mode. On failure
    /// a retry is scheduled unless the retry budget is used up.
    pub async fn test_connection(&self) -> bool {
        let state = &self.inner.state;
        if state.is_mock() {
            self.inner.logger.warn("mock mode active, skipping connection check");
            return true;
        }

        let connected = self.attempt().await;
        if !connected {
            self.schedule_retry();
        }
        connected
    }

    /// Returns a snapshot of the connection state.
    pub fn get_state(&self) -> ConnectionState {
        self.inner.state.snapshot()
    }

    /// Returns `true` once queries are permanently served by the mock store.
    pub fn is_mock_mode(&self) -> bool {
        self.inner.state.is_mock()
    }

    /// Runs a query. Never fails.
    ///
    /// While connected the query goes to the database. A live query that
    /// fails because the connection broke is answered by the mock store; one
    /// rejected by the database (bad SQL, constraint violation) gets an empty
    /// result and leaves the mock store untouched. While disconnected,
    /// retrying or in mock mode the mock store answers directly.
    pub async fn query(&self, sql: &str, params: &[Value]) -> QueryResult {
        if self.inner.state.is_connected() {
            if let Some(driver) = &self.inner.driver {
                match driver.query(sql, params).await {
                    Ok(result) => {
                        self.record_route(QueryRoute::Live);
                        return result;
                    }
                    Err(error) if error.is_connection_level() => {
                        self.on_live_query_failed(error)
                    }
                    Err(error) => {
                        self.on_live_query_failed(error);
                        return QueryResult::empty();
                    }
                }
            }
        }

        self.emulate(sql, params).await
    }

    /// Returns the mock store shared by every clone of this manager.
    pub fn mock_store(&self) -> Arc<MockStore> {
        Arc::clone(&self.inner.store)
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    /// Returns the prefixed logger.
    pub fn logger(&self) -> &DbLogger {
        &self.inner.logger
    }

    /// Returns the instance name.
    pub fn name(&self) -> &str {
        self.inner.config.name()
    }

    /// Stops background tasks and closes the pool.
    ///
    /// Queries issued afterwards are still answered, by the mock store once
    /// the pool reports itself closed.
    pub async fn shutdown(&self) {
        let tasks: Vec<_> = self.inner.tasks.lock().drain(..).collect();
        for task in tasks {
            task.abort();
        }
        self.inner.state.end_retry();

        if let Some(driver) = &self.inner.driver {
            driver.end().await;
        }
        self.inner.logger.info("connection manager shut down");
    }

    /// One connection attempt. Never schedules a retry itself.
    async fn attempt(&self) -> bool {
        let inner = &self.inner;
        let Some(driver) = &inner.driver else {
            return false;
        };
        // A check on a healthy connection keeps routing queries live.
        if !inner.state.is_connected() && !inner.state.transition(ConnectionPhase::Connecting) {
            return false;
        }

        let attempt = inner.state.failed_attempts() + 1;
        inner.logger.info(format_args!(
            "connecting to database (attempt {}/{})",
            attempt,
            inner.config.max_retries()
        ));
        self.emit(ConnectionEvent::AttemptStarted {
            name: self.name().to_string(),
            timestamp: Instant::now(),
            attempt,
        });

        let start = Instant::now();
        let timeout = inner.config.connect_timeout();
        let result = match tokio::time::timeout(timeout, driver.connect()).await {
            Ok(result) => result,
            Err(_) => Err(DriverError::Timeout(timeout)),
        };

        match result {
            Ok(()) => {
                if !inner.state.mark_connected() {
                    return false;
                }
                self.record_attempt("success");
                inner.logger.success("database connection verified");
                self.emit(ConnectionEvent::Connected {
                    name: self.name().to_string(),
                    timestamp: Instant::now(),
                    duration: start.elapsed(),
                });
                self.ensure_schema(driver.as_ref()).await;
                true
            }
            Err(error) => {
                let error = FacadeError::from(error);
                let failed_attempts = inner.state.record_failure(error.clone());
                inner.state.transition(ConnectionPhase::Disconnected);
                self.record_attempt("failure");

                tracing::warn!(
                    prefix = %inner.logger.prefix(),
                    attempt = failed_attempts,
                    error = %error,
                    "database connection failed"
                );
                self.emit(ConnectionEvent::ConnectionFailed {
                    name: self.name().to_string(),
                    timestamp: Instant::now(),
                    failed_attempts,
                    error: error.clone(),
                });

                if error.is_configuration() || inner.config.policy().is_exhausted(failed_attempts) {
                    self.activate_mock(Some(error));
                }
                false
            }
        }
    }

    async fn ensure_schema(&self, driver: &dyn Driver) {
        if self.inner.schema_ready.load(Ordering::Acquire) {
            return;
        }

        for ddl in [CREATE_STORY_INTERACTIONS, CREATE_COMENTARIOS] {
            if let Err(error) = driver.query(ddl, &[]).await {
                self.inner
                    .logger
                    .error(format_args!("failed to create tables: {}", error));
                return;
            }
        }

        if !self.inner.schema_ready.swap(true, Ordering::AcqRel) {
            self.inner.logger.success("tables verified");
            self.emit(ConnectionEvent::SchemaReady {
                name: self.name().to_string(),
                timestamp: Instant::now(),
            });
        }
    }

    /// Starts the retry loop unless one is already running.
    fn schedule_retry(&self) {
        let state = &self.inner.state;
        if state.is_mock() || state.is_connected() {
            return;
        }
        if !state.try_begin_retry() {
            tracing::debug!(prefix = %self.inner.logger.prefix(), "retry already in progress");
            return;
        }

        let handle = tokio::spawn(retry_loop(Arc::downgrade(&self.inner)));
        self.track(handle);
    }

    fn spawn_error_listener(&self, mut errors: ErrorReceiver) {
        let weak = Arc::downgrade(&self.inner);
        let handle = tokio::spawn(async move {
            while let Some(error) = errors.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                ConnectionManager { inner }.handle_pool_error(error);
            }
        });
        self.track(handle);
    }

    fn handle_pool_error(&self, error: DriverError) {
        let error = FacadeError::from(error);
        self.inner
            .logger
            .error(format_args!("unexpected pool error: {}", error));
        self.emit(ConnectionEvent::PoolError {
            name: self.name().to_string(),
            timestamp: Instant::now(),
            error: error.clone(),
        });

        if self.inner.state.mark_lost(error) {
            self.schedule_retry();
        }
    }

    fn on_live_query_failed(&self, error: DriverError) {
        let fallback = if error.is_connection_level() {
            "answering from mock data"
        } else {
            "returning no rows"
        };
        let error = FacadeError::from(error);
        self.inner
            .logger
            .warn(format_args!("query failed, {}: {}", fallback, error));
        self.emit(ConnectionEvent::LiveQueryFailed {
            name: self.name().to_string(),
            timestamp: Instant::now(),
            error,
        });
    }

    async fn emulate(&self, sql: &str, params: &[Value]) -> QueryResult {
        let latency = self.inner.config.simulated_latency();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        tracing::debug!(
            prefix = %self.inner.logger.prefix(),
            sql = %historias_db_core::error::truncate(sql, 80),
            "emulating query"
        );
        self.record_route(QueryRoute::Mock);
        self.inner.store.emulate(sql, params)
    }

    fn activate_mock(&self, reason: Option<FacadeError>) {
        if !self.inner.state.enter_mock(reason.clone()) {
            return;
        }

        match &reason {
            Some(error) => self.inner.logger.warn(format_args!(
                "switching to mock mode after: {}",
                error
            )),
            None => self.inner.logger.warn("mock mode forced by configuration"),
        }

        #[cfg(feature = "metrics")]
        gauge!("historias_db_mock_mode", "manager" => self.name().to_string()).set(1.0);

        self.emit(ConnectionEvent::MockModeActivated {
            name: self.name().to_string(),
            timestamp: Instant::now(),
            reason,
        });
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut tasks = self.inner.tasks.lock();
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    fn emit(&self, event: ConnectionEvent) {
        self.inner.config.event_listeners.emit(&event);
    }

    #[allow(unused_variables)]
    fn record_route(&self, route: QueryRoute) {
        #[cfg(feature = "metrics")]
        counter!(
            "historias_db_queries_total",
            "manager" => self.name().to_string(),
            "route" => route.as_str()
        )
        .increment(1);
    }

    #[allow(unused_variables)]
    fn record_attempt(&self, result: &'static str) {
        #[cfg(feature = "metrics")]
        counter!(
            "historias_db_connection_attempts_total",
            "manager" => self.name().to_string(),
            "result" => result
        )
        .increment(1);
    }
}

/// Sleeps, attempts, repeats until connected or in mock mode.
async fn retry_loop(weak: Weak<Inner>) {
    loop {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let manager = ConnectionManager { inner };
        let state = &manager.inner.state;

        if state.is_mock() || state.is_connected() {
            state.end_retry();
            return;
        }

        let delay = manager
            .inner
            .config
            .policy()
            .delay_for_attempt(state.failed_attempts().max(1));
        manager.inner.logger.info(format_args!(
            "retrying connection in {}ms",
            delay.as_millis()
        ));
        manager.emit(ConnectionEvent::RetryScheduled {
            name: manager.name().to_string(),
            timestamp: Instant::now(),
            delay,
        });
        drop(manager);

        tokio::time::sleep(delay).await;

        let Some(inner) = weak.upgrade() else {
            return;
        };
        let manager = ConnectionManager { inner };
        if manager.attempt().await || manager.is_mock_mode() {
            manager.inner.state.end_retry();
            // A pool error may have arrived while the slot was still held.
            if !manager.is_mock_mode() && !manager.inner.state.is_connected() {
                manager.schedule_retry();
            }
            return;
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("name", &self.name())
            .field("state", &self.inner.state)
            .field("has_driver", &self.inner.driver.is_some())
            .field("store", &self.inner.store)
            .finish()
    }
}

/// Placeholder driver type for builds without a database backend.
#[cfg(not(feature = "postgres"))]
enum NoDriver {}

#[cfg(not(feature = "postgres"))]
impl Driver for NoDriver {
    fn connect(&self) -> futures::future::BoxFuture<'_, Result<(), DriverError>> {
        match *self {}
    }

    fn query<'a>(
        &'a self,
        _sql: &'a str,
        _params: &'a [Value],
    ) -> futures::future::BoxFuture<'a, Result<QueryResult, DriverError>> {
        match *self {}
    }

    fn end(&self) -> futures::future::BoxFuture<'_, ()> {
        match *self {}
    }
}
