//! Single entry point for queries.

use std::convert::Infallible;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use historias_db_mock::QueryResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_service::Service;

use crate::manager::ConnectionManager;
use crate::state::ConnectionState;

/// A statement with positional parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    /// Statement text with `$n` placeholders.
    pub sql: String,
    /// Positional parameters.
    #[serde(default)]
    pub params: Vec<Value>,
}

impl Query {
    /// Creates a query without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Appends a positional parameter.
    pub fn bind(mut self, param: impl Into<Value>) -> Self {
        self.params.push(param.into());
        self
    }
}

/// Routes queries to the live database or the mock store.
///
/// Callers see the same result shape either way and never an error.
///
/// ```
/// use historias_db::{ConnectionConfig, ConnectionManager, QueryRouter};
/// use serde_json::json;
///
/// # #[tokio::main]
/// # async fn main() {
/// let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;
/// let router = QueryRouter::new(manager);
///
/// let sql = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
/// router.execute(sql, &[json!(3)]).await;
/// let result = router.execute(sql, &[json!(3)]).await;
/// assert_eq!(result.rows[0]["likes"], 2);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueryRouter {
    manager: ConnectionManager,
}

impl QueryRouter {
    /// Creates a router over `manager`.
    pub fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Runs a query through the manager. Never fails.
    pub async fn execute(&self, sql: &str, params: &[Value]) -> QueryResult {
        self.manager.query(sql, params).await
    }

    /// Returns `true` once queries are permanently served by the mock store.
    pub fn is_mock_mode(&self) -> bool {
        self.manager.is_mock_mode()
    }

    /// Returns a snapshot of the connection state.
    pub fn state(&self) -> ConnectionState {
        self.manager.get_state()
    }

    /// Returns the underlying manager.
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl Service<Query> for QueryRouter {
    type Response = QueryResult;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, query: Query) -> Self::Future {
        let manager = self.manager.clone();
        Box::pin(async move { Ok(manager.query(&query.sql, &query.params).await) })
    }
}
