//! Connection manager metrics regression tests

use super::helpers::*;
use futures::future::BoxFuture;
use historias_db::{
    ConnectionConfig, ConnectionManager, Driver, DriverError, QueryResult,
};
use serde_json::{Value, json};
use serial_test::serial;
use std::time::Duration;

/// Driver that never connects.
struct DownDriver;

impl Driver for DownDriver {
    fn connect(&self) -> BoxFuture<'_, Result<(), DriverError>> {
        Box::pin(async { Err(DriverError::Connect("connection refused".into())) })
    }

    fn query<'a>(
        &'a self,
        _sql: &'a str,
        _params: &'a [Value],
    ) -> BoxFuture<'a, Result<QueryResult, DriverError>> {
        Box::pin(async { Err(DriverError::Closed) })
    }

    fn end(&self) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }
}

#[tokio::test]
#[serial]
async fn mock_route_metrics_exist() {
    init_recorder();

    let config = ConnectionConfig::builder().name("metrics_mock").build();
    let manager = ConnectionManager::initialize(config).await;
    manager
        .query(
            "SELECT likes FROM story_interactions WHERE historia_id = $1",
            &[json!(1)],
        )
        .await;

    assert_counter_exists("historias_db_queries_total");
    assert_metric_has_label("historias_db_queries_total", "manager", "metrics_mock");
    assert_metric_has_label("historias_db_queries_total", "route", "mock");

    assert_gauge_exists("historias_db_mock_mode");
    assert_metric_has_label("historias_db_mock_mode", "manager", "metrics_mock");
}

#[tokio::test]
#[serial]
async fn connection_attempt_metrics_exist() {
    init_recorder();

    let config = ConnectionConfig::builder()
        .name("metrics_attempts")
        .max_retries(2)
        .retry_delay(Duration::from_millis(5))
        .build();
    let manager = ConnectionManager::initialize_with_driver(config, DownDriver).await;
    for _ in 0..100 {
        if manager.is_mock_mode() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_counter_exists("historias_db_connection_attempts_total");
    assert_metric_has_label(
        "historias_db_connection_attempts_total",
        "manager",
        "metrics_attempts",
    );
    assert_metric_has_label("historias_db_connection_attempts_total", "result", "failure");
    assert_metric_has_label("historias_db_mock_mode", "manager", "metrics_attempts");
}
