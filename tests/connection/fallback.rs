use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use historias_db::{ConnectionConfig, ConnectionManager, ConnectionPhase};
use serde_json::json;

use super::support::ScriptedDriver;

const SELECT_LIKES: &str = "SELECT likes FROM story_interactions WHERE historia_id = $1";

fn config(max_retries: u32, retry_delay_ms: u64) -> ConnectionConfig {
    ConnectionConfig::builder()
        .max_retries(max_retries)
        .retry_delay(Duration::from_millis(retry_delay_ms))
        .build()
}

async fn wait_for_mock(manager: &ConnectionManager, limit: Duration) -> Duration {
    let start = Instant::now();
    while !manager.is_mock_mode() && start.elapsed() < limit {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    start.elapsed()
}

#[tokio::test]
async fn missing_connection_string_serves_mock_likes() {
    let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;

    let result = manager.query(SELECT_LIKES, &[json!(42)]).await;

    assert!(manager.is_mock_mode());
    assert_eq!(
        serde_json::to_value(&result).unwrap(),
        json!({"rows": [{"likes": 0}], "rowCount": 1})
    );
}

#[tokio::test]
async fn unreachable_database_switches_to_mock_after_budget() {
    let driver = ScriptedDriver::unreachable();
    let scripted = driver.clone();

    let manager = ConnectionManager::initialize_with_driver(config(2, 10), driver).await;
    let elapsed = wait_for_mock(&manager, Duration::from_secs(2)).await;

    let state = manager.get_state();
    assert!(state.in_mock_mode);
    assert!(!state.is_connected);
    assert_eq!(state.phase, ConnectionPhase::Mock);
    assert_eq!(state.failed_attempts, 2);
    assert_eq!(scripted.connect_count(), 2);
    assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);

    let result = manager.query(SELECT_LIKES, &[json!(42)]).await;
    assert_eq!(result.rows[0]["likes"], json!(0));
}

#[tokio::test]
async fn mock_mode_is_never_left() {
    let driver = ScriptedDriver::unreachable();
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(1, 5), driver).await;
    assert!(manager.is_mock_mode());

    assert!(manager.test_connection().await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(manager.is_mock_mode());
    assert_eq!(scripted.connect_count(), 1);
}

#[tokio::test]
async fn below_budget_keeps_retrying() {
    let driver = ScriptedDriver::unreachable();
    let manager = ConnectionManager::initialize_with_driver(config(50, 20), driver).await;

    let state = manager.get_state();
    assert!(!state.in_mock_mode);
    assert!(state.is_retrying);
    assert_eq!(state.failed_attempts, 1);
    assert!(state.last_error.as_ref().is_some_and(|e| e.is_connection()));

    manager.shutdown().await;
}

#[tokio::test]
async fn queries_while_retrying_are_emulated() {
    let driver = ScriptedDriver::unreachable();
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(50, 20), driver).await;

    let insert = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
    manager.query(insert, &[json!(8)]).await;
    let result = manager.query(SELECT_LIKES, &[json!(8)]).await;

    assert_eq!(result.rows[0]["likes"], json!(1));
    assert_eq!(scripted.queries.load(Ordering::SeqCst), 0);
    manager.shutdown().await;
}

#[tokio::test]
async fn recovers_when_database_comes_back() {
    let driver = ScriptedDriver::new(3);
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(5, 10), driver).await;

    let start = Instant::now();
    while !manager.get_state().is_connected && start.elapsed() < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let state = manager.get_state();
    assert!(state.is_connected);
    assert_eq!(state.failed_attempts, 0);
    assert!(state.last_error.is_none());
    assert_eq!(scripted.connect_count(), 4);

    let result = manager.query(SELECT_LIKES, &[json!(1)]).await;
    assert_eq!(result.rows[0]["likes"], json!(1000));
}

#[tokio::test]
async fn rejected_live_query_returns_no_rows() {
    let driver = ScriptedDriver::new(0);
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(5, 10), driver).await;
    assert!(manager.get_state().is_connected);

    scripted.fail_queries.store(true, Ordering::SeqCst);
    let insert = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
    let result = manager.query(insert, &[json!(1)]).await;

    assert!(result.rows.is_empty());
    assert_eq!(result.row_count, 0);
    assert_eq!(manager.mock_store().likes(1), 0);
    assert!(manager.get_state().is_connected);
}

#[tokio::test]
async fn live_query_on_dropped_connection_is_answered_from_mock() {
    let driver = ScriptedDriver::new(0);
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(5, 10), driver).await;
    assert!(manager.get_state().is_connected);

    scripted.lose_queries.store(true, Ordering::SeqCst);
    let result = manager.query(SELECT_LIKES, &[json!(1)]).await;

    assert_eq!(result.rows[0]["likes"], json!(0));
}

#[tokio::test]
async fn health_check_on_healthy_connection_keeps_queries_live() {
    let driver = ScriptedDriver::new(0);
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(5, 10), driver).await;
    assert!(manager.get_state().is_connected);

    scripted.connect_delay_ms.store(200, Ordering::SeqCst);
    let checker = manager.clone();
    let check = tokio::spawn(async move { checker.test_connection().await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let state = manager.get_state();
    assert!(state.is_connected);
    assert_eq!(state.phase, ConnectionPhase::Connected);

    let insert = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
    let result = manager.query(insert, &[json!(5)]).await;
    assert_eq!(result.rows[0]["likes"], json!(1000));
    assert_eq!(manager.mock_store().likes(5), 0);

    assert!(check.await.unwrap());
    assert!(manager.get_state().is_connected);
    assert_eq!(scripted.connect_count(), 2);
}

#[tokio::test]
async fn forced_mock_mode_never_connects() {
    let driver = ScriptedDriver::new(0);
    let scripted = driver.clone();
    let config = ConnectionConfig::builder().force_mock(true).build();

    let manager = ConnectionManager::initialize_with_driver(config, driver).await;

    assert!(manager.is_mock_mode());
    assert_eq!(scripted.connect_count(), 0);
}

#[tokio::test]
async fn shutdown_ends_the_pool() {
    let driver = ScriptedDriver::new(0);
    let scripted = driver.clone();
    let manager = ConnectionManager::initialize_with_driver(config(5, 10), driver).await;

    manager.shutdown().await;

    assert!(scripted.ended.load(Ordering::SeqCst));
}
