use historias_db::{ConnectionConfig, ConnectionManager, Query, QueryRouter};
use serde_json::json;
use tower::{Service, ServiceExt};

#[tokio::test]
async fn router_is_a_tower_service() {
    let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;
    let mut router = QueryRouter::new(manager);

    let insert = Query::new("INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)")
        .bind(12);
    router.ready().await.unwrap().call(insert.clone()).await.unwrap();
    let result = router.ready().await.unwrap().call(insert).await.unwrap();

    assert_eq!(result.rows[0]["likes"], json!(2));
}

#[tokio::test]
async fn oneshot_through_service_ext() {
    let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;
    let router = QueryRouter::new(manager);

    let result = router
        .oneshot(Query::new("SELECT * FROM comentarios WHERE historia_id = $1").bind(1))
        .await
        .unwrap();

    assert!(result.is_empty());
}

#[tokio::test]
async fn service_composes_with_tower_layers() {
    let manager = ConnectionManager::initialize(ConnectionConfig::default()).await;
    let service = tower::ServiceBuilder::new()
        .map_response(|result: historias_db::QueryResult| result.row_count)
        .service(QueryRouter::new(manager));

    let count = service
        .oneshot(Query::new("SELECT likes FROM story_interactions WHERE historia_id = 3"))
        .await
        .unwrap();

    assert_eq!(count, 1);
}
