use std::collections::BTreeMap;

use historias_db_mock::{DEFAULT_STORY_COUNT, MockData, MockDataOverride, MockStore, Story};
use serde_json::json;

const INSERT_LIKE: &str = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
const INSERT_COMMENT: &str =
    "INSERT INTO comentarios (historia_id, autor, contenido) VALUES ($1, $2, $3)";

#[test]
fn builtin_seed() {
    let store = MockStore::new();
    let stories = store.stories();

    assert_eq!(stories.len() as i64, DEFAULT_STORY_COUNT);
    assert_eq!(stories[0].title, "Historia Mock #1");
    assert_eq!(store.snapshot(), MockData::builtin());
}

#[test]
fn reset_restores_the_seed_exactly() {
    let store = MockStore::new();
    let seeded = store.snapshot();

    store.emulate(INSERT_LIKE, &[json!(1)]);
    store.emulate(INSERT_COMMENT, &[json!(1), json!("a"), json!("b")]);
    assert_ne!(store.snapshot(), seeded);

    store.reset();
    assert_eq!(store.snapshot(), seeded);

    store.reset();
    assert_eq!(store.snapshot(), seeded);
}

#[test]
fn override_replaces_top_level_keys() {
    let overrides = MockDataOverride::default()
        .with_stories(vec![Story {
            id: 100,
            title: "Una sola".to_string(),
            content: "Contenido".to_string(),
        }])
        .with_likes(BTreeMap::from([(100, 5)]));
    let store = MockStore::with_override(&overrides);

    assert_eq!(store.stories().len(), 1);
    assert_eq!(store.likes(100), 5);

    store.emulate(INSERT_LIKE, &[json!(100)]);
    assert_eq!(store.likes(100), 6);

    store.reset();
    assert_eq!(store.likes(100), 5);
}

#[test]
fn seed_with_explicit_data() {
    let mut data = MockData::builtin();
    data.likes.insert(2, 40);
    let store = MockStore::seed(data.clone());

    assert_eq!(store.likes(2), 40);
    assert_eq!(store.seed_data(), &data);
}

#[test]
fn merge_applies_over_current_state() {
    let store = MockStore::new();
    store.emulate(INSERT_COMMENT, &[json!(1), json!("a"), json!("b")]);

    store.merge(&MockDataOverride::default().with_likes(BTreeMap::from([(1, 10)])));

    assert_eq!(store.likes(1), 10);
    assert_eq!(store.comments_for(1).len(), 1);
}

#[test]
fn unknown_statements_are_empty_results() {
    let store = MockStore::new();
    for sql in [
        "DELETE FROM comentarios WHERE id = $1",
        "UPDATE story_interactions SET views = views + 1",
        "SELECT * FROM historias",
        "",
    ] {
        let result = store.emulate(sql, &[json!(1)]);
        assert!(result.is_empty(), "{:?}", sql);
        assert_eq!(result.row_count, 0);
    }
    assert_eq!(store.snapshot(), MockData::builtin());
}
