//! Property tests for the mock store.
//!
//! Invariants tested:
//! - Like counters equal the number of emulated inserts, per story
//! - Comments come back in insertion order
//! - Reset always restores the seeded state

use std::collections::HashMap;

use historias_db_mock::{MockData, MockStore};
use proptest::prelude::*;
use serde_json::json;

const SELECT_LIKES: &str = "SELECT likes FROM story_interactions WHERE historia_id = $1";
const INSERT_LIKE: &str = "INSERT INTO story_interactions (historia_id, likes) VALUES ($1, 1)";
const SELECT_COMMENTS: &str = "SELECT * FROM comentarios WHERE historia_id = $1";
const INSERT_COMMENT: &str =
    "INSERT INTO comentarios (historia_id, autor, contenido) VALUES ($1, $2, $3)";

#[derive(Debug, Clone)]
enum Op {
    Like(i64),
    Comment(i64, String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..=5).prop_map(Op::Like),
        (1i64..=5, "[a-z ]{0,12}").prop_map(|(id, text)| Op::Comment(id, text)),
    ]
}

fn apply(store: &MockStore, op: &Op) {
    match op {
        Op::Like(id) => {
            store.emulate(INSERT_LIKE, &[json!(id)]);
        }
        Op::Comment(id, text) => {
            store.emulate(INSERT_COMMENT, &[json!(id), json!("prop"), json!(text)]);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: every emulated insert raises the counter by exactly one
    #[test]
    fn like_counter_matches_insert_count(ids in prop::collection::vec(1i64..=10, 0..60)) {
        let store = MockStore::new();
        let mut expected: HashMap<i64, u64> = HashMap::new();

        for id in &ids {
            let before = store.likes(*id);
            let result = store.emulate(INSERT_LIKE, &[json!(id)]);
            prop_assert_eq!(result.rows[0]["likes"].as_u64(), Some(before + 1));
            *expected.entry(*id).or_default() += 1;
        }

        for id in 1..=10 {
            let result = store.emulate(SELECT_LIKES, &[json!(id)]);
            prop_assert_eq!(
                result.rows[0]["likes"].as_u64(),
                Some(expected.get(&id).copied().unwrap_or(0))
            );
        }
    }

    /// Property: comments are returned in the order they were inserted
    #[test]
    fn comments_keep_insertion_order(texts in prop::collection::vec("[a-zA-Z0-9]{1,10}", 0..30)) {
        let store = MockStore::new();
        for text in &texts {
            store.emulate(INSERT_COMMENT, &[json!(7), json!("prop"), json!(text)]);
        }

        let result = store.emulate(SELECT_COMMENTS, &[json!(7)]);
        let contents: Vec<String> = result
            .rows
            .iter()
            .map(|row| row["contenido"].as_str().unwrap_or_default().to_string())
            .collect();
        prop_assert_eq!(contents, texts);
    }

    /// Property: reset restores the seed after any sequence of writes
    #[test]
    fn reset_is_idempotent(ops in prop::collection::vec(op(), 0..40)) {
        let store = MockStore::new();
        for op in &ops {
            apply(&store, op);
        }

        store.reset();
        prop_assert_eq!(store.snapshot(), MockData::builtin());
        store.reset();
        prop_assert_eq!(store.snapshot(), MockData::builtin());
    }
}
