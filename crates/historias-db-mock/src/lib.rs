//! In-memory substitute for the stories database.
//!
//! When the relational database is unreachable the connection manager serves
//! every query from a [`MockStore`]. The store keeps placeholder stories, a
//! like counter per story and an append-only comment list, and answers the
//! small vocabulary of statements the site issues by matching on the raw SQL
//! text. Call sites never change when the backend is swapped: the query
//! shape is the only contract.
//!
//! # Recognized statements
//!
//! | statement | result |
//! |---|---|
//! | `SELECT ... FROM story_interactions WHERE historia_id = $1` | `[{likes: n}]` |
//! | `SELECT ... FROM comentarios WHERE historia_id = $1` | comment rows, insertion order |
//! | `INSERT INTO story_interactions ...` | increments the counter, `[{likes: n}]` |
//! | `INSERT INTO comentarios ...` | appends a comment, `[comment]` |
//! | `CREATE TABLE ...` | empty |
//! | anything else | empty |
//!
//! Matching ignores case and whitespace layout.
//!
//! # Example
//!
//! ```rust
//! use historias_db_mock::MockStore;
//! use serde_json::json;
//!
//! let store = MockStore::new();
//! store.emulate("INSERT INTO story_interactions (historia_id) VALUES ($1)", &[json!(42)]);
//!
//! let result = store.emulate(
//!     "SELECT likes FROM story_interactions WHERE historia_id = $1",
//!     &[json!(42)],
//! );
//! assert_eq!(result.rows[0]["likes"], json!(1));
//! assert_eq!(result.row_count, 1);
//! ```

mod record;
mod result;
mod rules;
mod store;

pub use record::{Comment, MockData, MockDataOverride, Story, DEFAULT_STORY_COUNT};
pub use result::{QueryResult, Row};
pub use rules::RuleKind;
pub use store::MockStore;
