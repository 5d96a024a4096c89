//! Relational-style query results.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single result row, keyed by column name.
pub type Row = Map<String, Value>;

/// The result of a query, shaped like a relational driver's result.
///
/// Serializes as `{"rows": [...], "rowCount": n}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Returned rows.
    pub rows: Vec<Row>,
    /// Number of rows returned or affected.
    pub row_count: u64,
}

impl QueryResult {
    /// An empty success result: `{rows: [], rowCount: 0}`.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result whose row count is the number of rows.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let row_count = rows.len() as u64;
        Self { rows, row_count }
    }

    /// A single-row result.
    pub fn single(row: Row) -> Self {
        Self::from_rows(vec![row])
    }

    /// Returns the first row, if any.
    pub fn first(&self) -> Option<&Row> {
        self.rows.first()
    }

    /// Returns `true` when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Builds the `{likes: n}` row.
pub(crate) fn likes_row(likes: u64) -> Row {
    let mut row = Row::new();
    row.insert("likes".to_string(), Value::from(likes));
    row
}
