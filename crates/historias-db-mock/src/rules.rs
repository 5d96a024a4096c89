//! Emulation rule table.
//!
//! Rules are tried in order; the first predicate that accepts the normalized
//! query text selects the handler. Normalization lowercases the text,
//! collapses whitespace runs and removes whitespace around `=`, `(`, `)` and
//! `,`, so `WHERE  historia_id = $1` and `where historia_id=$1` are the same
//! query.

use historias_db_core::FacadeError;
use serde_json::Value;

use crate::result::QueryResult;
use crate::store::MockStore;

/// The statement shapes the mock store understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    /// `SELECT ... FROM story_interactions WHERE historia_id = ?`
    SelectLikes,
    /// `SELECT ... FROM comentarios WHERE historia_id = ?`
    SelectComments,
    /// `INSERT INTO story_interactions ...`
    InsertLike,
    /// `INSERT INTO comentarios ...`
    InsertComment,
    /// `CREATE TABLE ...`
    CreateTable,
}

/// Handler invoked for a matched rule.
pub(crate) type Handler = fn(&MockStore, &QueryContext<'_>) -> Result<QueryResult, FacadeError>;

/// One `(predicate, handler)` pair.
pub(crate) struct EmulationRule {
    pub(crate) kind: RuleKind,
    pub(crate) matches: fn(&str) -> bool,
    pub(crate) handler: Handler,
}

pub(crate) const RULES: &[EmulationRule] = &[
    EmulationRule {
        kind: RuleKind::SelectLikes,
        matches: |sql| {
            sql.starts_with("select")
                && sql.contains("from story_interactions where historia_id=")
        },
        handler: MockStore::handle_select_likes,
    },
    EmulationRule {
        kind: RuleKind::SelectComments,
        matches: |sql| {
            sql.starts_with("select") && sql.contains("from comentarios where historia_id=")
        },
        handler: MockStore::handle_select_comments,
    },
    EmulationRule {
        kind: RuleKind::InsertLike,
        matches: |sql| sql.starts_with("insert into story_interactions"),
        handler: MockStore::handle_insert_like,
    },
    EmulationRule {
        kind: RuleKind::InsertComment,
        matches: |sql| sql.starts_with("insert into comentarios"),
        handler: MockStore::handle_insert_comment,
    },
    EmulationRule {
        kind: RuleKind::CreateTable,
        matches: |sql| sql.starts_with("create table"),
        handler: |_, _| Ok(QueryResult::empty()),
    },
];

/// Returns the rule matching the query text, if any.
pub(crate) fn find_rule(normalized: &str) -> Option<&'static EmulationRule> {
    RULES.iter().find(|rule| (rule.matches)(normalized))
}

/// A query as seen by a handler.
pub(crate) struct QueryContext<'a> {
    pub(crate) raw: &'a str,
    pub(crate) normalized: &'a str,
    pub(crate) params: &'a [Value],
}

impl<'a> QueryContext<'a> {
    /// Resolves the story id: the first positional parameter, or the integer
    /// literal that follows `historia_id=` or `values(` in the query text.
    pub(crate) fn story_id(&self) -> Result<i64, FacadeError> {
        if let Some(first) = self.params.first() {
            return param_as_i64(first).ok_or_else(|| FacadeError::emulation_miss(self.raw));
        }

        ["historia_id=", "values("]
            .iter()
            .find_map(|marker| literal_after(self.normalized, marker))
            .ok_or_else(|| FacadeError::emulation_miss(self.raw))
    }

    /// Returns the parameter at `index` rendered as text, if present and not null.
    pub(crate) fn text_param(&self, index: usize) -> Option<String> {
        match self.params.get(index)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Lowercases, collapses whitespace and strips whitespace around punctuation.
pub(crate) fn normalize(sql: &str) -> String {
    let collapsed = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut out = String::with_capacity(collapsed.len());
    let mut chars = collapsed.chars().peekable();

    while let Some(c) = chars.next() {
        if c == ' ' {
            let next_is_punct = chars.peek().is_some_and(|n| is_tight(*n));
            let prev_is_punct = out.chars().last().is_some_and(is_tight);
            if next_is_punct || prev_is_punct {
                continue;
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

fn is_tight(c: char) -> bool {
    matches!(c, '=' | '(' | ')' | ',')
}

fn param_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn literal_after(normalized: &str, marker: &str) -> Option<i64> {
    let start = normalized.find(marker)? + marker.len();
    let digits: String = normalized[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
