//! Records held by the mock store and the seed/override data model.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use historias_db_core::FacadeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::Row;

/// Number of placeholder stories in the built-in seed.
pub const DEFAULT_STORY_COUNT: i64 = 21;

const PLACEHOLDER_CONTENT: &str = "Este es el contenido de una historia generada automáticamente.";

/// A placeholder story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    /// Story identifier.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Body text.
    pub content: String,
}

impl Story {
    fn placeholder(id: i64) -> Self {
        Self {
            id,
            title: format!("Historia Mock #{}", id),
            content: PLACEHOLDER_CONTENT.to_string(),
        }
    }
}

/// A comment on a story.
///
/// Serialized with the column names of the `comentarios` table so that mock
/// rows look exactly like live rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Comment identifier.
    pub id: i64,
    /// Story the comment belongs to.
    #[serde(rename = "historia_id")]
    pub story_id: i64,
    /// Display name of the author.
    #[serde(rename = "autor")]
    pub author: String,
    /// Comment body.
    #[serde(rename = "contenido")]
    pub content: String,
    /// Creation time.
    #[serde(rename = "fecha")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Renders the comment as a `comentarios` row.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".to_string(), Value::from(self.id));
        row.insert("historia_id".to_string(), Value::from(self.story_id));
        row.insert("autor".to_string(), Value::from(self.author.clone()));
        row.insert("contenido".to_string(), Value::from(self.content.clone()));
        row.insert(
            "fecha".to_string(),
            Value::from(self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        row
    }
}

/// The full contents of a mock store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MockData {
    /// Placeholder stories.
    pub stories: Vec<Story>,
    /// All comments, in insertion order.
    pub comments: Vec<Comment>,
    /// Like count per story id. Only stories that were ever liked (or
    /// seeded with a count) appear.
    pub likes: BTreeMap<i64, u64>,
}

impl MockData {
    /// The built-in seed: 21 placeholder stories, no comments, no likes.
    pub fn builtin() -> Self {
        Self {
            stories: (1..=DEFAULT_STORY_COUNT).map(Story::placeholder).collect(),
            comments: Vec::new(),
            likes: BTreeMap::new(),
        }
    }

    /// Returns a copy with the override's keys replacing this data's keys.
    pub fn merged(mut self, overrides: &MockDataOverride) -> Self {
        if let Some(stories) = &overrides.stories {
            self.stories = stories.clone();
        }
        if let Some(comments) = &overrides.comments {
            self.comments = comments.clone();
        }
        if let Some(likes) = &overrides.likes {
            self.likes = likes.clone();
        }
        self
    }
}

impl Default for MockData {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Caller-supplied data merged over the built-in seed.
///
/// Each present key replaces the corresponding collection wholesale.
///
/// ```rust
/// use historias_db_mock::MockDataOverride;
///
/// let overrides = MockDataOverride::from_json_str(r#"{"likes": {"7": 12}}"#).unwrap();
/// assert_eq!(overrides.likes.unwrap()[&7], 12);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MockDataOverride {
    /// Replacement stories.
    #[serde(default)]
    pub stories: Option<Vec<Story>>,
    /// Replacement comments.
    #[serde(default)]
    pub comments: Option<Vec<Comment>>,
    /// Replacement like counts.
    #[serde(default)]
    pub likes: Option<BTreeMap<i64, u64>>,
}

impl MockDataOverride {
    /// Parses an override from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, FacadeError> {
        serde_json::from_str(json)
            .map_err(|e| FacadeError::configuration(format!("invalid mock data override: {}", e)))
    }

    /// Sets the replacement stories.
    pub fn with_stories(mut self, stories: Vec<Story>) -> Self {
        self.stories = Some(stories);
        self
    }

    /// Sets the replacement comments.
    pub fn with_comments(mut self, comments: Vec<Comment>) -> Self {
        self.comments = Some(comments);
        self
    }

    /// Sets the replacement like counts.
    pub fn with_likes(mut self, likes: BTreeMap<i64, u64>) -> Self {
        self.likes = Some(likes);
        self
    }
}
