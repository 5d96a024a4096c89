//! The mock store.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use historias_db_core::FacadeError;
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde_json::Value;

use crate::record::{Comment, MockData, MockDataOverride, Story};
use crate::result::{likes_row, QueryResult};
use crate::rules::{find_rule, normalize, QueryContext, RuleKind};

const DEFAULT_AUTHOR: &str = "Usuario simulado";
const DEFAULT_CONTENT: &str = "Comentario simulado";

/// Per-story mutable state. Each bucket has its own lock so like increments
/// and comment appends on one story never race.
#[derive(Debug, Default)]
struct StoryBucket {
    /// `None` until the story is liked or seeded with a count.
    likes: Option<u64>,
    /// Comments tagged with a store-wide sequence number.
    comments: Vec<(u64, Comment)>,
}

/// Volatile in-process substitute for the stories database.
///
/// All methods take `&self`; the store is meant to be shared behind an `Arc`.
pub struct MockStore {
    seed: MockData,
    stories: RwLock<Vec<Story>>,
    buckets: RwLock<HashMap<i64, Arc<Mutex<StoryBucket>>>>,
    comment_ids: Mutex<HashSet<i64>>,
    sequence: AtomicU64,
}

impl MockStore {
    /// Creates a store seeded with the built-in defaults.
    pub fn new() -> Self {
        Self::seed(MockData::builtin())
    }

    /// Creates a store whose seed is the built-in defaults merged with `overrides`.
    pub fn with_override(overrides: &MockDataOverride) -> Self {
        Self::seed(MockData::builtin().merged(overrides))
    }

    /// Creates a store seeded with exactly `initial`. [`reset`](Self::reset)
    /// restores this state.
    pub fn seed(initial: MockData) -> Self {
        let store = Self {
            seed: initial.clone(),
            stories: RwLock::new(Vec::new()),
            buckets: RwLock::new(HashMap::new()),
            comment_ids: Mutex::new(HashSet::new()),
            sequence: AtomicU64::new(0),
        };
        store.load(initial);
        store
    }

    /// Restores the seeded state, discarding every emulated write.
    pub fn reset(&self) {
        self.load(self.seed.clone());
    }

    /// Merges `overrides` over the current contents. The seed is unchanged.
    pub fn merge(&self, overrides: &MockDataOverride) {
        let data = self.snapshot().merged(overrides);
        self.load(data);
    }

    /// Returns a copy of the current contents. Comments are in insertion order.
    pub fn snapshot(&self) -> MockData {
        let stories = self.stories.read().clone();
        let mut likes = BTreeMap::new();
        let mut comments = Vec::new();

        for (id, bucket) in self.buckets.read().iter() {
            let bucket = bucket.lock();
            if let Some(count) = bucket.likes {
                likes.insert(*id, count);
            }
            comments.extend(bucket.comments.iter().cloned());
        }
        comments.sort_by_key(|(seq, _)| *seq);

        MockData {
            stories,
            comments: comments.into_iter().map(|(_, c)| c).collect(),
            likes,
        }
    }

    /// Returns the seeded state.
    pub fn seed_data(&self) -> &MockData {
        &self.seed
    }

    /// Returns the placeholder stories.
    pub fn stories(&self) -> Vec<Story> {
        self.stories.read().clone()
    }

    /// Returns the like count for a story (0 if never liked).
    pub fn likes(&self, story_id: i64) -> u64 {
        match self.existing_bucket(story_id) {
            Some(bucket) => {
                let bucket = bucket.lock();
                bucket.likes.unwrap_or(0)
            }
            None => 0,
        }
    }

    /// Returns the comments for a story in insertion order.
    pub fn comments_for(&self, story_id: i64) -> Vec<Comment> {
        match self.existing_bucket(story_id) {
            Some(bucket) => {
                let bucket = bucket.lock();
                bucket.comments.iter().map(|(_, c)| c.clone()).collect()
            }
            None => Vec::new(),
        }
    }

    /// Emulates a query. Unrecognized statements yield an empty result.
    pub fn emulate(&self, sql: &str, params: &[Value]) -> QueryResult {
        match self.try_emulate(sql, params) {
            Ok(result) => result,
            Err(miss) => {
                tracing::debug!(error = %miss, "emulation miss, returning empty result");
                QueryResult::empty()
            }
        }
    }

    /// Emulates a query, reporting an [`FacadeError::EmulationMiss`] when no
    /// rule matches or the story id cannot be resolved.
    pub fn try_emulate(&self, sql: &str, params: &[Value]) -> Result<QueryResult, FacadeError> {
        let normalized = normalize(sql);
        let rule = find_rule(&normalized).ok_or_else(|| FacadeError::emulation_miss(sql))?;
        let ctx = QueryContext {
            raw: sql,
            normalized: &normalized,
            params,
        };
        (rule.handler)(self, &ctx)
    }

    /// Returns which rule would handle `sql`, if any.
    pub fn classify(sql: &str) -> Option<RuleKind> {
        find_rule(&normalize(sql)).map(|rule| rule.kind)
    }

    pub(crate) fn handle_select_likes(
        &self,
        ctx: &QueryContext<'_>,
    ) -> Result<QueryResult, FacadeError> {
        let id = ctx.story_id()?;
        Ok(QueryResult::single(likes_row(self.likes(id))))
    }

    pub(crate) fn handle_select_comments(
        &self,
        ctx: &QueryContext<'_>,
    ) -> Result<QueryResult, FacadeError> {
        let id = ctx.story_id()?;
        let rows = self
            .comments_for(id)
            .iter()
            .map(Comment::to_row)
            .collect();
        Ok(QueryResult::from_rows(rows))
    }

    pub(crate) fn handle_insert_like(
        &self,
        ctx: &QueryContext<'_>,
    ) -> Result<QueryResult, FacadeError> {
        let id = ctx.story_id()?;
        let bucket = self.bucket(id);
        let mut bucket = bucket.lock();
        let likes = bucket.likes.unwrap_or(0).saturating_add(1);
        bucket.likes = Some(likes);
        Ok(QueryResult::single(likes_row(likes)))
    }

    pub(crate) fn handle_insert_comment(
        &self,
        ctx: &QueryContext<'_>,
    ) -> Result<QueryResult, FacadeError> {
        let story_id = ctx.story_id()?;
        let comment = Comment {
            id: self.fresh_comment_id(),
            story_id,
            author: ctx
                .text_param(1)
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            content: ctx
                .text_param(2)
                .unwrap_or_else(|| DEFAULT_CONTENT.to_string()),
            created_at: Utc::now(),
        };
        let row = comment.to_row();

        let bucket = self.bucket(story_id);
        let mut bucket = bucket.lock();
        let seq = self.sequence.fetch_add(1, Ordering::AcqRel);
        bucket.comments.push((seq, comment));

        Ok(QueryResult::single(row))
    }

    fn load(&self, data: MockData) {
        let mut buckets: HashMap<i64, Arc<Mutex<StoryBucket>>> = HashMap::new();
        let mut ids = HashSet::new();
        let mut seq = 0;

        for (id, count) in data.likes {
            buckets.entry(id).or_default().lock().likes = Some(count);
        }
        for comment in data.comments {
            ids.insert(comment.id);
            buckets
                .entry(comment.story_id)
                .or_default()
                .lock()
                .comments
                .push((seq, comment));
            seq += 1;
        }

        *self.stories.write() = data.stories;
        *self.buckets.write() = buckets;
        *self.comment_ids.lock() = ids;
        self.sequence.store(seq, Ordering::Release);
    }

    fn existing_bucket(&self, story_id: i64) -> Option<Arc<Mutex<StoryBucket>>> {
        self.buckets.read().get(&story_id).cloned()
    }

    fn bucket(&self, story_id: i64) -> Arc<Mutex<StoryBucket>> {
        if let Some(bucket) = self.existing_bucket(story_id) {
            return bucket;
        }
        Arc::clone(self.buckets.write().entry(story_id).or_default())
    }

    fn fresh_comment_id(&self) -> i64 {
        let mut ids = self.comment_ids.lock();
        let mut rng = rand::rng();
        loop {
            let candidate = rng.random_range(1..=i64::from(i32::MAX));
            if ids.insert(candidate) {
                return candidate;
            }
        }
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockStore")
            .field("stories", &self.stories.read().len())
            .field("buckets", &self.buckets.read().len())
            .field("sequence", &self.sequence.load(Ordering::Acquire))
            .finish()
    }
}
