//! Annotation store trait definitions

use crate::annotation::{Annotation, Motivation};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while talking to an annotation store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Annotation not found: {0}")]
    NotFound(String),

    #[error("Annotation already exists: {0}")]
    Duplicate(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Date parsing error: {0}")]
    DateParse(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Search criteria. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnnotationFilter {
    /// Record must carry this tag
    pub tag: Option<String>,
    pub group: Option<String>,
    /// Document the annotation targets
    pub uri: Option<String>,
    pub motivation: Option<Motivation>,
    pub user: Option<String>,
    /// Maximum number of results
    pub limit: Option<usize>,
}

impl AnnotationFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    pub fn with_motivation(mut self, motivation: Motivation) -> Self {
        self.motivation = Some(motivation);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check a record against every set criterion
    pub fn matches(&self, annotation: &Annotation) -> bool {
        self.tag.as_ref().map_or(true, |t| annotation.has_tag(t))
            && self.group.as_ref().map_or(true, |g| &annotation.group == g)
            && self.uri.as_ref().map_or(true, |u| &annotation.uri == u)
            && self.motivation.as_ref().map_or(true, |m| &annotation.motivation == m)
            && self.user.as_ref().map_or(true, |u| &annotation.user == u)
    }
}

/// The annotation store the codebook is persisted in.
///
/// Implementations must be thread-safe (Send + Sync); managers share one
/// store across background tasks.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Records matching the filter, oldest first
    async fn search(&self, filter: &AnnotationFilter) -> StoreResult<Vec<Annotation>>;

    /// Persist a new record. An empty id is replaced by a store-assigned one.
    async fn create(&self, annotation: Annotation) -> StoreResult<Annotation>;

    /// Replace the record with the given id
    async fn update(&self, id: &str, annotation: Annotation) -> StoreResult<Annotation>;

    /// Delete a record; `false` if it did not exist
    async fn delete(&self, id: &str) -> StoreResult<bool>;
}

/// Stores that can be opened from a path.
///
/// Separated from `AnnotationStore` so the trait stays object-safe.
pub trait OpenStore: AnnotationStore + Sized {
    /// Open or create a store at the given path
    fn open(path: impl AsRef<Path>) -> StoreResult<Self>;

    /// Create an in-memory store (useful for testing)
    fn open_in_memory() -> StoreResult<Self>;
}
