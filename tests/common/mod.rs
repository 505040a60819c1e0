//! Shared fixtures for the integration tests
//!
//! Builds codebooks as the annotation store would hold them and provides a
//! store whose writes can be made to fail.

#![allow(dead_code)]

use async_trait::async_trait;
use codebook::annotation::{CodeRecord, LinkRecord};
use codebook::{
    Annotation, AnnotationFilter, AnnotationStore, AppContext, CodeId, Config, MemoryStore,
    StoreError, StoreResult,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub const GROUP: &str = "review-group";

pub fn code_record(id: &str, name: &str) -> Annotation {
    let mut record = CodeRecord::new(name);
    record.id = CodeId::from(id);
    record.creator = "alice".into();
    record.to_annotation(GROUP)
}

pub fn multivalued_code_record(id: &str, name: &str) -> Annotation {
    let mut record = CodeRecord::new(name);
    record.id = CodeId::from(id);
    record.multivalued = true;
    record.to_annotation(GROUP)
}

pub fn link_record(id: &str, parent: &str, child: &str) -> Annotation {
    let mut link = LinkRecord::new(CodeId::from(parent), CodeId::from(child));
    link.id = id.into();
    link.to_annotation(GROUP, "alice")
}

/// Method ─┬─ Qualitative ── Interviews
///         └─ Quantitative
/// Population
pub fn review_records() -> Vec<Annotation> {
    vec![
        code_record("1", "Method"),
        code_record("2", "Qualitative"),
        code_record("3", "Quantitative"),
        code_record("4", "Interviews"),
        code_record("5", "Population"),
        link_record("l2", "1", "2"),
        link_record("l3", "1", "3"),
        link_record("l4", "2", "4"),
    ]
}

pub fn context(store: Arc<dyn AnnotationStore>) -> AppContext {
    AppContext::new(Config::default(), store)
        .with_user("alice")
        .with_group(GROUP)
}

pub fn id(s: &str) -> CodeId {
    CodeId::from(s)
}

/// A memory store whose writes fail while `offline` is set
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    offline: AtomicBool,
}

impl FlakyStore {
    pub fn with_records(records: Vec<Annotation>) -> Self {
        Self {
            inner: MemoryStore::with_records(records),
            offline: AtomicBool::new(false),
        }
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl AnnotationStore for FlakyStore {
    async fn search(&self, filter: &AnnotationFilter) -> StoreResult<Vec<Annotation>> {
        self.inner.search(filter).await
    }

    async fn create(&self, annotation: Annotation) -> StoreResult<Annotation> {
        self.check()?;
        self.inner.create(annotation).await
    }

    async fn update(&self, id: &str, annotation: Annotation) -> StoreResult<Annotation> {
        self.check()?;
        self.inner.update(id, annotation).await
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(id).await
    }
}
