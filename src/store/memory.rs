//! In-memory annotation store

use super::traits::{AnnotationFilter, AnnotationStore, StoreError, StoreResult};
use crate::annotation::Annotation;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;
use uuid::Uuid;

/// Annotation store backed by a concurrent map.
///
/// Records keep their insertion sequence so searches return them oldest
/// first, the same order the remote store uses.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, (u64, Annotation)>,
    next_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing records, keeping their ids
    pub fn with_records(records: impl IntoIterator<Item = Annotation>) -> Self {
        let store = Self::new();
        for record in records {
            if let Err(e) = store.insert(record) {
                debug!(error = %e, "skipping seed record");
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<Annotation> {
        self.records.get(id).map(|r| r.value().1.clone())
    }

    fn insert(&self, mut annotation: Annotation) -> StoreResult<Annotation> {
        if annotation.id.is_empty() {
            annotation.id = Uuid::new_v4().simple().to_string();
        }
        match self.records.entry(annotation.id.clone()) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(annotation.id)),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                annotation.created.get_or_insert(now);
                annotation.updated = Some(now);
                let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
                slot.insert((seq, annotation.clone()));
                Ok(annotation)
            }
        }
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn search(&self, filter: &AnnotationFilter) -> StoreResult<Vec<Annotation>> {
        let mut hits: Vec<(u64, Annotation)> = self
            .records
            .iter()
            .filter(|r| filter.matches(&r.value().1))
            .map(|r| r.value().clone())
            .collect();
        hits.sort_by_key(|(seq, _)| *seq);
        let limit = filter.limit.unwrap_or(usize::MAX);
        Ok(hits.into_iter().take(limit).map(|(_, a)| a).collect())
    }

    async fn create(&self, annotation: Annotation) -> StoreResult<Annotation> {
        self.insert(annotation)
    }

    async fn update(&self, id: &str, mut annotation: Annotation) -> StoreResult<Annotation> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        annotation.id = id.to_string();
        annotation.created = entry.1.created;
        annotation.updated = Some(Utc::now());
        entry.1 = annotation.clone();
        Ok(annotation)
    }

    async fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.records.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Motivation;

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = MemoryStore::new();
        let created = store
            .create(Annotation::new(Motivation::Commenting).with_text("hi"))
            .await
            .unwrap();
        assert!(!created.id.is_empty());
        assert!(created.created.is_some());
        assert_eq!(store.get(&created.id).unwrap().text, "hi");
    }

    #[tokio::test]
    async fn search_filters_and_keeps_insertion_order() {
        let store = MemoryStore::new();
        for (id, tag) in [("a", "x"), ("b", "y"), ("c", "x")] {
            store
                .create(
                    Annotation::new(Motivation::Other)
                        .with_id(id)
                        .with_tag(tag)
                        .with_group("g"),
                )
                .await
                .unwrap();
        }
        let hits = store
            .search(&AnnotationFilter::new().with_tag("x").with_group("g"))
            .await
            .unwrap();
        let ids: Vec<&str> = hits.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let limited = store.search(&AnnotationFilter::new().with_limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].id, "a");
    }

    #[tokio::test]
    async fn update_unknown_id_fails() {
        let store = MemoryStore::new();
        let err = store
            .update("missing", Annotation::new(Motivation::Other))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "missing"));
    }

    #[tokio::test]
    async fn update_keeps_id_and_creation_time() {
        let store = MemoryStore::new();
        let created = store
            .create(Annotation::new(Motivation::Other).with_id("a").with_text("old"))
            .await
            .unwrap();
        let updated = store
            .update("a", Annotation::new(Motivation::Other).with_text("new"))
            .await
            .unwrap();
        assert_eq!(updated.id, "a");
        assert_eq!(updated.created, created.created);
        assert_eq!(store.get("a").unwrap().text, "new");
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let store = MemoryStore::with_records([Annotation::new(Motivation::Other).with_id("a")]);
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn create_refuses_a_taken_id() {
        let store = MemoryStore::new();
        store
            .create(Annotation::new(Motivation::Other).with_id("a").with_text("first"))
            .await
            .unwrap();
        let err = store
            .create(Annotation::new(Motivation::Other).with_id("a").with_text("second"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(id) if id == "a"));
        assert_eq!(store.get("a").unwrap().text, "first");
        assert_eq!(store.len(), 1);
    }
}
