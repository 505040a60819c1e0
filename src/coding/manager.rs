//! Fetches codings from the annotation store

use super::aggregate::{aggregate, Codings};
use super::consensus::{consensus, Consensus};
use crate::annotation::{
    Agreement, Annotation, Assessment, Motivation, Selector, Target, CLASSIFYING_TAG,
};
use crate::context::AppContext;
use crate::scheme::{ClassificationScheme, CodeId};
use crate::store::{AnnotationFilter, AnnotationStore, StoreResult};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info};

/// Reads and writes the classifying/assessing annotations of one group
pub struct CodingManager {
    store: Arc<dyn AnnotationStore>,
    user: String,
    group: String,
}

impl CodingManager {
    pub fn new(context: &AppContext) -> Self {
        Self {
            store: Arc::clone(&context.store),
            user: context.user.clone(),
            group: context.group.clone(),
        }
    }

    /// Classifying and assessing annotations of the group, optionally for one document
    pub async fn fetch(&self, uri: Option<&str>) -> StoreResult<Vec<Annotation>> {
        let mut annotations = Vec::new();
        for motivation in [Motivation::Classifying, Motivation::Assessing] {
            let mut filter = AnnotationFilter::new()
                .with_group(self.group.clone())
                .with_motivation(motivation);
            if let Some(uri) = uri {
                filter = filter.with_uri(uri);
            }
            annotations.extend(self.store.search(&filter).await?);
        }
        debug!(count = annotations.len(), uri = ?uri, "fetched codings");
        Ok(annotations)
    }

    pub async fn codings(
        &self,
        scheme: &ClassificationScheme,
        uri: Option<&str>,
    ) -> StoreResult<Codings> {
        let annotations = self.fetch(uri).await?;
        Ok(aggregate(&annotations, scheme, &self.user))
    }

    pub async fn consensus(
        &self,
        scheme: &ClassificationScheme,
        uri: Option<&str>,
    ) -> StoreResult<Consensus> {
        let annotations = self.fetch(uri).await?;
        Ok(consensus(&annotations, scheme))
    }

    /// Apply `code` to the span described by `selectors`
    pub async fn classify(
        &self,
        uri: &str,
        code: &CodeId,
        selectors: Vec<Selector>,
    ) -> StoreResult<Annotation> {
        let annotation = Annotation::new(Motivation::Classifying)
            .with_user(self.user.clone())
            .with_group(self.group.clone())
            .with_uri(uri)
            .with_tag(CLASSIFYING_TAG)
            .with_body(Value::String(code.to_string()))
            .with_target(Target::new(selectors).with_source(uri));
        let created = self.store.create(annotation).await?;
        info!(annotation = %created.id, code = %code, uri, "classified");
        Ok(created)
    }

    /// Record a verdict on someone's classifying annotation
    pub async fn assess(
        &self,
        classifying: &Annotation,
        agreement: Agreement,
        comment: Option<String>,
    ) -> StoreResult<Annotation> {
        let mut assessment = Assessment::new(classifying.id.clone(), agreement);
        assessment.user = self.user.clone();
        assessment.comment = comment;
        let created = self
            .store
            .create(assessment.to_annotation(classifying))
            .await?;
        info!(annotation = %created.id, classifying = %classifying.id, ?agreement, "assessed");
        Ok(created)
    }
}
