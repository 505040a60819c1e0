//! Periodic re-anchoring of highlights that have not matched yet
//!
//! Content can arrive late (lazy loading, PDF pages rendering one by one),
//! so unmatched highlights are retried against each new document snapshot
//! until they anchor or the owner shuts the reconciler down.

use super::document::Document;
use super::{resolve, TextRange};
use crate::annotation::Annotation;
use crate::schedule::{spawn_periodic, CancellationToken};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// A highlight that found its place in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchoredHighlight {
    pub annotation_id: String,
    pub range: TextRange,
    pub text: String,
}

/// Highlights waiting to be anchored
#[derive(Debug, Default)]
pub struct HighlightReconciler {
    pending: Vec<Annotation>,
}

impl HighlightReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pending(annotations: impl IntoIterator<Item = Annotation>) -> Self {
        let mut reconciler = Self::new();
        for annotation in annotations {
            reconciler.add(annotation);
        }
        reconciler
    }

    /// Queue a highlight. Annotations without selectors never anchor and are ignored.
    pub fn add(&mut self, annotation: Annotation) {
        if annotation.selectors().is_empty() {
            debug!(annotation = %annotation.id, "annotation has no selectors; not queued");
            return;
        }
        self.pending.push(annotation);
    }

    pub fn pending(&self) -> &[Annotation] {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Anchor whatever can be anchored against `document`; the rest stays queued.
    pub fn reconcile_once(&mut self, document: &Document) -> Vec<AnchoredHighlight> {
        let mut anchored = Vec::new();
        self.pending.retain(|annotation| {
            match resolve(document, annotation.selectors()) {
                Ok(range) => {
                    anchored.push(AnchoredHighlight {
                        annotation_id: annotation.id.clone(),
                        range,
                        text: document.slice(range).unwrap_or_default(),
                    });
                    false
                }
                Err(e) => {
                    trace!(annotation = %annotation.id, error = %e, "highlight still unanchored");
                    true
                }
            }
        });
        if !anchored.is_empty() {
            debug!(
                anchored = anchored.len(),
                pending = self.pending.len(),
                uri = document.uri(),
                "reconciled highlights"
            );
        }
        anchored
    }

    /// Retry every `period` against the latest snapshot from `documents`.
    ///
    /// Anchored highlights are sent on the returned channel. The loop runs
    /// until `token` is cancelled, even when nothing is pending, so
    /// highlights added later through the handle are picked up.
    pub fn spawn(
        self,
        documents: watch::Receiver<Arc<Document>>,
        period: Duration,
        token: CancellationToken,
    ) -> (ReconcilerHandle, mpsc::UnboundedReceiver<AnchoredHighlight>) {
        let state = Arc::new(Mutex::new(self));
        let (tx, rx) = mpsc::unbounded_channel();

        let task = {
            let state = Arc::clone(&state);
            spawn_periodic(period, token.clone(), move || {
                let state = Arc::clone(&state);
                let documents = documents.clone();
                let tx = tx.clone();
                async move {
                    let document = Arc::clone(&documents.borrow());
                    let anchored = state.lock().await.reconcile_once(&document);
                    for highlight in anchored {
                        if tx.send(highlight).is_err() {
                            break;
                        }
                    }
                }
            })
        };

        (ReconcilerHandle { state, token, task }, rx)
    }
}

/// Owner's side of a running reconciler
#[derive(Debug)]
pub struct ReconcilerHandle {
    state: Arc<Mutex<HighlightReconciler>>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ReconcilerHandle {
    pub async fn add(&self, annotation: Annotation) {
        self.state.lock().await.add(annotation);
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Stop the loop and return the highlights that never anchored
    pub async fn shutdown(self) -> Vec<Annotation> {
        self.token.cancel();
        if let Err(e) = self.task.await {
            debug!(error = %e, "reconciler task ended abnormally");
        }
        std::mem::take(&mut self.state.lock().await.pending)
    }
}
