//! CodebookManager: the scheme of one group, kept in step with the store
//!
//! Tree edits apply in memory first, under the scheme lock, then the store
//! writes they imply run in a spawned task. Write tasks run one after the
//! other in the order their edits were made. Nothing is rolled back when a
//! write fails: the returned [`PendingSync`] is how a caller finds out, and
//! the next refresh reconciles the tree with what the store holds.

use super::{CodebookError, CodebookResult};
use crate::annotation::{CodeRecord, LinkRecord, CODEBOOK_TAG, LINKING_TAG};
use crate::context::AppContext;
use crate::scheme::{ClassificationScheme, Code, CodeId, LinkChange, MoveOutcome, Palette, Removal};
use crate::schedule::{spawn_periodic, CancellationToken};
use crate::store::{AnnotationFilter, AnnotationStore, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of the store writes behind one edit
#[derive(Debug, Default)]
pub struct SyncReport {
    /// Ids of the records written or deleted
    pub written: Vec<String>,
    pub errors: Vec<StoreError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    fn record(&mut self, id: String, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.written.push(id),
            Err(e) => {
                warn!(record = %id, error = %e, "store write failed; local scheme kept");
                self.errors.push(e);
            }
        }
    }
}

/// Store writes an edit still owes.
///
/// Dropping the handle does not cancel the writes.
#[derive(Debug)]
pub struct PendingSync {
    task: Option<JoinHandle<SyncReport>>,
}

impl PendingSync {
    /// Nothing to write
    pub fn ready() -> Self {
        Self { task: None }
    }

    fn spawned(task: JoinHandle<SyncReport>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the writes. Fails if any of them failed.
    pub async fn wait(self) -> CodebookResult<SyncReport> {
        let Some(task) = self.task else {
            return Ok(SyncReport::default());
        };
        let mut report = task.await?;
        if report.errors.is_empty() {
            return Ok(report);
        }
        let failed = report.errors.len();
        Err(CodebookError::Sync {
            failed,
            first: report.errors.remove(0),
        })
    }
}

/// A write task's place in line: wait for `previous`, then fire `done`
struct WriteTurn {
    previous: Option<oneshot::Receiver<()>>,
    done: oneshot::Sender<()>,
}

impl WriteTurn {
    async fn wait(&mut self) {
        if let Some(previous) = self.previous.take() {
            // a dropped sender means the earlier task ended; either way it is our turn
            let _ = previous.await;
        }
    }

    fn finish(self) {
        let _ = self.done.send(());
    }
}

pub struct CodebookManager {
    scheme: Arc<Mutex<ClassificationScheme>>,
    /// Completion signal of the most recently queued write task
    last_write: Mutex<Option<oneshot::Receiver<()>>>,
    store: Arc<dyn AnnotationStore>,
    palette: Arc<dyn Palette>,
    context: AppContext,
}

impl CodebookManager {
    /// A manager with an empty scheme; call [`Self::load`] to fill it
    pub fn new(context: &AppContext) -> Self {
        Self {
            scheme: Arc::new(Mutex::new(context.empty_scheme())),
            last_write: Mutex::new(None),
            store: Arc::clone(&context.store),
            palette: Arc::clone(&context.palette),
            context: context.clone(),
        }
    }

    /// Queue behind every write task spawned so far.
    ///
    /// Callers take their turn while still holding the scheme lock, so the
    /// queue order is the edit order.
    async fn next_turn(&self) -> WriteTurn {
        let (done, rx) = oneshot::channel();
        let previous = self.last_write.lock().await.replace(rx);
        WriteTurn { previous, done }
    }

    /// Lock the scheme for reading or direct edits
    pub async fn scheme(&self) -> MutexGuard<'_, ClassificationScheme> {
        self.scheme.lock().await
    }

    pub async fn snapshot(&self) -> ClassificationScheme {
        self.scheme.lock().await.clone()
    }

    /// Rebuild the scheme from the group's codebook and linking records
    pub async fn load(&self) -> CodebookResult<()> {
        let group = &self.context.group;
        let codes = self
            .store
            .search(&AnnotationFilter::new().with_tag(CODEBOOK_TAG).with_group(group.clone()))
            .await?;
        let links = self
            .store
            .search(&AnnotationFilter::new().with_tag(LINKING_TAG).with_group(group.clone()))
            .await?;

        let scheme = ClassificationScheme::from_records(
            &codes,
            &links,
            Arc::clone(&self.palette),
            self.context.config.color_settings(),
        )
        .with_name(group.clone());

        if !scheme.dangling_links().is_empty() {
            warn!(
                group = %group,
                links = ?scheme.dangling_links(),
                "linking records could not be placed in the tree"
            );
        }
        info!(group = %group, codes = scheme.len(), "codebook loaded");

        *self.scheme.lock().await = scheme;
        Ok(())
    }

    /// Reload the codebook every `period` until `token` is cancelled
    pub fn spawn_refresh(
        self: &Arc<Self>,
        period: Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        spawn_periodic(period, token, move || {
            let manager = Arc::clone(&manager);
            async move {
                if let Err(e) = manager.load().await {
                    warn!(error = %e, "codebook refresh failed");
                }
            }
        })
    }

    /// Create a code, under `parent` or at the root.
    ///
    /// The store assigns the id, so the writes are awaited here.
    pub async fn create_code(
        &self,
        name: &str,
        description: &str,
        multivalued: bool,
        parent: Option<&CodeId>,
    ) -> CodebookResult<Code> {
        if let Some(parent) = parent {
            if !self.scheme.lock().await.contains(parent) {
                return Err(CodebookError::UnknownCode(parent.clone()));
            }
        }

        let mut record = CodeRecord::new(name);
        record.description = description.to_string();
        record.multivalued = multivalued;
        record.creator = self.context.user.clone();
        let created = self
            .store
            .create(record.to_annotation(&self.context.group))
            .await?;
        record.id = CodeId::from_string(created.id);

        let id = record.id.clone();
        let parent = {
            let mut scheme = self.scheme.lock().await;
            // the parent may have been removed while the record was written
            let parent = parent.filter(|p| scheme.contains(p)).cloned();
            scheme.insert_code(Code::from_record(&record), parent.as_ref());
            parent
        };

        if let Some(parent) = parent {
            let link = LinkRecord::new(parent, id.clone());
            let created = self
                .store
                .create(link.to_annotation(&self.context.group, &self.context.user))
                .await?;
            self.scheme.lock().await.set_parent_link(&id, created.id);
        }

        info!(code = %id, name, "code created");
        self.scheme
            .lock()
            .await
            .get(&id)
            .cloned()
            .ok_or(CodebookError::UnknownCode(id))
    }

    /// Edit a code's name, description and multivalued flag
    pub async fn update_code(
        &self,
        id: &CodeId,
        name: &str,
        description: &str,
        multivalued: bool,
    ) -> CodebookResult<PendingSync> {
        let (record, mut turn) = {
            let mut scheme = self.scheme.lock().await;
            if !scheme.rename_code(id, name) {
                return Err(CodebookError::UnknownCode(id.clone()));
            }
            scheme.update_code(id, description, multivalued);
            let Some(record) = scheme.get(id).map(Code::to_record) else {
                return Err(CodebookError::UnknownCode(id.clone()));
            };
            (record, self.next_turn().await)
        };

        let store = Arc::clone(&self.store);
        let group = self.context.group.clone();
        Ok(PendingSync::spawned(tokio::spawn(async move {
            turn.wait().await;
            let mut report = SyncReport::default();
            let id = record.id.to_string();
            let result = store.update(&id, record.to_annotation(&group)).await;
            report.record(id, result.map(|_| ()));
            turn.finish();
            report
        })))
    }

    /// Move `code` under `new_parent`, or to the root.
    ///
    /// The move is applied in memory before anything is written. Rejected
    /// moves write nothing.
    pub async fn change_parent(
        &self,
        code: &CodeId,
        new_parent: Option<&CodeId>,
    ) -> (MoveOutcome, PendingSync) {
        let mut guard = self.scheme.lock().await;
        let outcome = guard.change_parent(code, new_parent);
        let change = match &outcome {
            MoveOutcome::Moved(mv) => mv.link_change.clone(),
            MoveOutcome::Rejected(_) => None,
        };
        let Some(change) = change else {
            return (outcome, PendingSync::ready());
        };
        let mut turn = self.next_turn().await;
        drop(guard);

        let store = Arc::clone(&self.store);
        let scheme = Arc::clone(&self.scheme);
        let group = self.context.group.clone();
        let user = self.context.user.clone();
        let child = code.clone();

        let task = tokio::spawn(async move {
            turn.wait().await;
            let mut report = SyncReport::default();
            match change {
                LinkChange::Delete { link_id } => {
                    let result = store.delete(&link_id).await;
                    report.record(link_id, result.map(|_| ()));
                }
                LinkChange::Update { link_id, parent } => {
                    let mut link = LinkRecord::new(parent, child);
                    link.id = link_id.clone();
                    let result = store.update(&link_id, link.to_annotation(&group, &user)).await;
                    report.record(link_id, result.map(|_| ()));
                }
                LinkChange::Create { parent } => {
                    let link = LinkRecord::new(parent.clone(), child.clone());
                    match store.create(link.to_annotation(&group, &user)).await {
                        Ok(created) => {
                            // kept only while the code is still under `parent` and unlinked
                            let adopted = {
                                let mut scheme = scheme.lock().await;
                                let wanted = scheme.get(&child).is_some_and(|c| {
                                    c.parent_code() == Some(&parent)
                                        && c.parent_link_annotation_id.is_none()
                                });
                                if wanted {
                                    scheme.set_parent_link(&child, created.id.clone());
                                }
                                wanted
                            };
                            if adopted {
                                report.written.push(created.id);
                            } else {
                                debug!(
                                    code = %child,
                                    link = %created.id,
                                    "code moved before its link was stored"
                                );
                                let result = store.delete(&created.id).await;
                                report.record(created.id, result.map(|_| ()));
                            }
                        }
                        Err(e) => report.record(format!("link:{}", child), Err(e)),
                    }
                }
            }
            turn.finish();
            report
        });
        (outcome, PendingSync::spawned(task))
    }

    /// Delete a code and the records behind it.
    ///
    /// `None` when the code is unknown; nothing is written then.
    pub async fn remove_code(
        &self,
        code: &CodeId,
        recursive: bool,
    ) -> Option<(Removal, PendingSync)> {
        let (removal, mut turn) = {
            let mut scheme = self.scheme.lock().await;
            let removal = scheme.remove_code(code, recursive)?;
            (removal, self.next_turn().await)
        };
        info!(
            code = %code,
            removed = removal.removed.len(),
            promoted = removal.promoted.len(),
            "code removed"
        );

        let store = Arc::clone(&self.store);
        let record_ids = removal.record_ids.clone();
        let task = tokio::spawn(async move {
            turn.wait().await;
            let mut report = SyncReport::default();
            for id in record_ids {
                let result = store.delete(&id).await;
                report.record(id, result.map(|_| ()));
            }
            turn.finish();
            report
        });
        Some((removal, PendingSync::spawned(task)))
    }
}
