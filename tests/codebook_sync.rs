//! Scheme edits and the store writes behind them

mod common;

use codebook::annotation::LinkRecord;
use codebook::scheme::{LinkChange, MoveRejection, ParentRef};
use codebook::{
    AnnotationFilter, AnnotationStore, CancellationToken, CodebookError, CodebookManager,
    MemoryStore, MoveOutcome,
};
use common::{code_record, context, id, link_record, review_records, FlakyStore};
use std::sync::Arc;
use std::time::Duration;

async fn loaded(store: Arc<dyn AnnotationStore>) -> CodebookManager {
    let manager = CodebookManager::new(&context(store));
    manager.load().await.unwrap();
    manager
}

#[tokio::test]
async fn moving_under_a_code_updates_its_link() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (outcome, pending) = manager.change_parent(&id("4"), Some(&id("3"))).await;
    match &outcome {
        MoveOutcome::Moved(mv) => {
            assert_eq!(mv.old_parent, ParentRef::Code(id("2")));
            assert_eq!(
                mv.link_change,
                Some(LinkChange::Update {
                    link_id: "l4".into(),
                    parent: id("3")
                })
            );
        }
        other => panic!("expected a move, got {:?}", other),
    }
    let report = pending.wait().await.unwrap();
    assert_eq!(report.written, vec!["l4"]);

    let link = LinkRecord::from_annotation(&store.get("l4").unwrap()).unwrap();
    assert_eq!(link.parent, id("3"));
    assert_eq!(link.child, id("4"));
}

#[tokio::test]
async fn moving_to_the_root_deletes_the_link() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (outcome, pending) = manager.change_parent(&id("2"), None).await;
    assert!(outcome.is_moved());
    pending.wait().await.unwrap();

    assert!(store.get("l2").is_none());
    let scheme = manager.scheme().await;
    let qualitative = scheme.get(&id("2")).unwrap();
    assert!(qualitative.is_top_level());
    assert!(qualitative.parent_link_annotation_id.is_none());
}

#[tokio::test]
async fn moving_a_top_level_code_creates_a_link_and_records_its_id() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (outcome, pending) = manager.change_parent(&id("5"), Some(&id("1"))).await;
    assert!(outcome.is_moved());
    let report = pending.wait().await.unwrap();
    assert_eq!(report.written.len(), 1);

    let link_id = manager
        .scheme()
        .await
        .get(&id("5"))
        .unwrap()
        .parent_link_annotation_id
        .clone()
        .unwrap();
    assert_eq!(link_id, report.written[0]);
    let link = LinkRecord::from_annotation(&store.get(&link_id).unwrap()).unwrap();
    assert_eq!((link.parent, link.child), (id("1"), id("5")));

    // the new link survives a reload
    manager.load().await.unwrap();
    assert_eq!(
        manager.scheme().await.get(&id("5")).unwrap().parent_code(),
        Some(&id("1"))
    );
}

#[tokio::test]
async fn rejected_moves_write_nothing() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;
    let before = store.len();

    let (outcome, pending) = manager.change_parent(&id("1"), Some(&id("4"))).await;
    assert_eq!(outcome, MoveOutcome::Rejected(MoveRejection::Cycle));
    assert!(pending.is_finished());
    assert!(pending.wait().await.unwrap().written.is_empty());

    let (outcome, _) = manager.change_parent(&id("2"), Some(&id("1"))).await;
    assert_eq!(outcome, MoveOutcome::Rejected(MoveRejection::AlreadyParent));
    assert_eq!(store.len(), before);
}

#[tokio::test]
async fn removal_deletes_code_and_child_links() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (removal, pending) = manager.remove_code(&id("1"), false).await.unwrap();
    assert_eq!(removal.promoted, vec![id("2"), id("3")]);
    pending.wait().await.unwrap();

    for gone in ["1", "l2", "l3"] {
        assert!(store.get(gone).is_none(), "{} should be deleted", gone);
    }
    assert!(store.get("l4").is_some());

    manager.load().await.unwrap();
    let scheme = manager.scheme().await;
    let mut tops: Vec<&str> = scheme.top_level_codes().map(|c| c.name()).collect();
    tops.sort();
    assert_eq!(tops, vec!["Population", "Qualitative", "Quantitative"]);
}

#[tokio::test]
async fn removing_an_unknown_code_is_a_no_op() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;
    assert!(manager.remove_code(&id("nope"), true).await.is_none());
    assert_eq!(store.len(), review_records().len());
}

#[tokio::test]
async fn failed_writes_surface_without_rollback() {
    let store = Arc::new(FlakyStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;
    store.go_offline();

    let (outcome, pending) = manager.change_parent(&id("4"), None).await;
    assert!(outcome.is_moved());
    let err = pending.wait().await.unwrap_err();
    assert!(matches!(err, CodebookError::Sync { failed: 1, .. }));

    // the local tree keeps the move; the store still has the old edge
    assert!(manager.scheme().await.get(&id("4")).unwrap().is_top_level());
    assert!(store.inner.get("l4").is_some());

    // a refresh brings the local tree back in line with the store
    manager.load().await.unwrap();
    assert_eq!(
        manager.scheme().await.get(&id("4")).unwrap().parent_code(),
        Some(&id("2"))
    );
}

#[tokio::test]
async fn create_code_under_a_parent_writes_code_and_link() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let code = manager
        .create_code("Surveys", "Questionnaires", false, Some(&id("3")))
        .await
        .unwrap();
    assert_eq!(code.parent_code(), Some(&id("3")));
    let link_id = code.parent_link_annotation_id.clone().unwrap();
    assert!(store.get(code.id().as_str()).is_some());
    assert!(store.get(&link_id).is_some());

    let err = manager
        .create_code("Orphan", "", false, Some(&id("missing")))
        .await
        .unwrap_err();
    assert!(matches!(err, CodebookError::UnknownCode(_)));
}

#[tokio::test]
async fn update_code_rewrites_the_record() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let pending = manager
        .update_code(&id("5"), "Participants", "Who took part", true)
        .await
        .unwrap();
    pending.wait().await.unwrap();

    let stored = store.get("5").unwrap();
    assert_eq!(stored.tag_value("code:"), Some("Participants"));
    manager.load().await.unwrap();
    let scheme = manager.scheme().await;
    let code = scheme.get(&id("5")).unwrap();
    assert_eq!(code.name(), "Participants");
    assert!(code.multivalued);
}

#[tokio::test(start_paused = true)]
async fn periodic_refresh_picks_up_remote_changes() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = Arc::new(loaded(store.clone()).await);
    let token = CancellationToken::new();
    let task = manager.spawn_refresh(Duration::from_secs(60), token.clone());

    store.create(code_record("6", "Setting")).await.unwrap();
    store.create(link_record("l6", "5", "6")).await.unwrap();
    tokio::time::sleep(Duration::from_secs(61)).await;

    assert_eq!(
        manager.scheme().await.get(&id("6")).and_then(|c| c.parent_code().cloned()),
        Some(id("5"))
    );
    let links = store
        .search(&AnnotationFilter::new().with_tag(codebook::annotation::LINKING_TAG))
        .await
        .unwrap();
    assert_eq!(links.len(), 4);

    token.cancel();
    task.await.unwrap();
}

async fn links_for(store: &MemoryStore, child: &str) -> Vec<LinkRecord> {
    store
        .search(&AnnotationFilter::new().with_tag(codebook::annotation::LINKING_TAG))
        .await
        .unwrap()
        .iter()
        .filter_map(LinkRecord::from_annotation)
        .filter(|link| link.child == id(child))
        .collect()
}

#[tokio::test]
async fn undone_move_leaves_no_link_behind() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (first, first_sync) = manager.change_parent(&id("5"), Some(&id("1"))).await;
    let (second, second_sync) = manager.change_parent(&id("5"), None).await;
    assert!(first.is_moved() && second.is_moved());
    first_sync.wait().await.unwrap();
    second_sync.wait().await.unwrap();

    assert!(links_for(&store, "5").await.is_empty());
    manager.load().await.unwrap();
    assert!(manager.scheme().await.get(&id("5")).unwrap().is_top_level());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interleaved_moves_follow_the_last_one() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let mut pending = Vec::new();
    for parent in [Some("1"), None, Some("3")] {
        let parent = parent.map(id);
        let (outcome, sync) = manager.change_parent(&id("5"), parent.as_ref()).await;
        assert!(outcome.is_moved());
        pending.push(sync);
    }
    for sync in pending {
        sync.wait().await.unwrap();
    }

    let links = links_for(&store, "5").await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].parent, id("3"));
    assert_eq!(
        manager.scheme().await.get(&id("5")).unwrap().parent_link_annotation_id.as_deref(),
        Some(links[0].id.as_str())
    );

    manager.load().await.unwrap();
    assert_eq!(
        manager.scheme().await.get(&id("5")).unwrap().parent_code(),
        Some(&id("3"))
    );
}

#[tokio::test]
async fn moving_away_and_back_keeps_a_single_link() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (_, a) = manager.change_parent(&id("5"), Some(&id("1"))).await;
    let (_, b) = manager.change_parent(&id("5"), None).await;
    let (_, c) = manager.change_parent(&id("5"), Some(&id("1"))).await;
    for sync in [a, b, c] {
        sync.wait().await.unwrap();
    }

    let links = links_for(&store, "5").await;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].parent, id("1"));
    assert_eq!(
        manager.scheme().await.get(&id("5")).unwrap().parent_link_annotation_id.as_deref(),
        Some(links[0].id.as_str())
    );
}

#[tokio::test]
async fn removal_while_a_link_is_pending_cleans_it_up() {
    let store = Arc::new(MemoryStore::with_records(review_records()));
    let manager = loaded(store.clone()).await;

    let (_, moved) = manager.change_parent(&id("5"), Some(&id("3"))).await;
    let (_, removed) = manager.remove_code(&id("5"), false).await.unwrap();
    moved.wait().await.unwrap();
    removed.wait().await.unwrap();

    assert!(store.get("5").is_none());
    assert!(links_for(&store, "5").await.is_empty());
}
