//! Highlights stored with their selectors, re-anchored in revised documents

mod common;

use codebook::anchor::HighlightReconciler;
use codebook::{
    describe, resolve, AnchorError, CancellationToken, CodingManager, Document, OpenStore,
    SqliteStore, TextRange,
};
use common::{context, id};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const URI: &str = "file:///papers/interviews.md";

const DRAFT: &str = "\
# Findings

Participants described foo bar as helpful.

# Limitations

Only twelve people took part.
";

const REVISED: &str = "\
# Background

Earlier work never looked at foo.

# Findings

Most participants described foo bar as helpful.

# Limitations

Only twelve people took part.
";

fn find(document: &Document, needle: &str) -> TextRange {
    let text = document.text();
    let byte = text.find(needle).unwrap();
    let start = text[..byte].chars().count();
    TextRange::new(start, start + needle.chars().count())
}

#[tokio::test]
async fn stored_highlight_survives_a_revision() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let coding = CodingManager::new(&context(store.clone()));

    let draft = Document::from_markdown(URI, DRAFT);
    let selectors = describe(&draft, find(&draft, "foo bar")).unwrap();
    let created = coding.classify(URI, &id("2"), selectors).await.unwrap();

    let stored = coding.fetch(Some(URI)).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, created.id);

    let revised = Document::from_markdown(URI, REVISED);
    let range = resolve(&revised, stored[0].selectors()).unwrap();
    assert_eq!(revised.slice(range).unwrap(), "foo bar");
    assert_eq!(range, find(&revised, "foo bar"));
}

#[tokio::test]
async fn removed_passage_does_not_anchor() {
    let draft = Document::from_markdown(URI, DRAFT);
    let selectors = describe(&draft, find(&draft, "twelve people")).unwrap();

    let rewritten = Document::from_markdown(URI, "# Findings\n\nNothing to see.\n");
    assert_eq!(resolve(&rewritten, &selectors), Err(AnchorError::NotFound));
}

#[tokio::test(start_paused = true)]
async fn reconciler_waits_for_the_passage_to_appear() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let coding = CodingManager::new(&context(store));
    let revised = Document::from_markdown(URI, REVISED);
    let selectors = describe(&revised, find(&revised, "Earlier work")).unwrap();
    let highlight = coding.classify(URI, &id("5"), selectors).await.unwrap();

    // the page is still showing the older draft
    let (tx, rx) = watch::channel(Arc::new(Document::from_markdown(URI, DRAFT)));
    let reconciler = HighlightReconciler::with_pending(vec![highlight.clone()]);
    let (handle, mut anchored) =
        reconciler.spawn(rx, Duration::from_secs(2), CancellationToken::new());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(anchored.try_recv().is_err());
    assert_eq!(handle.pending_count().await, 1);

    tx.send(Arc::new(revised)).unwrap();
    let hit = anchored.recv().await.unwrap();
    assert_eq!(hit.annotation_id, highlight.id);
    assert_eq!(hit.text, "Earlier work");

    assert!(handle.shutdown().await.is_empty());
}
