use super::*;
use crate::annotation::{
    Annotation, FragmentSelector, Motivation, RangeSelector, Selector, SelectorKind, Target,
    TextPositionSelector, TextQuoteSelector,
};
use crate::schedule::CancellationToken;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn page() -> Document {
    let mut b = DocumentBuilder::new(DocumentKind::Html).with_uri("https://example.org/paper");
    b.element("h1", None, "A study\n")
        .open("section", Some("method"))
        .element("p", None, "We asked foo bar questions.\n")
        .element("p", None, "Then foo bar again.\n")
        .close();
    b.build()
}

fn find(document: &Document, needle: &str) -> TextRange {
    let text = document.text();
    let byte = text.find(needle).unwrap();
    let start = text[..byte].chars().count();
    TextRange::new(start, start + needle.chars().count())
}

fn kinds(selectors: &[Selector]) -> Vec<SelectorKind> {
    selectors.iter().filter_map(Selector::kind).collect()
}

fn highlight(id: &str, selectors: Vec<Selector>) -> Annotation {
    Annotation::new(Motivation::Classifying)
        .with_id(id)
        .with_target(Target::new(selectors))
}

#[test]
fn foo_bar_round_trips_through_quote() {
    let doc = page();
    let range = find(&doc, "foo bar");
    let selectors = describe(&doc, range).unwrap();

    let quote = selectors
        .iter()
        .find_map(|s| match s {
            Selector::TextQuote(q) => Some(q.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(quote.exact, "foo bar");
    assert!(quote.prefix.ends_with("We asked "));
    assert!(quote.suffix.starts_with(" questions."));

    let reloaded = page();
    let resolved = resolve(&reloaded, &[Selector::TextQuote(quote)]).unwrap();
    assert_eq!(reloaded.slice(resolved).unwrap(), "foo bar");
    assert_eq!(resolved, range);
}

#[test]
fn html_gets_every_selector_kind() {
    let doc = page();
    let selectors = describe(&doc, find(&doc, "foo bar")).unwrap();
    assert_eq!(
        kinds(&selectors),
        vec![
            SelectorKind::Fragment,
            SelectorKind::Range,
            SelectorKind::TextPosition,
            SelectorKind::TextQuote
        ]
    );
    match &selectors[0] {
        Selector::Fragment(f) => {
            assert_eq!(f.value, "method");
            assert_eq!(f.refined_by.map(|r| r.start), Some(9));
        }
        other => panic!("expected fragment, got {:?}", other),
    }
    match &selectors[1] {
        Selector::Range(r) => {
            assert_eq!(r.start_container, "/section[1]/p[1]");
            assert_eq!(r.start_offset, 9);
            assert_eq!(r.end_offset, 16);
        }
        other => panic!("expected range, got {:?}", other),
    }
}

#[test]
fn spans_without_id_ancestor_skip_fragment() {
    let doc = page();
    let selectors = describe(&doc, find(&doc, "study")).unwrap();
    assert_eq!(selectors[0].kind(), Some(SelectorKind::Range));
}

#[test]
fn pdf_gets_position_and_quote_only() {
    let mut b = DocumentBuilder::new(DocumentKind::Pdf);
    b.open("div", Some("page-1")).text("Some foo bar text").close();
    let doc = b.build();
    let selectors = describe(&doc, find(&doc, "foo bar")).unwrap();
    assert_eq!(
        kinds(&selectors),
        vec![SelectorKind::TextPosition, SelectorKind::TextQuote]
    );
}

#[test]
fn describe_rejects_empty_and_out_of_bounds_ranges() {
    let doc = page();
    assert!(describe(&doc, TextRange::new(3, 3)).is_err());
    assert!(describe(&doc, TextRange::new(0, 1000)).is_err());
}

#[test]
fn every_selector_resolves_on_its_own() {
    let doc = page();
    let range = find(&doc, "foo bar");
    for selector in describe(&doc, range).unwrap() {
        assert_eq!(resolve(&doc, std::slice::from_ref(&selector)), Ok(range), "{:?}", selector);
    }
}

#[test]
fn changed_document_falls_back_to_quote() {
    let doc = page();
    let selectors = describe(&doc, find(&doc, "foo bar")).unwrap();

    let mut b = DocumentBuilder::new(DocumentKind::Html);
    b.element("h1", None, "A much longer study title\n")
        .element("p", None, "Preface.\n")
        .open("section", Some("method"))
        .element("p", None, "Intro line.\n")
        .element("p", None, "We asked foo bar questions.\n")
        .element("p", None, "Then foo bar again.\n")
        .close();
    let changed = b.build();

    let resolved = resolve(&changed, &selectors).unwrap();
    assert_eq!(changed.slice(resolved).unwrap(), "foo bar");
    assert_eq!(resolved.start, find(&changed, "foo bar questions").start);
}

#[test]
fn quote_context_picks_the_right_occurrence() {
    let doc = page();
    let second = {
        let text = doc.text();
        let byte = text.rfind("foo bar").unwrap();
        let start = text[..byte].chars().count();
        TextRange::new(start, start + 7)
    };
    let quote = match describe(&doc, second).unwrap().pop() {
        Some(Selector::TextQuote(q)) => q,
        other => panic!("expected quote, got {:?}", other),
    };
    assert_eq!(resolve(&doc, &[Selector::TextQuote(quote)]), Ok(second));
}

#[test]
fn position_hint_breaks_ties() {
    let mut b = DocumentBuilder::new(DocumentKind::Html);
    b.element("p", None, "x y x y x");
    let doc = b.build();
    let selectors = vec![
        Selector::TextPosition(TextPositionSelector { start: 4, end: 5 }),
        Selector::TextQuote(TextQuoteSelector {
            exact: "x".into(),
            prefix: String::new(),
            suffix: String::new(),
        }),
    ];
    // without context every occurrence scores the same
    assert_eq!(resolve(&doc, &selectors), Ok(TextRange::new(4, 5)));
}

#[test]
fn quote_search_widens_beyond_the_hinted_element() {
    let doc = page();
    let selectors = vec![
        // hint points into the heading; the text lives in the section
        Selector::TextPosition(TextPositionSelector { start: 2, end: 7 }),
        Selector::TextQuote(TextQuoteSelector {
            exact: "questions".into(),
            prefix: String::new(),
            suffix: String::new(),
        }),
    ];
    let resolved = resolve(&doc, &selectors).unwrap();
    assert_eq!(doc.slice(resolved).unwrap(), "questions");
}

#[test]
fn missing_text_is_not_found() {
    let doc = page();
    let selectors = vec![Selector::TextQuote(TextQuoteSelector {
        exact: "absent".into(),
        prefix: String::new(),
        suffix: String::new(),
    })];
    assert_eq!(resolve(&doc, &selectors), Err(AnchorError::NotFound));
    assert_eq!(resolve(&doc, &[]), Err(AnchorError::NotFound));
    assert_eq!(resolve(&doc, &[Selector::Unsupported]), Err(AnchorError::NotFound));
}

#[test]
fn markdown_document_supports_fragments() {
    let md = "# Findings\n\nParticipants liked foo bar a lot.\n";
    let doc = Document::from_markdown("file:///f.md", md);
    let range = find(&doc, "foo bar");
    let selectors = describe(&doc, range).unwrap();
    match &selectors[0] {
        Selector::Fragment(f) => assert_eq!(f.value, "findings"),
        other => panic!("expected fragment, got {:?}", other),
    }
    let reloaded = Document::from_markdown("file:///f.md", md);
    assert_eq!(resolve(&reloaded, &selectors), Ok(range));
}

#[test]
fn reconcile_once_keeps_unmatched_highlights() {
    let doc = page();
    let found = describe(&doc, find(&doc, "foo bar")).unwrap();
    let missing = vec![Selector::TextQuote(TextQuoteSelector {
        exact: "later content".into(),
        prefix: String::new(),
        suffix: String::new(),
    })];

    let mut reconciler = HighlightReconciler::with_pending([
        highlight("a1", found),
        highlight("a2", missing),
        Annotation::new(Motivation::Commenting).with_id("page-note"),
    ]);
    assert_eq!(reconciler.pending().len(), 2);

    let anchored = reconciler.reconcile_once(&doc);
    assert_eq!(anchored.len(), 1);
    assert_eq!(anchored[0].annotation_id, "a1");
    assert_eq!(anchored[0].text, "foo bar");
    assert_eq!(reconciler.pending()[0].id, "a2");
}

#[tokio::test(start_paused = true)]
async fn spawned_reconciler_anchors_late_content() {
    let (tx, rx) = watch::channel(Arc::new(page()));
    let missing = vec![Selector::TextQuote(TextQuoteSelector {
        exact: "late paragraph".into(),
        prefix: String::new(),
        suffix: String::new(),
    })];
    let reconciler = HighlightReconciler::with_pending([highlight("late", missing)]);
    let (handle, mut anchored) =
        reconciler.spawn(rx, Duration::from_secs(2), CancellationToken::new());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert_eq!(handle.pending_count().await, 1);

    let mut b = DocumentBuilder::new(DocumentKind::Html);
    b.element("p", None, "Now a late paragraph appears.");
    tx.send(Arc::new(b.build())).unwrap();

    let highlight = tokio::time::timeout(Duration::from_secs(5), anchored.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(highlight.annotation_id, "late");
    assert_eq!(highlight.text, "late paragraph");

    assert!(handle.shutdown().await.is_empty());
}

#[tokio::test]
async fn shutdown_returns_unanchored_highlights() {
    let (_tx, rx) = watch::channel(Arc::new(page()));
    let missing = vec![Selector::TextQuote(TextQuoteSelector {
        exact: "never".into(),
        prefix: String::new(),
        suffix: String::new(),
    })];
    let (handle, _anchored) = HighlightReconciler::new().spawn(
        rx,
        Duration::from_millis(10),
        CancellationToken::new(),
    );
    handle.add(highlight("n1", missing)).await;
    let left = handle.shutdown().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].id, "n1");
}

#[test]
fn overflowing_offsets_do_not_match() {
    let doc = page();
    let huge = TextPositionSelector {
        start: usize::MAX,
        end: usize::MAX,
    };
    let fragment = Selector::Fragment(FragmentSelector {
        value: "method".into(),
        refined_by: Some(huge),
    });
    let range = Selector::Range(RangeSelector {
        start_container: "/section[1]".into(),
        start_offset: usize::MAX,
        end_container: "/section[1]".into(),
        end_offset: usize::MAX,
    });
    assert_eq!(resolve(&doc, std::slice::from_ref(&fragment)), Err(AnchorError::NotFound));
    assert_eq!(resolve(&doc, std::slice::from_ref(&range)), Err(AnchorError::NotFound));

    // the quote still rescues the highlight
    let quote = Selector::TextQuote(TextQuoteSelector {
        exact: "Then foo bar".into(),
        prefix: String::new(),
        suffix: String::new(),
    });
    let found = resolve(&doc, &[fragment, range, quote]).unwrap();
    assert_eq!(doc.slice(found).unwrap(), "Then foo bar");
}

#[test]
fn reconciler_survives_garbage_offsets() {
    let doc = page();
    let garbage = highlight(
        "bad",
        vec![Selector::Fragment(FragmentSelector {
            value: "method".into(),
            refined_by: Some(TextPositionSelector {
                start: usize::MAX,
                end: 3,
            }),
        })],
    );
    let mut reconciler = HighlightReconciler::with_pending(vec![garbage]);
    assert!(reconciler.reconcile_once(&doc).is_empty());
    assert_eq!(reconciler.pending().len(), 1);
}
