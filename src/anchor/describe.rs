//! Span to selectors

use super::document::{Document, DocumentKind};
use super::{AnchorError, AnchorResult, TextRange};
use crate::annotation::{
    FragmentSelector, RangeSelector, Selector, TextPositionSelector, TextQuoteSelector,
};

/// Characters of context stored either side of a quote
pub const QUOTE_CONTEXT: usize = 32;

/// Describe `range` with every selector kind the document supports.
///
/// Selectors come out in resolution order. HTML documents get fragment
/// (when an id-bearing ancestor exists), range, text position and quote;
/// PDF renders only text position and quote.
pub fn describe(document: &Document, range: TextRange) -> AnchorResult<Vec<Selector>> {
    document.check(range)?;
    if range.is_empty() {
        return Err(AnchorError::InvalidRange {
            start: range.start,
            end: range.end,
            len: document.len(),
        });
    }

    let mut selectors = Vec::with_capacity(4);
    if document.kind() == DocumentKind::Html {
        if let Some(fragment) = fragment(document, range) {
            selectors.push(Selector::Fragment(fragment));
        }
        selectors.push(Selector::Range(range_selector(document, range)));
    }
    selectors.push(Selector::TextPosition(TextPositionSelector {
        start: range.start,
        end: range.end,
    }));
    selectors.push(Selector::TextQuote(quote(document, range)));
    Ok(selectors)
}

fn fragment(document: &Document, range: TextRange) -> Option<FragmentSelector> {
    let common = document.smallest_element_containing(range);
    let anchor = document.nearest_with_id(common)?;
    let base = document.range_of(anchor).start;
    Some(FragmentSelector {
        value: document.element_id(anchor)?.to_string(),
        refined_by: Some(TextPositionSelector {
            start: range.start - base,
            end: range.end - base,
        }),
    })
}

fn range_selector(document: &Document, range: TextRange) -> RangeSelector {
    let start = document.element_at(range.start, false);
    let end = document.element_at(range.end, true);
    RangeSelector {
        start_container: document.path(start),
        start_offset: range.start - document.range_of(start).start,
        end_container: document.path(end),
        end_offset: range.end - document.range_of(end).start,
    }
}

fn quote(document: &Document, range: TextRange) -> TextQuoteSelector {
    let prefix_start = range.start.saturating_sub(QUOTE_CONTEXT);
    TextQuoteSelector {
        exact: document.chars(range.start, range.end).iter().collect(),
        prefix: document.chars(prefix_start, range.start).iter().collect(),
        suffix: document
            .chars(range.end, range.end + QUOTE_CONTEXT)
            .iter()
            .collect(),
    }
}
