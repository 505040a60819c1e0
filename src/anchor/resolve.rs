//! Selectors back to a span

use super::document::Document;
use super::{AnchorError, AnchorResult, TextRange};
use crate::annotation::{
    FragmentSelector, RangeSelector, Selector, SelectorSet, TextPositionSelector,
    TextQuoteSelector,
};
use tracing::debug;

/// Re-locate a stored selector set in `document`.
///
/// Tried in order: fragment, range, quote (searched in the smallest element
/// around the position hint, widening to ancestors until a match turns up),
/// then the bare position when there is no quote to check it against.
/// Structural anchors are only accepted when their text matches the quote.
pub fn resolve(document: &Document, selectors: &[Selector]) -> AnchorResult<TextRange> {
    let set = SelectorSet::from_slice(selectors);
    let quote = set.quote.filter(|q| !q.exact.is_empty());

    if let Some(fragment) = set.fragment {
        let range = from_fragment(document, fragment).filter(|r| verified(document, *r, quote));
        if let Some(range) = range {
            return Ok(range);
        }
        debug!(fragment = %fragment.value, "fragment selector did not match");
    }

    if let Some(selector) = set.range {
        let range = from_range(document, selector).filter(|r| verified(document, *r, quote));
        if let Some(range) = range {
            return Ok(range);
        }
        debug!(start = %selector.start_container, "range selector did not match");
    }

    let hint = set.position.map(|p| TextRange::new(p.start, p.end));

    if let Some(quote) = quote {
        return search_quote(document, quote, hint).ok_or(AnchorError::NotFound);
    }

    match set.position {
        Some(position) => from_position(document, position).ok_or(AnchorError::NotFound),
        None => Err(AnchorError::NotFound),
    }
}

fn from_fragment(document: &Document, selector: &FragmentSelector) -> Option<TextRange> {
    let element = document.element_by_id(&selector.value)?;
    let bounds = document.range_of(element);
    let range = match &selector.refined_by {
        Some(refined) => TextRange::new(
            bounds.start.checked_add(refined.start)?,
            bounds.start.checked_add(refined.end)?,
        ),
        None => bounds,
    };
    (bounds.contains(&range) && range.start <= range.end).then_some(range)
}

fn from_range(document: &Document, selector: &RangeSelector) -> Option<TextRange> {
    let start_el = document.by_path(&selector.start_container)?;
    let end_el = document.by_path(&selector.end_container)?;
    // offsets come from stored records and may be garbage
    let start = document.range_of(start_el).start.checked_add(selector.start_offset)?;
    let end = document.range_of(end_el).start.checked_add(selector.end_offset)?;
    let range = TextRange::new(start, end);
    document.check(range).ok().map(|_| range)
}

fn from_position(document: &Document, selector: &TextPositionSelector) -> Option<TextRange> {
    let range = TextRange::new(selector.start, selector.end);
    document.check(range).ok().map(|_| range)
}

fn verified(document: &Document, range: TextRange, quote: Option<&TextQuoteSelector>) -> bool {
    if document.check(range).is_err() {
        return false;
    }
    quote.map_or(true, |q| {
        document
            .chars(range.start, range.end)
            .iter()
            .copied()
            .eq(q.exact.chars())
    })
}

fn search_quote(
    document: &Document,
    quote: &TextQuoteSelector,
    hint: Option<TextRange>,
) -> Option<TextRange> {
    let hint = hint.filter(|h| document.check(*h).is_ok());

    let mut scope = Some(match hint {
        Some(h) => document.smallest_element_containing(h),
        None => document.root(),
    });

    while let Some(element) = scope {
        if let Some(found) = best_match(document, document.range_of(element), quote, hint) {
            return Some(found);
        }
        scope = document.parent(element);
    }
    None
}

/// Best occurrence of the quote inside `within`: most context agreement,
/// then nearest to the hint.
fn best_match(
    document: &Document,
    within: TextRange,
    quote: &TextQuoteSelector,
    hint: Option<TextRange>,
) -> Option<TextRange> {
    let exact: Vec<char> = quote.exact.chars().collect();
    let prefix: Vec<char> = quote.prefix.chars().collect();
    let suffix: Vec<char> = quote.suffix.chars().collect();
    let text = document.chars(within.start, within.end);

    if exact.len() > text.len() {
        return None;
    }

    (0..=text.len() - exact.len())
        .filter(|&i| text[i..i + exact.len()] == exact[..])
        .map(|i| {
            let start = within.start + i;
            let range = TextRange::new(start, start + exact.len());
            let score = context_score(document, range, &prefix, &suffix);
            let distance = hint.map_or(0, |h| h.start.abs_diff(start));
            (range, score, distance)
        })
        .max_by(|a, b| a.1.cmp(&b.1).then(b.2.cmp(&a.2)))
        .map(|(range, _, _)| range)
}

/// Characters of prefix and suffix agreeing with the text around `range`
fn context_score(document: &Document, range: TextRange, prefix: &[char], suffix: &[char]) -> usize {
    let before = document.chars(range.start.saturating_sub(prefix.len()), range.start);
    let after = document.chars(range.end, range.end + suffix.len());

    let prefix_score = before
        .iter()
        .rev()
        .zip(prefix.iter().rev())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix_score = after
        .iter()
        .zip(suffix.iter())
        .take_while(|(a, b)| a == b)
        .count();
    prefix_score + suffix_score
}
