//! Selector anchoring
//!
//! Turns a highlighted span of a document into a redundant set of selectors
//! and turns a stored selector set back into a span, possibly after the
//! document has changed. Failing to anchor is never fatal: the
//! [`HighlightReconciler`] keeps retrying unmatched highlights.

mod describe;
mod document;
mod reconcile;
mod resolve;

pub use describe::{describe, QUOTE_CONTEXT};
pub use document::{Document, DocumentBuilder, DocumentKind, NodeId};
pub use reconcile::{AnchoredHighlight, HighlightReconciler, ReconcilerHandle};
pub use resolve::resolve;

use thiserror::Error;

/// Errors raised while describing or resolving a span
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnchorError {
    /// None of the selectors matched the current document
    #[error("no selector matched the document")]
    NotFound,

    #[error("range {start}..{end} is outside a document of {len} characters")]
    InvalidRange { start: usize, end: usize, len: usize },
}

pub type AnchorResult<T> = Result<T, AnchorError>;

/// A span of a document, in character offsets over its concatenated text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextRange {
    pub start: usize,
    pub end: usize,
}

impl TextRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, other: &TextRange) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl std::fmt::Display for TextRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests;
