//! Annotation records, selectors and the payloads codebook records carry

mod payload;
mod record;
mod selector;

pub use payload::{
    classified_code, Agreement, Assessment, CodeRecord, LinkRecord, ASSESSING_TAG,
    CLASSIFYING_TAG, CODEBOOK_TAG, CODE_TAG_PREFIX, LINKING_TAG,
};
pub use record::{Annotation, Motivation, Target};
pub use selector::{
    FragmentSelector, RangeSelector, Selector, SelectorKind, SelectorSet, TextPositionSelector,
    TextQuoteSelector,
};
