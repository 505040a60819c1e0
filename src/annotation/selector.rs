//! Selectors: durable descriptions of a highlighted span
//!
//! Several kinds are stored side by side as redundant fallbacks. Offsets are
//! character offsets into the text content of the document (or element).

use serde::{Deserialize, Serialize};

/// Anchor relative to an element carrying an id, refined by offsets within it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FragmentSelector {
    /// Element id
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refined_by: Option<TextPositionSelector>,
}

/// Start/end element paths with offsets into each element's text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RangeSelector {
    pub start_container: String,
    pub start_offset: usize,
    pub end_container: String,
    pub end_offset: usize,
}

/// Offsets from the start of the document text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPositionSelector {
    pub start: usize,
    pub end: usize,
}

/// Quoted text with surrounding context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextQuoteSelector {
    pub exact: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Selector {
    #[serde(rename = "FragmentSelector")]
    Fragment(FragmentSelector),
    #[serde(rename = "RangeSelector")]
    Range(RangeSelector),
    #[serde(rename = "TextPositionSelector")]
    TextPosition(TextPositionSelector),
    #[serde(rename = "TextQuoteSelector")]
    TextQuote(TextQuoteSelector),
    /// Any selector type the core does not interpret
    #[serde(other)]
    Unsupported,
}

/// Which selector kinds a document can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorKind {
    Fragment,
    Range,
    TextPosition,
    TextQuote,
}

impl Selector {
    pub fn kind(&self) -> Option<SelectorKind> {
        match self {
            Self::Fragment(_) => Some(SelectorKind::Fragment),
            Self::Range(_) => Some(SelectorKind::Range),
            Self::TextPosition(_) => Some(SelectorKind::TextPosition),
            Self::TextQuote(_) => Some(SelectorKind::TextQuote),
            Self::Unsupported => None,
        }
    }
}

/// Typed view over a selector list, picking the first of each kind
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectorSet<'a> {
    pub fragment: Option<&'a FragmentSelector>,
    pub range: Option<&'a RangeSelector>,
    pub position: Option<&'a TextPositionSelector>,
    pub quote: Option<&'a TextQuoteSelector>,
}

impl<'a> SelectorSet<'a> {
    pub fn from_slice(selectors: &'a [Selector]) -> Self {
        let mut set = Self::default();
        for selector in selectors {
            match selector {
                Selector::Fragment(s) => {
                    set.fragment.get_or_insert(s);
                }
                Selector::Range(s) => {
                    set.range.get_or_insert(s);
                }
                Selector::TextPosition(s) => {
                    set.position.get_or_insert(s);
                }
                Selector::TextQuote(s) => {
                    set.quote.get_or_insert(s);
                }
                Selector::Unsupported => {}
            }
        }
        set
    }

    pub fn is_empty(&self) -> bool {
        self.fragment.is_none()
            && self.range.is_none()
            && self.position.is_none()
            && self.quote.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selectors_use_type_tag() {
        let s = Selector::TextQuote(TextQuoteSelector {
            exact: "foo".into(),
            prefix: "a ".into(),
            suffix: " b".into(),
        });
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["type"], "TextQuoteSelector");
        assert_eq!(v["exact"], "foo");
    }

    #[test]
    fn range_selector_fields_are_camel_case() {
        let v = json!({
            "type": "RangeSelector",
            "startContainer": "/p[1]",
            "startOffset": 2,
            "endContainer": "/p[1]",
            "endOffset": 5
        });
        let s: Selector = serde_json::from_value(v).unwrap();
        assert_eq!(s.kind(), Some(SelectorKind::Range));
    }

    #[test]
    fn unknown_selector_type_is_tolerated() {
        let s: Selector =
            serde_json::from_value(json!({"type": "PageSelector", "index": 3})).unwrap();
        assert_eq!(s, Selector::Unsupported);
        assert_eq!(s.kind(), None);
    }

    #[test]
    fn selector_set_keeps_first_of_each_kind() {
        let selectors = vec![
            Selector::TextPosition(TextPositionSelector { start: 1, end: 2 }),
            Selector::TextPosition(TextPositionSelector { start: 5, end: 9 }),
        ];
        let set = SelectorSet::from_slice(&selectors);
        assert_eq!(set.position.map(|p| p.start), Some(1));
        assert!(set.quote.is_none());
        assert!(!set.is_empty());
    }
}
