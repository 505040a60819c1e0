//! Annotation records as exchanged with the annotation store
//!
//! The shape follows the store's JSON-LD flavoured schema. The core treats
//! records as opaque apart from the handful of fields it reads.

use super::selector::Selector;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Why an annotation was made
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Motivation {
    /// A user assigned a code to a highlighted span
    Classifying,
    /// A reviewer agreed or disagreed with a classifying annotation
    Assessing,
    /// Parent/child edge between two codes
    Linking,
    /// A code definition
    CodebookDevelopment,
    Commenting,
    #[default]
    #[serde(other)]
    Other,
}

impl Motivation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classifying => "classifying",
            Self::Assessing => "assessing",
            Self::Linking => "linking",
            Self::CodebookDevelopment => "codebookDevelopment",
            Self::Commenting => "commenting",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for Motivation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Motivation {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "classifying" => Ok(Self::Classifying),
            "assessing" => Ok(Self::Assessing),
            "linking" => Ok(Self::Linking),
            "codebookDevelopment" => Ok(Self::CodebookDevelopment),
            "commenting" => Ok(Self::Commenting),
            "other" => Ok(Self::Other),
            _ => Err(format!("unknown motivation: {}", s)),
        }
    }
}

/// The highlighted span an annotation is attached to
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Target {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default)]
    pub selector: Vec<Selector>,
}

impl Target {
    pub fn new(selector: Vec<Selector>) -> Self {
        Self { source: None, selector }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// A record held by the annotation store
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Annotation {
    /// Assigned by the store on creation; empty until then
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub motivation: Motivation,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub body: Value,
    #[serde(default)]
    pub target: Vec<Target>,
    /// Ids of the annotations this one replies to, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
    #[serde(rename = "oa:target", default, skip_serializing_if = "Option::is_none")]
    pub oa_target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<DateTime<Utc>>,
}

impl Annotation {
    pub fn new(motivation: Motivation) -> Self {
        Self {
            motivation,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = group.into();
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = uri.into();
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    pub fn with_target(mut self, target: Target) -> Self {
        self.target.push(target);
        self
    }

    pub fn with_reference(mut self, id: impl Into<String>) -> Self {
        self.references.push(id.into());
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Value of the first tag starting with `prefix`, with the prefix removed
    pub fn tag_value(&self, prefix: &str) -> Option<&str> {
        self.tags
            .iter()
            .find_map(|t| t.strip_prefix(prefix))
            .filter(|v| !v.is_empty())
    }

    /// The id the body points at.
    ///
    /// Accepts a bare string, an object with `id` (or `value`), or an array
    /// whose first element is one of those.
    pub fn body_reference(&self) -> Option<&str> {
        value_reference(&self.body)
    }

    /// Selectors of the first target
    pub fn selectors(&self) -> &[Selector] {
        self.target
            .first()
            .map(|t| t.selector.as_slice())
            .unwrap_or(&[])
    }

    /// The annotation this one directly replies to
    pub fn replied_to(&self) -> Option<&str> {
        self.references.last().map(String::as_str)
    }
}

fn value_reference(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Object(map) => map
            .get("id")
            .or_else(|| map.get("value"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty()),
        Value::Array(items) => items.first().and_then(value_reference),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn motivation_serializes_camel_case() {
        let json = serde_json::to_string(&Motivation::CodebookDevelopment).unwrap();
        assert_eq!(json, "\"codebookDevelopment\"");
    }

    #[test]
    fn unknown_motivation_deserializes_as_other() {
        let m: Motivation = serde_json::from_str("\"bookmarking\"").unwrap();
        assert_eq!(m, Motivation::Other);
    }

    #[test]
    fn body_reference_accepts_string_object_and_array() {
        let a = Annotation::new(Motivation::Classifying).with_body(json!("code-1"));
        assert_eq!(a.body_reference(), Some("code-1"));

        let a = Annotation::new(Motivation::Classifying).with_body(json!({"id": "code-2"}));
        assert_eq!(a.body_reference(), Some("code-2"));

        let a = Annotation::new(Motivation::Classifying)
            .with_body(json!([{"value": "code-3"}, "ignored"]));
        assert_eq!(a.body_reference(), Some("code-3"));

        let a = Annotation::new(Motivation::Classifying);
        assert_eq!(a.body_reference(), None);
    }

    #[test]
    fn tag_value_strips_prefix() {
        let a = Annotation::new(Motivation::CodebookDevelopment)
            .with_tag("motivation:codebookDevelopment")
            .with_tag("code:Method");
        assert_eq!(a.tag_value("code:"), Some("Method"));
        assert_eq!(a.tag_value("facet:"), None);
    }

    #[test]
    fn deserializes_store_record() {
        let raw = json!({
            "id": "abc",
            "user": "acct:alice@example.org",
            "group": "__world__",
            "uri": "https://example.org/paper.pdf",
            "motivation": "linking",
            "tags": ["motivation:linking"],
            "text": "parentCode: p\nchildCode: c\n",
            "body": "p",
            "oa:target": "c",
            "target": [{"selector": [{"type": "TextPositionSelector", "start": 1, "end": 4}]}]
        });
        let a: Annotation = serde_json::from_value(raw).unwrap();
        assert_eq!(a.motivation, Motivation::Linking);
        assert_eq!(a.oa_target.as_deref(), Some("c"));
        assert_eq!(a.selectors().len(), 1);
    }
}
