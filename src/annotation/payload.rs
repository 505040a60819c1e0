//! Typed payloads carried by codebook, linking and assessing annotations
//!
//! Code details and link edges travel as YAML in the annotation `text`.
//! Link edges are mirrored into `body` (parent) and `oa:target` (child) so
//! a record with a damaged payload can still be decoded.

use super::record::{Annotation, Motivation};
use crate::scheme::CodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CODEBOOK_TAG: &str = "motivation:codebookDevelopment";
pub const LINKING_TAG: &str = "motivation:linking";
pub const CLASSIFYING_TAG: &str = "motivation:classifying";
pub const ASSESSING_TAG: &str = "motivation:assessing";
pub const CODE_TAG_PREFIX: &str = "code:";

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CodeDetails {
    #[serde(default)]
    description: String,
    #[serde(default)]
    multivalued: bool,
}

/// A code definition decoded from a codebook record
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRecord {
    pub id: CodeId,
    pub name: String,
    pub description: String,
    pub multivalued: bool,
    pub creator: String,
    pub uri: Option<String>,
}

impl CodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CodeId::from_string(""),
            name: name.into(),
            description: String::new(),
            multivalued: false,
            creator: String::new(),
            uri: None,
        }
    }

    /// Decode a codebook record. `None` when the record carries no code name.
    pub fn from_annotation(annotation: &Annotation) -> Option<Self> {
        let name = annotation
            .tag_value(CODE_TAG_PREFIX)
            .map(str::to_string)
            .or_else(|| {
                annotation
                    .body
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.trim().is_empty())
                    .map(str::to_string)
            })?;

        let details: CodeDetails = parse_yaml(&annotation.text).unwrap_or_default();

        Some(Self {
            id: CodeId::from_string(annotation.id.clone()),
            name,
            description: details.description,
            multivalued: details.multivalued,
            creator: annotation.user.clone(),
            uri: Some(annotation.uri.clone()).filter(|u| !u.is_empty()),
        })
    }

    pub fn to_annotation(&self, group: &str) -> Annotation {
        let details = CodeDetails {
            description: self.description.clone(),
            multivalued: self.multivalued,
        };
        let mut annotation = Annotation::new(Motivation::CodebookDevelopment)
            .with_id(self.id.as_str())
            .with_user(self.creator.clone())
            .with_group(group)
            .with_tag(CODEBOOK_TAG)
            .with_tag(format!("{}{}", CODE_TAG_PREFIX, self.name))
            .with_text(to_yaml(&details));
        if let Some(uri) = &self.uri {
            annotation = annotation.with_uri(uri.clone());
        }
        annotation
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkPayload {
    parent_code: String,
    child_code: String,
}

/// A parent/child edge decoded from a linking record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: String,
    pub parent: CodeId,
    pub child: CodeId,
}

impl LinkRecord {
    pub fn new(parent: CodeId, child: CodeId) -> Self {
        Self {
            id: String::new(),
            parent,
            child,
        }
    }

    /// Decode a linking record, preferring the YAML payload over the mirror fields.
    pub fn from_annotation(annotation: &Annotation) -> Option<Self> {
        let (parent, child) = match parse_yaml::<LinkPayload>(&annotation.text) {
            Some(p) if !p.parent_code.is_empty() && !p.child_code.is_empty() => {
                (p.parent_code, p.child_code)
            }
            _ => {
                let parent = annotation.body_reference()?.to_string();
                let child = annotation.oa_target.clone().filter(|c| !c.is_empty())?;
                (parent, child)
            }
        };
        Some(Self {
            id: annotation.id.clone(),
            parent: CodeId::from(parent),
            child: CodeId::from(child),
        })
    }

    pub fn to_annotation(&self, group: &str, user: &str) -> Annotation {
        let payload = LinkPayload {
            parent_code: self.parent.to_string(),
            child_code: self.child.to_string(),
        };
        let mut annotation = Annotation::new(Motivation::Linking)
            .with_id(self.id.clone())
            .with_user(user)
            .with_group(group)
            .with_tag(LINKING_TAG)
            .with_text(to_yaml(&payload))
            .with_body(Value::String(self.parent.to_string()));
        annotation.oa_target = Some(self.child.to_string());
        annotation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agreement {
    Agree,
    Disagree,
}

#[derive(Debug, Serialize, Deserialize)]
struct AssessmentPayload {
    agreement: Option<Agreement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    comment: Option<String>,
}

/// A reviewer's verdict on a classifying annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assessment {
    pub id: String,
    pub user: String,
    /// The classifying annotation under review
    pub classifying_id: String,
    /// `None` for a reply that states no verdict
    pub agreement: Option<Agreement>,
    pub comment: Option<String>,
}

impl Assessment {
    pub fn new(classifying_id: impl Into<String>, agreement: Agreement) -> Self {
        Self {
            id: String::new(),
            user: String::new(),
            classifying_id: classifying_id.into(),
            agreement: Some(agreement),
            comment: None,
        }
    }

    /// Reply to `classifying`, inheriting its thread and document
    pub fn to_annotation(&self, classifying: &Annotation) -> Annotation {
        let payload = AssessmentPayload {
            agreement: self.agreement,
            comment: self.comment.clone(),
        };
        let mut annotation = Annotation::new(Motivation::Assessing)
            .with_id(self.id.clone())
            .with_user(self.user.clone())
            .with_group(classifying.group.clone())
            .with_uri(classifying.uri.clone())
            .with_tag(ASSESSING_TAG)
            .with_text(to_yaml(&payload));
        annotation.references = classifying.references.clone();
        annotation.references.push(self.classifying_id.clone());
        annotation
    }

    /// Decode an assessing record. Free text without a verdict is kept as
    /// the comment and agrees with nothing.
    pub fn from_annotation(annotation: &Annotation) -> Option<Self> {
        let classifying_id = annotation
            .replied_to()
            .or_else(|| annotation.body_reference())?
            .to_string();
        let payload = parse_yaml::<AssessmentPayload>(&annotation.text);
        let (agreement, comment) = match payload {
            Some(p) if p.agreement.is_some() || p.comment.is_some() => (p.agreement, p.comment),
            _ if annotation.text.trim().is_empty() => (None, None),
            _ => (None, Some(annotation.text.clone())),
        };
        Some(Self {
            id: annotation.id.clone(),
            user: annotation.user.clone(),
            classifying_id,
            agreement,
            comment,
        })
    }
}

/// The code a classifying annotation assigns
pub fn classified_code(annotation: &Annotation) -> Option<CodeId> {
    annotation.body_reference().map(CodeId::from)
}

fn parse_yaml<T: for<'de> Deserialize<'de>>(text: &str) -> Option<T> {
    if text.trim().is_empty() {
        return None;
    }
    serde_yaml::from_str(text).ok()
}

fn to_yaml<T: Serialize>(value: &T) -> String {
    serde_yaml::to_string(value).unwrap_or_default()
}
