//! Code: one labelled category of the classification scheme

use super::element::{CodeId, GuideElement, ParentRef};
use crate::annotation::CodeRecord;
use serde::{Deserialize, Serialize};

/// A node of the classification tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Code {
    pub element: GuideElement,
    pub description: String,
    /// Whether several child codes may apply to one piece of evidence
    pub multivalued: bool,
    /// Id of the linking record persisting the edge to the parent code
    pub parent_link_annotation_id: Option<String>,
    /// User who created the backing record
    pub creator: String,
    pub uri: Option<String>,
}

impl Code {
    pub fn new(id: CodeId, name: impl Into<String>) -> Self {
        let mut element = GuideElement::new(id.as_str(), name);
        element.parent = Some(ParentRef::Scheme);
        Self {
            element,
            description: String::new(),
            multivalued: false,
            parent_link_annotation_id: None,
            creator: String::new(),
            uri: None,
        }
    }

    pub fn from_record(record: &CodeRecord) -> Self {
        let mut code = Self::new(record.id.clone(), record.name.clone());
        code.description = record.description.clone();
        code.multivalued = record.multivalued;
        code.creator = record.creator.clone();
        code.uri = record.uri.clone();
        code
    }

    /// Record form, for writing back to the store
    pub fn to_record(&self) -> CodeRecord {
        CodeRecord {
            id: self.id(),
            name: self.element.name.clone(),
            description: self.description.clone(),
            multivalued: self.multivalued,
            creator: self.creator.clone(),
            uri: self.uri.clone(),
        }
    }

    pub fn id(&self) -> CodeId {
        CodeId::from_string(self.element.id.clone())
    }

    pub fn name(&self) -> &str {
        &self.element.name
    }

    pub fn parent(&self) -> &ParentRef {
        self.element.parent.as_ref().unwrap_or(&ParentRef::Scheme)
    }

    /// Parent code, or `None` for top-level codes
    pub fn parent_code(&self) -> Option<&CodeId> {
        self.parent().code()
    }

    pub fn is_top_level(&self) -> bool {
        self.parent_code().is_none()
    }

    pub(crate) fn set_parent(&mut self, parent: ParentRef) {
        self.element.parent = Some(parent);
    }
}
