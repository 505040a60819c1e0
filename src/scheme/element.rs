//! Tree primitive shared by the scheme root and its codes

use super::color::Rgba;
use serde::{Deserialize, Serialize};

/// Identifier of a code: the id the annotation store assigned to its record.
///
/// Serializes as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CodeId(String);

impl CodeId {
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for CodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Back reference from a node to its parent.
///
/// Never an ownership edge: codes live in the scheme's arena and are
/// addressed by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ParentRef {
    /// The owning classification scheme (root level)
    Scheme,
    /// Another code
    Code(CodeId),
}

impl ParentRef {
    pub fn code(&self) -> Option<&CodeId> {
        match self {
            Self::Scheme => None,
            Self::Code(id) => Some(id),
        }
    }
}

impl From<Option<CodeId>> for ParentRef {
    fn from(parent: Option<CodeId>) -> Self {
        parent.map_or(Self::Scheme, Self::Code)
    }
}

/// Fields every node of the classification tree carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideElement {
    pub id: String,
    pub name: String,
    pub color: Rgba,
    /// `None` only for the scheme root
    pub parent: Option<ParentRef>,
    /// Ordered children, owned through the scheme arena
    pub children: Vec<CodeId>,
}

impl GuideElement {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: Rgba::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn push_child(&mut self, child: CodeId) {
        if !self.children.contains(&child) {
            self.children.push(child);
        }
    }

    pub(crate) fn drop_child(&mut self, child: &CodeId) -> bool {
        let before = self.children.len();
        self.children.retain(|c| c != child);
        before != self.children.len()
    }
}

/// A node of the classification tree, resolved from a [`ParentRef`].
#[derive(Debug, Clone, Copy)]
pub enum GuideNode<'a> {
    Scheme(&'a super::ClassificationScheme),
    Code(&'a super::Code),
}

impl<'a> GuideNode<'a> {
    pub fn element(&self) -> &'a GuideElement {
        match self {
            Self::Scheme(scheme) => &scheme.element,
            Self::Code(code) => &code.element,
        }
    }

    pub fn name(&self) -> &'a str {
        &self.element().name
    }

    pub fn children(&self) -> &'a [CodeId] {
        &self.element().children
    }
}
