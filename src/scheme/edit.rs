//! Structural edits of the classification scheme
//!
//! Edits mutate the in-memory tree and report what the annotation store needs
//! to hear about it. Persisting is the caller's job; see
//! [`crate::codebook::CodebookManager`].

use super::classification::ClassificationScheme;
use super::code::Code;
use super::element::{CodeId, ParentRef};
use tracing::debug;

/// Why a re-parent request was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveRejection {
    /// The code or the requested parent is not in the scheme
    UnknownCode,
    /// A code cannot be its own parent
    SelfParent,
    /// The code already sits under the requested parent
    AlreadyParent,
    /// The requested parent is a descendant of the code
    Cycle,
}

impl std::fmt::Display for MoveRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownCode => write!(f, "unknown code"),
            Self::SelfParent => write!(f, "a code cannot be its own parent"),
            Self::AlreadyParent => write!(f, "already under that parent"),
            Self::Cycle => write!(f, "new parent is a descendant of the code"),
        }
    }
}

/// The linking-record change a move requires
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkChange {
    /// Code moved to the root: its link record goes away
    Delete { link_id: String },
    /// Code had a link record: point it at the new parent
    Update { link_id: String, parent: CodeId },
    /// Code had no link record: write one
    Create { parent: CodeId },
}

/// A completed in-memory move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub code: CodeId,
    pub old_parent: ParentRef,
    pub new_parent: ParentRef,
    /// `None` when nothing has to be persisted
    pub link_change: Option<LinkChange>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved(Move),
    Rejected(MoveRejection),
}

impl MoveOutcome {
    pub fn is_moved(&self) -> bool {
        matches!(self, Self::Moved(_))
    }
}

/// What a deletion took out of the tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Removal {
    /// Codes deleted from the scheme (the target first)
    pub removed: Vec<CodeId>,
    /// Direct children promoted to the root (non-recursive deletion)
    pub promoted: Vec<CodeId>,
    /// Store records (code and link records) to delete
    pub record_ids: Vec<String>,
}

impl ClassificationScheme {
    /// Move `code` under `new_parent`, or to the root when `None`.
    ///
    /// Invalid moves are ignored and reported as [`MoveOutcome::Rejected`];
    /// the tree is left untouched.
    pub fn change_parent(&mut self, code: &CodeId, new_parent: Option<&CodeId>) -> MoveOutcome {
        let outcome = self.try_change_parent(code, new_parent);
        if let MoveOutcome::Rejected(reason) = &outcome {
            debug!(code_id = %code, parent = ?new_parent, %reason, "move rejected");
        }
        outcome
    }

    fn try_change_parent(&mut self, code: &CodeId, new_parent: Option<&CodeId>) -> MoveOutcome {
        let Some(current) = self.get(code) else {
            return MoveOutcome::Rejected(MoveRejection::UnknownCode);
        };
        if let Some(parent) = new_parent {
            if parent == code {
                return MoveOutcome::Rejected(MoveRejection::SelfParent);
            }
            if !self.contains(parent) {
                return MoveOutcome::Rejected(MoveRejection::UnknownCode);
            }
        }
        if current.parent_code() == new_parent {
            return MoveOutcome::Rejected(MoveRejection::AlreadyParent);
        }
        if let Some(parent) = new_parent {
            if self.is_descendant_of(parent, code) {
                return MoveOutcome::Rejected(MoveRejection::Cycle);
            }
        }

        let old_parent = current.parent().clone();
        let old_link = current.parent_link_annotation_id.clone();
        let was_top_level = current.is_top_level();
        let own_color = current.element.color;
        let old_top = self.top_level_ancestor(code);

        self.remove_child(&old_parent, code);

        let new_parent_ref = ParentRef::from(new_parent.cloned());
        match new_parent {
            None => {
                let hue = self.fresh_color();
                self.attach(code, ParentRef::Scheme);
                self.paint_tree(code, hue);
            }
            Some(_) => {
                if was_top_level {
                    self.release_color(own_color);
                }
                self.attach(code, new_parent_ref.clone());
                if let Some(top) = self.top_level_ancestor(code) {
                    self.repaint_tree(&top);
                }
            }
        }

        if let Some(top) = old_top.filter(|t| t != code) {
            if self.get(&top).is_some_and(Code::is_top_level) {
                self.repaint_tree(&top);
            }
        }

        let link_change = match (new_parent, old_link) {
            (None, Some(link_id)) => Some(LinkChange::Delete { link_id }),
            (None, None) => None,
            (Some(parent), Some(link_id)) => Some(LinkChange::Update {
                link_id,
                parent: parent.clone(),
            }),
            (Some(parent), None) => Some(LinkChange::Create {
                parent: parent.clone(),
            }),
        };
        if matches!(link_change, Some(LinkChange::Delete { .. })) {
            if let Some(c) = self.code_mut(code) {
                c.parent_link_annotation_id = None;
            }
        }

        MoveOutcome::Moved(Move {
            code: code.clone(),
            old_parent,
            new_parent: new_parent_ref,
            link_change,
        })
    }

    /// Delete `code` from the scheme.
    ///
    /// With `recursive`, its descendants go too. Otherwise each direct child is
    /// promoted to the root with its own fresh hue. Returns `None` when the
    /// code is unknown.
    pub fn remove_code(&mut self, code: &CodeId, recursive: bool) -> Option<Removal> {
        let Some(target) = self.get(code) else {
            debug!(code_id = %code, "remove ignored: unknown code");
            return None;
        };
        let parent = target.parent().clone();
        let was_top_level = target.is_top_level();
        let own_color = target.element.color;
        let children = target.element.children.clone();
        let top = self.top_level_ancestor(code);

        let mut removal = Removal::default();
        removal.record_ids.push(code.to_string());
        removal.record_ids.extend(target.parent_link_annotation_id.clone());

        self.remove_child(&parent, code);
        if was_top_level {
            self.release_color(own_color);
        }

        if recursive {
            for id in self.all_descendants(&ParentRef::Code(code.clone())) {
                if let Some(gone) = self.take_code(&id) {
                    removal.record_ids.push(id.to_string());
                    removal.record_ids.extend(gone.parent_link_annotation_id);
                    removal.removed.push(id);
                }
            }
        } else {
            for child in children {
                self.remove_child(&ParentRef::Code(code.clone()), &child);
                if let Some(c) = self.code_mut(&child) {
                    removal.record_ids.extend(c.parent_link_annotation_id.take());
                }
                let hue = self.fresh_color();
                self.attach(&child, ParentRef::Scheme);
                self.paint_tree(&child, hue);
                removal.promoted.push(child);
            }
        }

        self.take_code(code);
        removal.removed.insert(0, code.clone());

        if let Some(top) = top.filter(|t| t != code) {
            self.repaint_tree(&top);
        }
        Some(removal)
    }

    /// Add a new code under `parent` (or at the root) and color it.
    ///
    /// Returns `false` if the id is already taken or the parent is unknown.
    pub fn insert_code(&mut self, code: Code, parent: Option<&CodeId>) -> bool {
        let id = code.id();
        if id.as_str().is_empty() || self.contains(&id) {
            return false;
        }
        if parent.is_some_and(|p| !self.contains(p)) {
            return false;
        }
        self.push_code(code);
        match parent {
            None => {
                self.remove_child(&ParentRef::Scheme, &id);
                let hue = self.fresh_color();
                self.attach(&id, ParentRef::Scheme);
                self.paint_tree(&id, hue);
            }
            Some(p) => {
                self.remove_child(&ParentRef::Scheme, &id);
                self.attach(&id, ParentRef::Code(p.clone()));
                if let Some(top) = self.top_level_ancestor(&id) {
                    self.repaint_tree(&top);
                }
            }
        }
        true
    }

    /// Record the id of the link record persisting a code's parent edge
    pub fn set_parent_link(&mut self, code: &CodeId, link_id: impl Into<String>) -> bool {
        match self.code_mut(code) {
            Some(c) if !c.is_top_level() => {
                c.parent_link_annotation_id = Some(link_id.into());
                true
            }
            _ => false,
        }
    }

    pub fn rename_code(&mut self, code: &CodeId, name: impl Into<String>) -> bool {
        match self.code_mut(code) {
            Some(c) => {
                c.element.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn update_code(
        &mut self,
        code: &CodeId,
        description: impl Into<String>,
        multivalued: bool,
    ) -> bool {
        match self.code_mut(code) {
            Some(c) => {
                c.description = description.into();
                c.multivalued = multivalued;
                true
            }
            None => false,
        }
    }
}
