//! ClassificationScheme: the root of the code tree
//!
//! The scheme owns every code in a flat arena keyed by id. Parent/child
//! structure is expressed through [`ParentRef`] back references and ordered
//! child lists, so there are no ownership cycles to manage.

use super::code::Code;
use super::color::{ColorSettings, HuePalette, Palette, Rgba};
use super::element::{CodeId, GuideElement, GuideNode, ParentRef};
use crate::annotation::{Annotation, CodeRecord, LinkRecord};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// The classification scheme (codebook) of one group
#[derive(Debug, Clone)]
pub struct ClassificationScheme {
    /// Root element; its children are the top-level codes
    pub element: GuideElement,
    codes: HashMap<CodeId, Code>,
    /// Insertion order of `codes`
    order: Vec<CodeId>,
    /// Unused top-level hues, popped from the back
    color_pool: Vec<Rgba>,
    palette: Arc<dyn Palette>,
    settings: ColorSettings,
    dangling_links: Vec<String>,
}

impl ClassificationScheme {
    /// Create an empty scheme
    pub fn new(palette: Arc<dyn Palette>, settings: ColorSettings) -> Self {
        Self {
            element: GuideElement::new("", "Classification scheme"),
            codes: HashMap::new(),
            order: Vec::new(),
            color_pool: Vec::new(),
            palette,
            settings,
            dangling_links: Vec::new(),
        }
    }

    /// Set the root's display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.element.name = name.into();
        self
    }

    /// Rebuild the tree from the stored codebook and linking records.
    ///
    /// Codebook records without a code name are skipped. Linking records whose
    /// parent or child is unknown, whose child already has a parent, or that
    /// would close a cycle are dropped and listed in [`Self::dangling_links`].
    pub fn from_records(
        codebook_records: &[Annotation],
        linking_records: &[Annotation],
        palette: Arc<dyn Palette>,
        settings: ColorSettings,
    ) -> Self {
        let mut scheme = Self::new(palette, settings);

        for record in codebook_records {
            match CodeRecord::from_annotation(record) {
                Some(parsed) if !parsed.id.as_str().is_empty() => {
                    let id = parsed.id.clone();
                    if scheme.codes.contains_key(&id) {
                        debug!(code_id = %id, "duplicate codebook record ignored");
                        continue;
                    }
                    scheme.push_code(Code::from_record(&parsed));
                }
                _ => debug!(
                    annotation_id = %record.id,
                    "skipping codebook record without a code name"
                ),
            }
        }

        for record in linking_records {
            let wired = LinkRecord::from_annotation(record)
                .map(|link| scheme.wire_link(&link))
                .unwrap_or(false);
            if !wired {
                debug!(annotation_id = %record.id, "dropping dangling linking record");
                scheme.dangling_links.push(record.id.clone());
            }
        }

        scheme.assign_initial_colors();
        scheme
    }

    // === Lookup ===

    pub fn get(&self, id: &CodeId) -> Option<&Code> {
        self.codes.get(id)
    }

    pub fn contains(&self, id: &CodeId) -> bool {
        self.codes.contains_key(id)
    }

    /// All codes, flattened, in insertion order
    pub fn codes(&self) -> impl Iterator<Item = &Code> {
        self.order.iter().filter_map(|id| self.codes.get(id))
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// First code with the given display name
    pub fn find_by_name(&self, name: &str) -> Option<&Code> {
        self.codes().find(|c| c.name() == name)
    }

    /// Codes without a parent code, in display order
    pub fn top_level_codes(&self) -> impl Iterator<Item = &Code> {
        self.element.children.iter().filter_map(|id| self.codes.get(id))
    }

    /// Direct children of a code, in order
    pub fn children_of(&self, id: &CodeId) -> impl Iterator<Item = &Code> {
        self.codes
            .get(id)
            .map(|c| c.element.children.as_slice())
            .unwrap_or(&[])
            .iter()
            .filter_map(|child| self.codes.get(child))
    }

    /// Ids of linking records dropped during reconstruction
    pub fn dangling_links(&self) -> &[String] {
        &self.dangling_links
    }

    pub fn settings(&self) -> ColorSettings {
        self.settings
    }

    /// Resolve a parent reference to a tree node
    pub fn node(&self, parent: &ParentRef) -> Option<GuideNode<'_>> {
        match parent {
            ParentRef::Scheme => Some(GuideNode::Scheme(self)),
            ParentRef::Code(id) => self.codes.get(id).map(GuideNode::Code),
        }
    }

    // === Tree primitives ===

    /// Append `child` to `parent`'s children and point it back at `parent`.
    ///
    /// No-op returning `false` when either node is unknown or when `child`
    /// is `parent` itself or one of its ancestors.
    pub fn add_child(&mut self, parent: &ParentRef, child: &CodeId) -> bool {
        if !self.codes.contains_key(child) || self.node(parent).is_none() {
            return false;
        }
        if let ParentRef::Code(p) = parent {
            if p == child || self.is_ancestor_of(child, p) {
                debug!(parent = %p, child = %child, "add_child rejected: would create a cycle");
                return false;
            }
        }
        if let Some(old) = self.codes.get(child).and_then(|c| c.element.parent.clone()) {
            self.remove_child(&old, child);
        }
        self.attach(child, parent.clone());
        true
    }

    /// Remove `child` from `parent`'s children by identity.
    ///
    /// The child stays in the arena, detached, until it is attached elsewhere
    /// or deleted.
    pub fn remove_child(&mut self, parent: &ParentRef, child: &CodeId) -> bool {
        let removed = self
            .element_mut(parent)
            .map(|e| e.drop_child(child))
            .unwrap_or(false);
        if removed {
            if let Some(code) = self.codes.get_mut(child) {
                code.element.parent = None;
            }
        }
        removed
    }

    /// True if `ancestor` lies strictly above `node`
    pub fn is_ancestor_of(&self, ancestor: &CodeId, node: &CodeId) -> bool {
        let mut current = self.codes.get(node).and_then(|c| c.parent_code());
        let mut steps = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            steps += 1;
            if steps > self.codes.len() {
                break;
            }
            current = self.codes.get(id).and_then(|c| c.parent_code());
        }
        false
    }

    /// True if `node` lies strictly below `ancestor`
    pub fn is_descendant_of(&self, node: &CodeId, ancestor: &CodeId) -> bool {
        self.is_ancestor_of(ancestor, node)
    }

    /// Every code below `node`, depth-first in child order.
    ///
    /// Returns a snapshot; mutating the tree does not affect it.
    pub fn all_descendants(&self, node: &ParentRef) -> Vec<CodeId> {
        let Some(start) = self.node(node) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<CodeId> = start.children().iter().rev().cloned().collect();
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(code) = self.codes.get(&id) {
                stack.extend(code.element.children.iter().rev().cloned());
            }
            out.push(id);
        }
        out
    }

    /// The top-level code whose subtree contains `id` (possibly `id` itself)
    pub fn top_level_ancestor(&self, id: &CodeId) -> Option<CodeId> {
        let mut current = self.codes.get(id)?;
        let mut steps = 0;
        while let Some(parent) = current.parent_code() {
            current = self.codes.get(parent)?;
            steps += 1;
            if steps > self.codes.len() {
                return None;
            }
        }
        Some(current.id())
    }

    // === Colors ===

    /// Give every top-level code a palette hue and ramp its subtree
    fn assign_initial_colors(&mut self) {
        let tops = self.element.children.clone();
        let mut colors = self.palette.distinguishable_colors(tops.len());
        colors.reverse();
        self.color_pool = colors;
        for top in tops {
            let hue = self.fresh_color();
            self.paint_tree(&top, hue);
        }
    }

    /// Color `top` with `hue` at minimum alpha and ramp its descendants
    pub(crate) fn paint_tree(&mut self, top: &CodeId, hue: Rgba) {
        let settings = self.settings;
        if let Some(code) = self.codes.get_mut(top) {
            code.element.color = hue.with_alpha(settings.min_alpha);
        }
        let descendants = self.all_descendants(&ParentRef::Code(top.clone()));
        let total = descendants.len();
        for (position, id) in descendants.iter().enumerate() {
            if let Some(code) = self.codes.get_mut(id) {
                code.element.color = hue.with_alpha(settings.ramp(position, total));
            }
        }
    }

    /// Recompute the alpha ramp below `top`, keeping its hue
    pub(crate) fn repaint_tree(&mut self, top: &CodeId) {
        if let Some(hue) = self.codes.get(top).map(|c| c.element.color) {
            self.paint_tree(top, hue);
        }
    }

    /// Next unused top-level hue, replenishing the pool from the palette
    pub(crate) fn fresh_color(&mut self) -> Rgba {
        let in_use: Vec<Rgba> = self.top_level_codes().map(|c| c.element.color).collect();
        while let Some(color) = self.color_pool.pop() {
            if !in_use.iter().any(|u| u.same_hue(&color)) {
                return color;
            }
        }

        let mut size = in_use.len() + 1;
        for _ in 0..4 {
            let mut candidates: Vec<Rgba> = self
                .palette
                .distinguishable_colors(size)
                .into_iter()
                .filter(|c| !in_use.iter().any(|u| u.same_hue(c)))
                .collect();
            if let Some(first) = candidates.first().copied() {
                candidates.remove(0);
                candidates.reverse();
                self.color_pool = candidates;
                return first;
            }
            size *= 2;
        }
        Rgba::default()
    }

    /// Return a top-level hue to the pool once no code uses it
    pub(crate) fn release_color(&mut self, color: Rgba) {
        let hue = color.with_alpha(1.0);
        if !self.color_pool.iter().any(|c| c.same_hue(&hue)) {
            self.color_pool.push(hue);
        }
    }

    // === Arena maintenance ===

    /// Add a code to the arena as a top-level code (uncolored)
    pub(crate) fn push_code(&mut self, code: Code) {
        let id = code.id();
        self.order.push(id.clone());
        self.codes.insert(id.clone(), code);
        self.attach(&id, ParentRef::Scheme);
    }

    /// Drop a code from the arena; it must already be detached
    pub(crate) fn take_code(&mut self, id: &CodeId) -> Option<Code> {
        self.order.retain(|o| o != id);
        self.codes.remove(id)
    }

    pub(crate) fn code_mut(&mut self, id: &CodeId) -> Option<&mut Code> {
        self.codes.get_mut(id)
    }

    /// Push onto the parent's child list and set the back reference
    pub(crate) fn attach(&mut self, child: &CodeId, parent: ParentRef) {
        if let Some(e) = self.element_mut(&parent) {
            e.push_child(child.clone());
        }
        if let Some(code) = self.codes.get_mut(child) {
            code.set_parent(parent);
        }
    }

    fn element_mut(&mut self, parent: &ParentRef) -> Option<&mut GuideElement> {
        match parent {
            ParentRef::Scheme => Some(&mut self.element),
            ParentRef::Code(id) => self.codes.get_mut(id).map(|c| &mut c.element),
        }
    }

    /// Wire one parent/child edge during reconstruction
    fn wire_link(&mut self, link: &LinkRecord) -> bool {
        let (Some(_), Some(child)) = (self.codes.get(&link.parent), self.codes.get(&link.child))
        else {
            return false;
        };
        if !child.is_top_level() || link.parent == link.child {
            return false;
        }
        if self.is_descendant_of(&link.parent, &link.child) {
            return false;
        }
        self.remove_child(&ParentRef::Scheme, &link.child);
        self.attach(&link.child, ParentRef::Code(link.parent.clone()));
        if let Some(code) = self.codes.get_mut(&link.child) {
            code.parent_link_annotation_id = Some(link.id.clone()).filter(|id| !id.is_empty());
        }
        true
    }
}

impl Default for ClassificationScheme {
    fn default() -> Self {
        Self::new(Arc::new(HuePalette::new()), ColorSettings::default())
    }
}
