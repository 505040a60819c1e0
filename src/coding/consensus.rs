//! Agreement between coders, as mirrored into a review spreadsheet
//!
//! One row per document, one column per facet (top-level code). Each cell
//! records which codes were applied there and how far the coders agree.

use crate::annotation::{classified_code, Agreement, Annotation, Assessment, Motivation};
use crate::scheme::{ClassificationScheme, CodeId, Rgba};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::{debug, info};

/// Where a coding lands in the spreadsheet
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Document the evidence comes from
    pub uri: String,
    /// Top-level code the applied code belongs to
    pub facet: CodeId,
    /// Applied code, for multivalued facets where every code gets its own cell
    pub code: Option<CodeId>,
}

impl CellKey {
    pub fn monovalued(uri: impl Into<String>, facet: CodeId) -> Self {
        Self {
            uri: uri.into(),
            facet,
            code: None,
        }
    }

    pub fn multivalued(uri: impl Into<String>, facet: CodeId, code: CodeId) -> Self {
        Self {
            uri: uri.into(),
            facet,
            code: Some(code),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SlotStatus {
    /// A single coder
    Uncontested,
    /// Several coders, same code
    Corroborated,
    /// Different codes on a monovalued facet
    Conflicting,
    /// A reviewer confirmed the coding
    Validated,
}

impl SlotStatus {
    /// Cell fill used in the spreadsheet
    pub fn fill(&self) -> Rgba {
        match self {
            Self::Uncontested => Rgba::rgb(255, 255, 255),
            Self::Corroborated => Rgba::rgb(255, 255, 0),
            Self::Conflicting => Rgba::rgb(255, 0, 0),
            Self::Validated => Rgba::rgb(0, 255, 0),
        }
    }

    pub fn fill_name(&self) -> &'static str {
        match self {
            Self::Uncontested => "white",
            Self::Corroborated => "yellow",
            Self::Conflicting => "red",
            Self::Validated => "green",
        }
    }
}

impl std::fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uncontested => "uncontested",
            Self::Corroborated => "corroborated",
            Self::Conflicting => "conflicting",
            Self::Validated => "validated",
        };
        f.write_str(s)
    }
}

/// Contents of one spreadsheet cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Distinct codes applied, in first-seen order
    pub codes: Vec<CodeId>,
    pub users: BTreeSet<String>,
    pub annotation_ids: Vec<String>,
    pub status: SlotStatus,
    /// Reviewer who validated the cell by hand
    pub validated_by: Option<String>,
}

impl Cell {
    fn empty() -> Self {
        Self {
            codes: Vec::new(),
            users: BTreeSet::new(),
            annotation_ids: Vec::new(),
            status: SlotStatus::Uncontested,
            validated_by: None,
        }
    }
}

pub type Consensus = BTreeMap<CellKey, Cell>;

/// Work out every cell from the classifying and assessing annotations.
///
/// Codes missing from the scheme are ignored, as in aggregation.
/// An agreeing assessment of any annotation in a cell validates the cell.
pub fn consensus(annotations: &[Annotation], scheme: &ClassificationScheme) -> Consensus {
    let agreed: HashSet<String> = annotations
        .iter()
        .filter(|a| a.motivation == Motivation::Assessing)
        .filter_map(Assessment::from_annotation)
        .filter(|a| a.agreement == Some(Agreement::Agree))
        .map(|a| a.classifying_id)
        .collect();

    let mut cells = Consensus::new();
    let mut validated: HashSet<CellKey> = HashSet::new();

    for annotation in annotations
        .iter()
        .filter(|a| a.motivation == Motivation::Classifying)
    {
        let Some(code) = classified_code(annotation).filter(|c| scheme.contains(c)) else {
            continue;
        };
        let Some(facet) = scheme.top_level_ancestor(&code) else {
            continue;
        };
        let multivalued = scheme.get(&facet).is_some_and(|f| f.multivalued);
        let key = if multivalued {
            CellKey::multivalued(annotation.uri.clone(), facet, code.clone())
        } else {
            CellKey::monovalued(annotation.uri.clone(), facet)
        };

        if agreed.contains(&annotation.id) {
            validated.insert(key.clone());
        }
        let cell = cells.entry(key).or_insert_with(Cell::empty);
        if !cell.codes.contains(&code) {
            cell.codes.push(code);
        }
        cell.users.insert(annotation.user.clone());
        cell.annotation_ids.push(annotation.id.clone());
    }

    for (key, cell) in cells.iter_mut() {
        cell.status = if validated.contains(key) {
            SlotStatus::Validated
        } else if cell.codes.len() > 1 {
            SlotStatus::Conflicting
        } else if cell.users.len() > 1 {
            SlotStatus::Corroborated
        } else {
            SlotStatus::Uncontested
        };
    }
    cells
}

/// Result of a manual validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    Applied,
    /// The reviewer did not confirm overwriting the cell
    Declined,
}

/// The painted spreadsheet, with reviewers' manual validations on top
#[derive(Debug, Clone, Default)]
pub struct SheetMirror {
    cells: Consensus,
    overrides: BTreeMap<CellKey, (CodeId, String)>,
}

impl SheetMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repaint from freshly computed consensus, keeping manual validations
    pub fn paint(&mut self, consensus: Consensus) {
        self.cells = consensus;
        for (key, (code, reviewer)) in &self.overrides {
            let cell = self.cells.entry(key.clone()).or_insert_with(Cell::empty);
            apply_override(cell, code.clone(), reviewer);
        }
        debug!(cells = self.cells.len(), "sheet repainted");
    }

    pub fn cell(&self, key: &CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &Cell)> {
        self.cells.iter()
    }

    /// Count of cells in each status
    pub fn summary(&self) -> BTreeMap<SlotStatus, usize> {
        let mut summary = BTreeMap::new();
        for cell in self.cells.values() {
            *summary.entry(cell.status).or_insert(0) += 1;
        }
        summary
    }

    /// A reviewer settles a cell on `code`.
    ///
    /// Overwriting a conflicting or already validated cell asks `confirm`
    /// first; any other cell is overwritten directly.
    pub fn validate<F>(
        &mut self,
        key: &CellKey,
        code: CodeId,
        reviewer: &str,
        confirm: F,
    ) -> Validation
    where
        F: FnOnce(&Cell) -> bool,
    {
        if let Some(cell) = self.cells.get(key) {
            let guarded = matches!(cell.status, SlotStatus::Conflicting | SlotStatus::Validated);
            if guarded && !confirm(cell) {
                debug!(uri = %key.uri, facet = %key.facet, "validation declined");
                return Validation::Declined;
            }
        }

        let cell = self.cells.entry(key.clone()).or_insert_with(Cell::empty);
        apply_override(cell, code.clone(), reviewer);
        self.overrides.insert(key.clone(), (code, reviewer.to_string()));
        info!(uri = %key.uri, facet = %key.facet, reviewer, "cell validated");
        Validation::Applied
    }
}

fn apply_override(cell: &mut Cell, code: CodeId, reviewer: &str) {
    cell.codes = vec![code];
    cell.status = SlotStatus::Validated;
    cell.validated_by = Some(reviewer.to_string());
}
