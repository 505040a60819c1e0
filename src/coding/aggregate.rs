//! Per-code aggregation of classifying and assessing annotations

use crate::annotation::{classified_code, Annotation, Assessment, Motivation};
use crate::scheme::{ClassificationScheme, CodeId};
use std::collections::BTreeMap;
use tracing::debug;

/// Everything recorded against one code
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CodeEvidence {
    /// Classifying annotations assigning the code
    pub annotations: Vec<Annotation>,
    /// Whether any of them has been assessed
    pub validated: bool,
    /// The assessing annotations, in the order they were found
    pub validating_annotations: Vec<Annotation>,
}

pub type CodingMap = BTreeMap<CodeId, CodeEvidence>;

/// Codings of a document set, for everyone and for the current user
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Codings {
    pub all: CodingMap,
    pub mine: CodingMap,
}

impl Codings {
    /// Evidence for `code` in the selected view
    pub fn evidence(&self, code: &CodeId, mine: bool) -> Option<&CodeEvidence> {
        if mine {
            self.mine.get(code)
        } else {
            self.all.get(code)
        }
    }
}

/// Group classifying annotations by code and attach their assessments.
///
/// Annotations coding something that is no longer in the scheme are left
/// out. Assessments of classifying annotations that are not present change
/// nothing.
pub fn aggregate(
    annotations: &[Annotation],
    scheme: &ClassificationScheme,
    current_user: &str,
) -> Codings {
    let classifying: Vec<&Annotation> = annotations
        .iter()
        .filter(|a| a.motivation == Motivation::Classifying)
        .collect();

    let mut all = group_by_code(classifying.iter().copied(), scheme);
    let mut mine = group_by_code(
        classifying.iter().copied().filter(|a| a.user == current_user),
        scheme,
    );

    for annotation in annotations
        .iter()
        .filter(|a| a.motivation == Motivation::Assessing)
    {
        let Some(assessment) = Assessment::from_annotation(annotation) else {
            debug!(annotation = %annotation.id, "assessing annotation without reference");
            continue;
        };
        let in_all = attach_assessment(&mut all, &assessment.classifying_id, annotation);
        attach_assessment(&mut mine, &assessment.classifying_id, annotation);
        if !in_all {
            debug!(
                annotation = %annotation.id,
                classifying = %assessment.classifying_id,
                "assessment references an unknown classifying annotation"
            );
        }
    }

    Codings { all, mine }
}

fn group_by_code<'a>(
    annotations: impl Iterator<Item = &'a Annotation>,
    scheme: &ClassificationScheme,
) -> CodingMap {
    let mut map = CodingMap::new();
    for annotation in annotations {
        let Some(code) = classified_code(annotation) else {
            continue;
        };
        if !scheme.contains(&code) {
            debug!(
                annotation = %annotation.id,
                code = %code,
                "classifying annotation for unknown code"
            );
            continue;
        }
        map.entry(code).or_default().annotations.push(annotation.clone());
    }
    map
}

fn attach_assessment(map: &mut CodingMap, classifying_id: &str, assessing: &Annotation) -> bool {
    let Some(evidence) = map
        .values_mut()
        .find(|e| e.annotations.iter().any(|a| a.id == classifying_id))
    else {
        return false;
    };
    evidence.validated = true;
    evidence.validating_annotations.push(assessing.clone());
    true
}
