//! Run-preserving substitution.
//!
//! Tokens that sit inside a single run are replaced in that run so its
//! formatting survives. Tokens that Word split over several runs can only be
//! replaced on the assembled paragraph text; such paragraphs are rebuilt as a
//! single run carrying the first run's formatting.

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use super::token::{contains_token, replace_field, substitute_text};
use super::FieldMapping;
use crate::docx::{Document, ParagraphMut, Region, Scope};

/// How a paragraph decides between in-place and rebuilt substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubstitutionPolicy {
    /// Any intra-run replacement claims the paragraph; a token split across
    /// runs in the same paragraph is then left in place.
    FastPathFirst,
    /// Compare the per-run result with the whole-paragraph result and rebuild
    /// only when they differ.
    #[default]
    Unified,
}

/// What happened to one paragraph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphOutcome {
    Untouched,
    /// Runs rewritten in place, formatting kept.
    InPlace { runs: usize },
    /// All runs merged into one.
    Rebuilt,
}

/// Counters for one fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillStats {
    pub paragraphs_visited: usize,
    pub paragraphs_in_place: usize,
    pub runs_rewritten: usize,
    pub paragraphs_rebuilt: usize,
}

impl FillStats {
    pub fn paragraphs_changed(&self) -> usize {
        self.paragraphs_in_place + self.paragraphs_rebuilt
    }

    fn record(&mut self, outcome: ParagraphOutcome) {
        self.paragraphs_visited += 1;
        match outcome {
            ParagraphOutcome::Untouched => {}
            ParagraphOutcome::InPlace { runs } => {
                self.paragraphs_in_place += 1;
                self.runs_rewritten += runs;
            }
            ParagraphOutcome::Rebuilt => self.paragraphs_rebuilt += 1,
        }
    }
}

/// Replaces every mapped token in body, tables, headers and footers.
pub fn fill_document(
    doc: &mut Document,
    mapping: &FieldMapping,
    policy: SubstitutionPolicy,
) -> FillStats {
    let _span = info_span!("fill_document", fields = mapping.len(), ?policy).entered();
    let mut stats = FillStats::default();
    if mapping.is_empty() {
        return stats;
    }

    doc.for_each_paragraph_mut(Scope::All, |region, paragraph| {
        let outcome = fill_paragraph(paragraph, mapping, policy);
        if outcome != ParagraphOutcome::Untouched {
            log_outcome(region, outcome);
        }
        stats.record(outcome);
        outcome != ParagraphOutcome::Untouched
    });

    debug!(
        visited = stats.paragraphs_visited,
        in_place = stats.paragraphs_in_place,
        rebuilt = stats.paragraphs_rebuilt,
        "Substitution finished"
    );
    stats
}

fn log_outcome(region: Region, outcome: ParagraphOutcome) {
    debug!(?region, ?outcome, "Paragraph substituted");
}

/// Substitutes one paragraph.
pub fn fill_paragraph(
    paragraph: &mut ParagraphMut<'_>,
    mapping: &FieldMapping,
    policy: SubstitutionPolicy,
) -> ParagraphOutcome {
    match policy {
        SubstitutionPolicy::FastPathFirst => fill_fast_path_first(paragraph, mapping),
        SubstitutionPolicy::Unified => fill_unified(paragraph, mapping),
    }
}

fn fill_fast_path_first(paragraph: &mut ParagraphMut<'_>, mapping: &FieldMapping) -> ParagraphOutcome {
    let runs = paragraph.run_texts();
    let mut rewritten = 0;

    for (index, original) in runs.iter().enumerate() {
        let mut text = original.clone();
        for (key, value) in mapping {
            let name = key.trim();
            if !name.is_empty() && contains_token(&text, name) {
                text = replace_field(&text, name, value);
            }
        }
        if text != *original {
            paragraph.set_run_text(index, &text);
            rewritten += 1;
        }
    }

    if rewritten > 0 {
        return ParagraphOutcome::InPlace { runs: rewritten };
    }
    rebuild_if_changed(paragraph, &runs.concat(), mapping)
}

fn fill_unified(paragraph: &mut ParagraphMut<'_>, mapping: &FieldMapping) -> ParagraphOutcome {
    let runs = paragraph.run_texts();
    let assembled = runs.concat();
    let full = substitute_text(&assembled, mapping);
    if full == assembled {
        return ParagraphOutcome::Untouched;
    }

    let per_run: Vec<String> = runs
        .iter()
        .map(|text| substitute_text(text, mapping))
        .collect();
    if per_run.concat() != full {
        rebuild(paragraph, &full);
        return ParagraphOutcome::Rebuilt;
    }

    let mut rewritten = 0;
    for (index, (before, after)) in runs.iter().zip(&per_run).enumerate() {
        if before != after {
            paragraph.set_run_text(index, after);
            rewritten += 1;
        }
    }
    ParagraphOutcome::InPlace { runs: rewritten }
}

fn rebuild_if_changed(
    paragraph: &mut ParagraphMut<'_>,
    assembled: &str,
    mapping: &FieldMapping,
) -> ParagraphOutcome {
    let replaced = substitute_text(assembled, mapping);
    if replaced == assembled {
        return ParagraphOutcome::Untouched;
    }
    rebuild(paragraph, &replaced);
    ParagraphOutcome::Rebuilt
}

fn rebuild(paragraph: &mut ParagraphMut<'_>, text: &str) {
    let format = paragraph
        .as_paragraph()
        .runs()
        .next()
        .map(|run| run.format())
        .unwrap_or_default();
    paragraph.replace_runs(text, &format);
}
