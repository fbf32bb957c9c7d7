//! Report cleanup: removes leftover template instructions from a filled
//! report, and splits report text into its GLR sections.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, info_span};

use super::gemini::{GeminiError, GenerateContent, Part};
use super::ContentCleaner;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("Cleanup request failed: {0}")]
    Request(String),

    #[error("Cleanup returned no text")]
    EmptyResponse,
}

/// Headings that open a section of a General Loss Report.
pub const GLR_SECTION_HEADERS: &[&str] = &[
    "General Loss Report",
    "Date of Loss",
    "Insurable Interest",
    "Dwelling Description",
    "Property Condition",
    "Inspection",
    "Dwelling",
    "Roof",
    "Front Elevation",
    "Right Elevation",
    "Rear Elevation",
    "Back Elevation",
    "Left Elevation",
    "Interior",
    "Other Structures",
    "Contents",
    "Review",
    "Supplement",
    "Priors",
    "Code Items",
    "Overhead & Profit",
    "MICA/QA Assist",
    "Mortgagee Information",
    "Cause and Origin",
    "Subrogation",
    "Salvage",
];

const CLEANUP_INSTRUCTIONS: &str = "You are an insurance report specialist. The report below has its \
placeholders filled, but still contains template instructions, sections that do not apply to this loss, \
\"Choose an item.\" dropdown leftovers and generic option lists in parentheses.\n\
Using the inspection data, remove sections that do not apply, replace or delete every \"Choose an item.\", \
replace generic options with the actual values, drop instructional text in parentheses or angle brackets, \
merge duplicated sections and remove extra blank lines. Keep the section headings.\n\
Return only the cleaned report text without commentary.";

/// Cleanup through a Gemini model.
pub struct GeminiCleaner {
    backend: Arc<dyn GenerateContent>,
    model: String,
}

impl GeminiCleaner {
    pub fn new(backend: Arc<dyn GenerateContent>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

impl ContentCleaner for GeminiCleaner {
    fn clean(&self, report_text: &str, source_text: &str) -> Result<String, CleanupError> {
        let _span = info_span!("llm.cleanup", model = %self.model).entered();
        let prompt = format!(
            "{CLEANUP_INSTRUCTIONS}\n\nCURRENT REPORT:\n{report_text}\n\nINSPECTION DATA:\n{source_text}"
        );
        let cleaned = match self.backend.generate(&self.model, vec![Part::text(prompt)]) {
            Ok(text) => text.trim().to_string(),
            Err(GeminiError::EmptyResponse) => return Err(CleanupError::EmptyResponse),
            Err(e) => return Err(CleanupError::Request(e.to_string())),
        };
        if cleaned.is_empty() {
            return Err(CleanupError::EmptyResponse);
        }
        info!(
            before = report_text.len(),
            after = cleaned.len(),
            "Report cleaned"
        );
        Ok(cleaned)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub heading: &'static str,
    pub body: String,
}

/// Splits report text at lines that are exactly a known heading (ignoring
/// case and surrounding whitespace). Text before the first heading is
/// dropped. A heading seen twice keeps the position of its first occurrence
/// and the body of its last.
pub fn extract_sections(text: &str) -> Vec<ReportSection> {
    let mut sections: Vec<ReportSection> = Vec::new();
    let mut current: Option<(&'static str, Vec<&str>)> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        let heading = GLR_SECTION_HEADERS
            .iter()
            .copied()
            .find(|h| h.eq_ignore_ascii_case(trimmed));
        match heading {
            Some(heading) => {
                close(current.take(), &mut sections);
                current = Some((heading, Vec::new()));
            }
            None => {
                if let Some((_, lines)) = current.as_mut() {
                    lines.push(line);
                }
            }
        }
    }
    close(current, &mut sections);

    sections
}

fn close(current: Option<(&'static str, Vec<&str>)>, sections: &mut Vec<ReportSection>) {
    if let Some((heading, lines)) = current {
        let body = lines.join("\n").trim().to_string();
        match sections.iter_mut().find(|s| s.heading == heading) {
            Some(existing) => existing.body = body,
            None => sections.push(ReportSection { heading, body }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::ScriptedModel;

    #[test]
    fn test_extract_sections() {
        let text = "Claim 123\n\
                    GENERAL LOSS REPORT\n\
                    Prepared for Acme Mutual\n\
                    \n\
                    Date of Loss\n  03/02/2024  \n\
                    roof\nHail damage to north slope.\nGutters dented.\n";
        let sections = extract_sections(text);

        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].heading, "General Loss Report");
        assert_eq!(sections[0].body, "Prepared for Acme Mutual");
        assert_eq!(sections[1].heading, "Date of Loss");
        assert_eq!(sections[1].body, "03/02/2024");
        assert_eq!(sections[2].heading, "Roof");
        assert_eq!(sections[2].body, "Hail damage to north slope.\nGutters dented.");
    }

    #[test]
    fn test_heading_must_be_whole_line() {
        let sections = extract_sections("Roof\nThe Roof was inspected.\nRoof damage noted");
        assert_eq!(sections.len(), 1);
        assert_eq!(
            sections[0].body,
            "The Roof was inspected.\nRoof damage noted"
        );
    }

    #[test]
    fn test_repeated_heading_keeps_last_body() {
        let sections = extract_sections("Salvage\nfirst\nInterior\nwalls\nSalvage\nsecond");
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0].heading, "Salvage");
        assert_eq!(sections[0].body, "second");
        assert_eq!(sections[1].body, "walls");
    }

    #[test]
    fn test_no_headings() {
        assert!(extract_sections("just some notes").is_empty());
    }

    #[test]
    fn test_cleaner_sends_both_texts() {
        let model = Arc::new(ScriptedModel::replying("\nCleaned report\n"));
        let cleaner = GeminiCleaner::new(model.clone(), "gemini-2.0-flash-001");
        let cleaned = cleaner
            .clean("Roof type: Choose an item.", "30 year laminate shingles")
            .unwrap();
        assert_eq!(cleaned, "Cleaned report");

        let prompt = model.prompt(0);
        assert!(prompt.contains("Roof type: Choose an item."));
        assert!(prompt.contains("30 year laminate shingles"));
        assert_eq!(model.calls.lock().unwrap()[0].0, "gemini-2.0-flash-001");
    }

    #[test]
    fn test_cleaner_errors() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(GeminiError::EmptyResponse),
            Err(GeminiError::Http("timeout".to_string())),
        ]));
        let cleaner = GeminiCleaner::new(model, "m");
        assert!(matches!(cleaner.clean("a", "b"), Err(CleanupError::EmptyResponse)));
        assert!(matches!(cleaner.clean("a", "b"), Err(CleanupError::Request(_))));
    }
}
