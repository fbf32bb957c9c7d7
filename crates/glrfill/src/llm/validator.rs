//! Pre-delivery review of a filled report.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, info_span, warn};

use super::gemini::{GenerateContent, Part};
use super::{parse_json_object, value_to_text, ReportValidator};
use crate::docx::Document;
use crate::placeholder::FieldMapping;

pub const NO_API_KEY_ISSUE: &str = "No API key available for LLM validation.";

/// Body paragraphs included in the review prompt.
const SNIPPET_PARAGRAPHS: usize = 8;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Ok,
    Modify,
    PlaceholdersLeft,
    #[default]
    Error,
}

impl ValidationStatus {
    /// Unknown strings parse to [`ValidationStatus::Error`].
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "ok" => Self::Ok,
            "modify" => Self::Modify,
            "placeholders_left" => Self::PlaceholdersLeft,
            _ => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub status: ValidationStatus,
    pub issues: Vec<String>,
    pub suggested_mapping: FieldMapping,
    pub suggested_text_edits: FieldMapping,
}

impl ValidationReport {
    pub fn error(issue: impl Into<String>) -> Self {
        Self {
            status: ValidationStatus::Error,
            issues: vec![issue.into()],
            ..Self::default()
        }
    }
}

/// Review through a Gemini model. Without a backend every report comes back
/// as [`ValidationStatus::Error`].
pub struct GeminiValidator {
    backend: Option<Arc<dyn GenerateContent>>,
    model: String,
}

impl GeminiValidator {
    pub fn new(backend: Option<Arc<dyn GenerateContent>>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    fn build_prompt(snippets: &str, mapping: &FieldMapping) -> String {
        let mapping_json = serde_json::to_string_pretty(mapping).unwrap_or_default();
        format!(
            "You are a document QA assistant. Given the field mapping and snippets of a filled \
             document, decide whether the document is ready for delivery. Respond with a valid \
             JSON object only.\n\n\
             Mapping:\n{mapping_json}\n\n\
             Document snippets (header, first paragraphs, footer):\n{snippets}\n\n\
             Keys:\n\
             - status: one of \"ok\", \"modify\", \"placeholders_left\"\n\
             - issues: array of strings describing problems\n\
             - suggested_mapping: object of mapping updates keyed by placeholder name\n\
             - suggested_text_edits: object mapping placeholder names (without brackets) to replacement text\n\n\
             If any placeholder tokens such as {{{{...}}}} or [...] remain, use \"placeholders_left\" and list them. \
             If wording needs polishing, use \"modify\" with suggested_text_edits. Otherwise use \"ok\" with no issues."
        )
    }
}

impl ReportValidator for GeminiValidator {
    fn validate(&self, document: &[u8], mapping: &FieldMapping) -> ValidationReport {
        let _span = info_span!("llm.validate", model = %self.model).entered();
        let Some(backend) = &self.backend else {
            warn!("Validation skipped: no API key configured");
            return ValidationReport::error(NO_API_KEY_ISSUE);
        };

        let snippets = document_snippets(document, SNIPPET_PARAGRAPHS);
        let prompt = Self::build_prompt(&snippets, mapping);
        let report = backend
            .generate(&self.model, vec![Part::text(prompt)])
            .map_err(|e| e.to_string())
            .and_then(|raw| parse_validation_response(&raw));

        match report {
            Ok(report) => {
                info!(status = ?report.status, issues = report.issues.len(), "Validation complete");
                report
            }
            Err(message) => {
                warn!(error = %message, "Validation failed");
                ValidationReport::error(format!("LLM validation failed: {message}"))
            }
        }
    }
}

/// Parses the model's review. Missing keys take their defaults; a missing
/// or unknown status is [`ValidationStatus::Error`].
pub fn parse_validation_response(raw: &str) -> Result<ValidationReport, String> {
    let object = parse_json_object(raw)?;

    let status = object
        .get("status")
        .and_then(|v| v.as_str())
        .map(ValidationStatus::parse)
        .unwrap_or_default();

    let issues = match object.get("issues") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect(),
        Some(serde_json::Value::String(s)) if !s.is_empty() => vec![s.clone()],
        _ => Vec::new(),
    };

    Ok(ValidationReport {
        status,
        issues,
        suggested_mapping: string_map(object.get("suggested_mapping")),
        suggested_text_edits: string_map(object.get("suggested_text_edits")),
    })
}

fn string_map(value: Option<&serde_json::Value>) -> FieldMapping {
    match value {
        Some(serde_json::Value::Object(map)) => map
            .iter()
            .map(|(k, v)| (k.clone(), value_to_text(v)))
            .collect(),
        _ => FieldMapping::new(),
    }
}

/// Short excerpt of a filled document: the first section's header, the first
/// `max_paragraphs` non-empty body paragraphs and the first section's footer.
/// Unreadable documents yield an empty string.
pub fn document_snippets(bytes: &[u8], max_paragraphs: usize) -> String {
    let document = match Document::load(bytes) {
        Ok(document) => document,
        Err(e) => {
            debug!(error = %e, "Cannot read document for validation snippets");
            return String::new();
        }
    };

    let non_empty = |texts: Vec<String>| -> Vec<String> {
        texts.into_iter().filter(|t| !t.is_empty()).collect()
    };

    let mut blocks = Vec::new();
    if document.has_sections() {
        let header = non_empty(document.header_paragraphs(0).into_iter().map(|p| p.text()).collect());
        if !header.is_empty() {
            blocks.push(format!("HEADER:\n{}", header.join("\n")));
        }
    }

    let body = non_empty(document.paragraphs().into_iter().map(|p| p.text()).collect());
    let shown: Vec<&str> = body.iter().take(max_paragraphs).map(String::as_str).collect();
    blocks.push(format!("BODY_SNIPPETS:\n{}", shown.join("\n")));

    if document.has_sections() {
        let footer = non_empty(document.footer_paragraphs(0).into_iter().map(|p| p.text()).collect());
        if !footer.is_empty() {
            blocks.push(format!("FOOTER:\n{}", footer.join("\n")));
        }
    }

    blocks.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::{DocumentBuilder, RunSpec};
    use crate::llm::gemini::GeminiError;
    use crate::llm::tests::ScriptedModel;

    fn filled_document() -> Vec<u8> {
        let mut builder = DocumentBuilder::new()
            .header(vec![RunSpec::new("Insured: Jane Roe")])
            .footer(vec![RunSpec::new("Mortgagee: First Bank")]);
        for i in 1..=10 {
            builder = builder.paragraph(vec![RunSpec::new(format!("Line {i}"))]);
            builder = builder.paragraph(Vec::<RunSpec>::new());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(ValidationStatus::parse("ok"), ValidationStatus::Ok);
        assert_eq!(ValidationStatus::parse(" Modify "), ValidationStatus::Modify);
        assert_eq!(
            ValidationStatus::parse("placeholders_left"),
            ValidationStatus::PlaceholdersLeft
        );
        assert_eq!(ValidationStatus::parse("great"), ValidationStatus::Error);
    }

    #[test]
    fn test_no_backend_is_error_not_ok() {
        let validator = GeminiValidator::new(None, "gemini-2.5-flash");
        let report = validator.validate(&filled_document(), &FieldMapping::new());
        assert_eq!(report.status, ValidationStatus::Error);
        assert_eq!(report.issues, vec![NO_API_KEY_ISSUE.to_string()]);
        assert!(report.suggested_mapping.is_empty());
        assert!(report.suggested_text_edits.is_empty());
    }

    #[test]
    fn test_parse_full_response() {
        let raw = r#"```json
{
  "status": "modify",
  "issues": ["Date format inconsistent"],
  "suggested_mapping": {"DATE_LOSS": "03/02/2024"},
  "suggested_text_edits": {"[INSURED_NAME]": "Jane Roe", "COUNT": 2}
}
```"#;
        let report = parse_validation_response(raw).unwrap();
        assert_eq!(report.status, ValidationStatus::Modify);
        assert_eq!(report.issues, vec!["Date format inconsistent".to_string()]);
        assert_eq!(report.suggested_mapping["DATE_LOSS"], "03/02/2024");
        assert_eq!(report.suggested_text_edits["[INSURED_NAME]"], "Jane Roe");
        assert_eq!(report.suggested_text_edits["COUNT"], "2");
    }

    #[test]
    fn test_parse_missing_keys() {
        let report = parse_validation_response(r#"{"status": "done"}"#).unwrap();
        assert_eq!(report.status, ValidationStatus::Error);
        assert!(report.issues.is_empty());

        let report = parse_validation_response(r#"{"issues": []}"#).unwrap();
        assert_eq!(report.status, ValidationStatus::Error);
    }

    #[test]
    fn test_model_failure_becomes_error_report() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(GeminiError::Http("dns failure".to_string())),
            Ok("not json at all".to_string()),
        ]));
        let validator = GeminiValidator::new(Some(model), "m");

        let report = validator.validate(&filled_document(), &FieldMapping::new());
        assert_eq!(report.status, ValidationStatus::Error);
        assert!(report.issues[0].starts_with("LLM validation failed: "));
        assert!(report.issues[0].contains("dns failure"));

        let report = validator.validate(&filled_document(), &FieldMapping::new());
        assert_eq!(report.status, ValidationStatus::Error);
        assert!(report.issues[0].starts_with("LLM validation failed: "));
    }

    #[test]
    fn test_prompt_includes_mapping_and_snippets() {
        let model = Arc::new(ScriptedModel::replying(r#"{"status": "ok", "issues": []}"#));
        let validator = GeminiValidator::new(Some(model.clone()), "gemini-2.5-flash");
        let mapping = FieldMapping::from([("INSURED_NAME".to_string(), "Jane Roe".to_string())]);

        let report = validator.validate(&filled_document(), &mapping);
        assert_eq!(report.status, ValidationStatus::Ok);

        let prompt = model.prompt(0);
        assert!(prompt.contains("\"INSURED_NAME\": \"Jane Roe\""));
        assert!(prompt.contains("HEADER:\nInsured: Jane Roe"));
        assert!(prompt.contains("{{...}}"));
    }

    #[test]
    fn test_document_snippets() {
        let snippets = document_snippets(&filled_document(), 3);
        assert_eq!(
            snippets,
            "HEADER:\nInsured: Jane Roe\n\n\
             BODY_SNIPPETS:\nLine 1\nLine 2\nLine 3\n\n\
             FOOTER:\nMortgagee: First Bank"
        );
    }

    #[test]
    fn test_snippets_without_sections() {
        let bytes = DocumentBuilder::new()
            .paragraph(vec![RunSpec::new("Only body")])
            .without_sections()
            .build()
            .unwrap();
        assert_eq!(document_snippets(&bytes, 8), "BODY_SNIPPETS:\nOnly body");
    }

    #[test]
    fn test_snippets_of_garbage_is_empty() {
        assert_eq!(document_snippets(b"not a zip", 8), "");
    }
}
