//! Collaborators backed by a vision-language model: OCR, field mapping,
//! content cleanup and report validation.

pub mod cleanup;
pub mod gemini;
pub mod mapper;
pub mod ocr;
pub mod validator;

use crate::error::MappingError;
use crate::placeholder::FieldMapping;

pub use cleanup::{extract_sections, CleanupError, GeminiCleaner, ReportSection};
pub use gemini::{GeminiClient, GeminiError, GenerateContent, Part};
pub use mapper::GeminiMapper;
pub use ocr::{GeminiOcr, OcrChain, RetryPolicy};
pub use validator::{GeminiValidator, ValidationReport, ValidationStatus};

/// Maps extracted evidence text onto template fields.
pub trait FieldMapper: Send + Sync {
    /// Returns a value for every name in `fields`; absent data is `""`.
    fn map_fields(&self, text: &str, fields: &[String]) -> Result<FieldMapping, MappingError>;
}

/// Rewrites a filled report so that template boilerplate matches the evidence.
pub trait ContentCleaner: Send + Sync {
    fn clean(&self, report_text: &str, source_text: &str) -> Result<String, CleanupError>;
}

/// Reviews a filled document. Never fails: problems are reported through
/// [`ValidationStatus::Error`].
pub trait ReportValidator: Send + Sync {
    fn validate(&self, document: &[u8], mapping: &FieldMapping) -> ValidationReport;
}

/// Removes a Markdown code fence around a model reply.
pub fn strip_code_fences(response: &str) -> &str {
    let mut text = response.trim();
    if text.starts_with("```") {
        text = match text.find('\n') {
            Some(idx) => &text[idx + 1..],
            None => text.trim_start_matches('`'),
        };
        text = text.trim_end();
        if let Some(rest) = text.strip_suffix("```") {
            text = rest;
        }
    }
    text.trim()
}

/// Finds the first balanced JSON object in a response that has prose around it.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses a model reply as a JSON object, tolerating code fences and
/// surrounding prose.
pub(crate) fn parse_json_object(
    response: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, String> {
    let stripped = strip_code_fences(response);
    let value = match serde_json::from_str::<serde_json::Value>(stripped) {
        Ok(value) => value,
        Err(first) => match extract_json_object(stripped) {
            Some(object) => serde_json::from_str(object).map_err(|e| e.to_string())?,
            None => return Err(first.to_string()),
        },
    };
    match value {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(format!("expected a JSON object, got {}", json_kind(&other))),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Renders a JSON value as replacement text.
pub(crate) fn value_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
