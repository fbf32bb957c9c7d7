use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use super::gemini::{GeminiError, GenerateContent, Part};
use super::{parse_json_object, value_to_text, FieldMapper};
use crate::error::MappingError;
use crate::placeholder::FieldMapping;
use crate::sanitize::{truncate_for_log, MAX_LOGGED_CHARS};

/// Field mapping through a Gemini model.
pub struct GeminiMapper {
    backend: Arc<dyn GenerateContent>,
    model: String,
}

impl GeminiMapper {
    pub fn new(backend: Arc<dyn GenerateContent>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    fn build_prompt(text: &str, fields: &[String]) -> String {
        let names = serde_json::to_string(fields).unwrap_or_default();
        format!(
            "From the extracted report text below, fill a value for each placeholder.\n\
             Placeholders: {names}\n\n\
             Return a valid JSON object only, mapping each placeholder name to its extracted value. \
             If a value is missing, use an empty string. Keys must match the placeholder names \
             exactly and must not include braces or brackets.\n\n\
             Extracted text:\n{text}\n\n\
             Return only the JSON object, no other text."
        )
    }
}

impl FieldMapper for GeminiMapper {
    fn map_fields(&self, text: &str, fields: &[String]) -> Result<FieldMapping, MappingError> {
        let _span = info_span!("llm.map_fields", fields = fields.len(), model = %self.model).entered();
        if fields.is_empty() {
            debug!("No placeholders to map");
            return Ok(FieldMapping::new());
        }

        let prompt = Self::build_prompt(text, fields);
        let raw = self
            .backend
            .generate(&self.model, vec![Part::text(prompt)])
            .map_err(|e| match e {
                GeminiError::EmptyResponse => {
                    MappingError::Request("empty response from model".to_string())
                }
                other => MappingError::Request(other.to_string()),
            })?;

        let mapping = parse_mapping_response(&raw, fields)?;
        let filled = mapping.values().filter(|v| !v.is_empty()).count();
        info!(filled, total = fields.len(), "Fields mapped");
        Ok(mapping)
    }
}

/// Builds a mapping that contains exactly `fields`. Keys the model invented
/// are dropped; fields it left out map to `""`.
pub fn parse_mapping_response(raw: &str, fields: &[String]) -> Result<FieldMapping, MappingError> {
    let object = parse_json_object(raw).map_err(|message| {
        warn!(response = %truncate_for_log(raw, MAX_LOGGED_CHARS), "Unparseable mapping response");
        MappingError::Parse {
            message,
            raw_response: raw.to_string(),
        }
    })?;

    let extra = object
        .keys()
        .filter(|k| !fields.iter().any(|f| f == *k))
        .count();
    if extra > 0 {
        debug!(extra, "Dropping keys that are not template fields");
    }

    Ok(fields
        .iter()
        .map(|field| {
            let value = object.get(field).map(value_to_text).unwrap_or_default();
            (field.clone(), value)
        })
        .collect())
}
