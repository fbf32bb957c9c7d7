//! Blocking client for the Gemini `generateContent` REST endpoint.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info_span};

use crate::sanitize::{truncate_for_log, MAX_LOGGED_CHARS};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Gemini API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode Gemini response: {0}")]
    Decode(String),

    #[error("Gemini response contained no text")]
    EmptyResponse,
}

/// One part of a request or response message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    /// Binary content, base64-encoded for the wire.
    pub fn inline(mime_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64::engine::general_purpose::STANDARD.encode(data),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Default, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

/// Something that can answer a single-turn prompt. Implemented by
/// [`GeminiClient`]; tests substitute canned responses.
pub trait GenerateContent: Send + Sync {
    fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, GeminiError>;
}

#[derive(Clone)]
pub struct GeminiClient {
    inner: Arc<GeminiClientInner>,
}

struct GeminiClientInner {
    http: reqwest::blocking::Client,
    base_url: String,
    api_key: SecretString,
}

impl GeminiClient {
    pub fn new(api_key: SecretString, base_url: &str, timeout: Duration) -> Result<Self, GeminiError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GeminiError::Client(e.to_string()))?;
        Ok(Self {
            inner: Arc::new(GeminiClientInner {
                http,
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.inner.base_url, model)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl GenerateContent for GeminiClient {
    fn generate(&self, model: &str, parts: Vec<Part>) -> Result<String, GeminiError> {
        let _span = info_span!("gemini.generate", model).entered();
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
        };

        let response = self
            .inner
            .http
            .post(self.endpoint(model))
            .header("x-goog-api-key", self.inner.api_key.expose_secret())
            .json(&request)
            .send()
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| GeminiError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(GeminiError::Status {
                status: status.as_u16(),
                body: truncate_for_log(&body, MAX_LOGGED_CHARS),
            });
        }

        let text = response_text(&body)?;
        debug!(chars = text.len(), "Gemini response received");
        Ok(text)
    }
}

/// Concatenated text parts of the first candidate.
pub fn response_text(body: &str) -> Result<String, GeminiError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| GeminiError::Decode(e.to_string()))?;
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(GeminiError::EmptyResponse);
    }
    Ok(text)
}
