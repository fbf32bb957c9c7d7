use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::llm::gemini::DEFAULT_BASE_URL;
use crate::llm::RetryPolicy;
use crate::placeholder::SubstitutionPolicy;
use crate::secrets::{resolve_secret_optional, SecretError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub substitution: SubstitutionConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
}

fn default_version() -> String {
    "1.0".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            gemini: GeminiConfig::default(),
            ocr: OcrConfig::default(),
            substitution: SubstitutionConfig::default(),
            cleanup: CleanupConfig::default(),
            validation: ValidationConfig::default(),
        }
    }
}

/// Connection settings and model names for the Gemini collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiConfig {
    /// API key given inline. Prefer `api_key_file` or the environment.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env_var")]
    pub api_key_env_var: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_flash_model")]
    pub ocr_model: String,
    #[serde(default = "default_flash_model")]
    pub mapping_model: String,
    #[serde(default = "default_cleanup_model")]
    pub cleanup_model: String,
    #[serde(default = "default_flash_model")]
    pub validation_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_key_env_var() -> Option<String> {
    Some("GEMINI_API_KEY".to_string())
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_flash_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_cleanup_model() -> String {
    "gemini-2.0-flash-001".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_key_file: None,
            api_key_env_var: default_api_key_env_var(),
            base_url: default_base_url(),
            ocr_model: default_flash_model(),
            mapping_model: default_flash_model(),
            cleanup_model: default_cleanup_model(),
            validation_model: default_flash_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GeminiConfig {
    /// The API key from the configured sources, or `None` when none yields one.
    pub fn resolve_api_key(&self) -> Result<Option<SecretString>, SecretError> {
        resolve_secret_optional(
            self.api_key.as_deref(),
            self.api_key_file.as_deref(),
            self.api_key_env_var.as_deref(),
        )
    }

    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    /// Try the local tesseract engine when the model gives up.
    #[serde(default = "default_true")]
    pub local_fallback: bool,
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8000
}

fn default_dpi() -> u32 {
    200
}

fn default_true() -> bool {
    true
}

fn default_languages() -> Vec<String> {
    vec!["eng".to_string()]
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            dpi: default_dpi(),
            local_fallback: true,
            languages: default_languages(),
        }
    }
}

impl OcrConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: std::time::Duration::from_millis(self.initial_backoff_ms),
            max_backoff: std::time::Duration::from_millis(self.max_backoff_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionConfig {
    #[serde(default)]
    pub policy: SubstitutionPolicy,
    /// Run the raw-package pass after saving.
    #[serde(default = "default_true")]
    pub raw_pass: bool,
}

impl Default for SubstitutionConfig {
    fn default() -> Self {
        Self {
            policy: SubstitutionPolicy::default(),
            raw_pass: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupConfig {
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
