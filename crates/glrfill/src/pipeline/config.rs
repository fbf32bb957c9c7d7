use crate::config::Config;
use crate::placeholder::SubstitutionPolicy;

/// The switches the pipeline reads; collaborators are configured separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub policy: SubstitutionPolicy,
    pub raw_pass: bool,
    pub cleanup_enabled: bool,
    pub validation_enabled: bool,
    /// Use the PDF's own text layer when OCR gives up.
    pub text_layer_fallback: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            policy: SubstitutionPolicy::default(),
            raw_pass: true,
            cleanup_enabled: false,
            validation_enabled: true,
            text_layer_fallback: true,
        }
    }
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.substitution.policy,
            raw_pass: config.substitution.raw_pass,
            cleanup_enabled: config.cleanup.enabled,
            validation_enabled: config.validation.enabled,
            text_layer_fallback: config.ocr.local_fallback,
        }
    }
}
