use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Template is not a usable DOCX: {0}")]
    Template(#[from] crate::error::FormatError),

    #[error("Evidence processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("OCR failed: {0}")]
    Ocr(#[from] crate::error::OcrError),

    #[error("Field mapping failed: {0}")]
    Mapping(#[from] crate::error::MappingError),

    #[error("API key could not be resolved: {0}")]
    Secret(#[from] crate::secrets::SecretError),

    #[error("Model client setup failed: {0}")]
    Client(#[from] crate::llm::GeminiError),

    #[error("No evidence documents were provided")]
    NoEvidence,

    #[error("{0} is not configured (no API key available)")]
    NotConfigured(&'static str),
}

/// Problems in optional steps. The document is still delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    /// OCR failed and the PDF text layer was used instead.
    TextLayerUsed { ocr_error: String },
    CleanupFailed { error: String },
    ValidationUnavailable { issues: Vec<String> },
    PlaceholdersRemaining { names: Vec<String> },
}

impl std::fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TextLayerUsed { ocr_error } => {
                write!(f, "OCR failed, PDF text layer used instead ({})", ocr_error)
            }
            Self::CleanupFailed { error } => write!(f, "Content cleanup failed: {}", error),
            Self::ValidationUnavailable { issues } => {
                write!(f, "Validation unavailable: {}", issues.join("; "))
            }
            Self::PlaceholdersRemaining { names } => {
                write!(f, "Placeholders left in output: {}", names.join(", "))
            }
        }
    }
}
