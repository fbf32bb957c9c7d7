use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GlrError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document format error: {0}")]
    Format(#[from] FormatError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// The input bytes are not a usable DOCX package.
#[derive(Error, Debug)]
pub enum FormatError {
    #[error("Not a valid DOCX package: {0}")]
    InvalidPackage(String),

    #[error("Package is missing required part '{0}'")]
    MissingPart(String),

    #[error("Failed to read part '{part}': {reason}")]
    ReadPart { part: String, reason: String },

    #[error("Malformed XML in part '{part}': {reason}")]
    MalformedXml { part: String, reason: String },

    #[error("Failed to write DOCX package: {0}")]
    WritePackage(String),
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process image: {0}")]
    ImageProcessing(String),
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("OCR request failed: {0}")]
    Request(String),

    #[error("OCR returned no text")]
    EmptyResponse,

    #[error("OCR engine failed: {0}")]
    Engine(String),

    #[error("OCR engine not configured: {0}")]
    NotConfigured(String),

    #[error("Local OCR fallback unavailable: missing dependency '{dependency}' ({hint})")]
    MissingDependency {
        dependency: &'static str,
        hint: &'static str,
    },

    #[error("OCR failed after {attempts} attempt(s): {last_error}; fallbacks: {fallbacks}")]
    Exhausted {
        attempts: u32,
        last_error: String,
        fallbacks: String,
    },
}

#[derive(Error, Debug)]
pub enum MappingError {
    #[error("Mapping request failed: {0}")]
    Request(String),

    #[error("Failed to parse mapping response: {message}\nResponse: {raw_response}")]
    Parse {
        message: String,
        raw_response: String,
    },
}

pub type Result<T> = std::result::Result<T, GlrError>;
