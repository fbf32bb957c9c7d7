//! Fills insurance General Loss Report DOCX templates from scanned evidence.

pub mod config;
pub mod docx;
pub mod error;
pub mod llm;
pub mod pipeline;
pub mod placeholder;
pub mod processor;
pub mod sanitize;
pub mod secrets;

pub use config::{load_config, Config};
pub use docx::Document;
pub use error::{ConfigError, FormatError, GlrError, MappingError, OcrError, ProcessError, Result};
pub use pipeline::{FillReport, FillRequest, Pipeline, PipelineConfig, PipelineError};
pub use placeholder::{FieldMapping, SubstitutionPolicy};
pub use secrets::{resolve_secret, resolve_secret_optional, SecretError};
