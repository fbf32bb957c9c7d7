//! Test harness for isolated pipeline runs.
//!
//! The `TestHarness` wires a `Pipeline` to in-process fakes so no network,
//! no `pdftoppm` and no tesseract are needed:
//! - the rasterizer emits one PNG-tagged page per PDF page, carrying that
//!   page's text layer after the signature
//! - the OCR engine reads that text back
//! - the mapper picks `FIELD: value` lines out of the extracted text

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use glrfill::error::{MappingError, OcrError, ProcessError};
use glrfill::llm::{
    FieldMapper, OcrChain, ReportValidator, RetryPolicy, ValidationReport, ValidationStatus,
};
use glrfill::pipeline::{Pipeline, PipelineConfig};
use glrfill::placeholder::FieldMapping;
use glrfill::processor::pdf::extract_page_texts;
use glrfill::processor::{OcrEngine, PageImage, PdfRasterizer};

use super::builders::PNG_PAGE;

/// Renders each PDF page as the PNG signature followed by the page text.
pub struct TextCarryingRasterizer;

impl PdfRasterizer for TextCarryingRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, ProcessError> {
        extract_page_texts(pdf)?
            .into_iter()
            .enumerate()
            .map(|(i, text)| {
                let mut data = PNG_PAGE.to_vec();
                data.extend_from_slice(text.as_bytes());
                PageImage::new(i + 1, data)
            })
            .collect()
    }
}

/// Reads back the text the rasterizer stored in the page.
pub struct CarriedTextOcr;

impl OcrEngine for CarriedTextOcr {
    fn name(&self) -> &str {
        "carried-text"
    }

    fn extract_text(&self, image: &PageImage) -> Result<String, OcrError> {
        let text = image.data.get(PNG_PAGE.len()..).unwrap_or_default();
        Ok(String::from_utf8_lossy(text).into_owned())
    }
}

/// An OCR engine that always fails.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn extract_text(&self, _image: &PageImage) -> Result<String, OcrError> {
        Err(OcrError::Request("503 Service Unavailable".to_string()))
    }
}

/// Maps `FIELD: value` lines of the evidence; unknown fields get `""`.
pub struct LabelMapper;

impl FieldMapper for LabelMapper {
    fn map_fields(&self, text: &str, fields: &[String]) -> Result<FieldMapping, MappingError> {
        let mut mapping: FieldMapping = fields.iter().map(|f| (f.clone(), String::new())).collect();
        for line in text.lines() {
            if let Some((label, value)) = line.split_once(':') {
                if let Some(slot) = mapping.get_mut(label.trim()) {
                    *slot = value.trim().to_string();
                }
            }
        }
        Ok(mapping)
    }
}

/// Returns the same status for every document.
pub struct FixedValidator(pub ValidationStatus);

impl ReportValidator for FixedValidator {
    fn validate(&self, _document: &[u8], _mapping: &FieldMapping) -> ValidationReport {
        ValidationReport {
            status: self.0,
            ..ValidationReport::default()
        }
    }
}

/// Isolated environment: a temp directory and pipeline factories.
pub struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a file into the temp directory and returns its path.
    pub fn write(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, bytes).expect("Failed to write test file");
        path
    }

    /// A pipeline whose OCR reads the evidence text layer back.
    pub fn pipeline(&self) -> Pipeline {
        self.pipeline_with(PipelineConfig::default())
    }

    pub fn pipeline_with(&self, config: PipelineConfig) -> Pipeline {
        self.build(config, Box::new(CarriedTextOcr))
    }

    /// A pipeline whose OCR never succeeds.
    pub fn failing_ocr_pipeline(&self, config: PipelineConfig) -> Pipeline {
        self.build(config, Box::new(UnavailableOcr))
    }

    fn build(&self, config: PipelineConfig, engine: Box<dyn OcrEngine>) -> Pipeline {
        let retry = RetryPolicy {
            max_attempts: 2,
            ..RetryPolicy::default()
        };
        let ocr = OcrChain::new(Some(engine), retry).with_sleeper(|_| {});
        Pipeline::new(
            config,
            Box::new(TextCarryingRasterizer),
            ocr,
            Box::new(FixedValidator(ValidationStatus::Ok)),
        )
        .with_mapper(Box::new(LabelMapper))
    }
}
