use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::llm::ValidationReport;
use crate::placeholder::{FieldMapping, FillStats};
use crate::processor::PageImage;

use super::error::PipelineWarning;

/// Everything one fill needs: the template and the scanned evidence.
#[derive(Debug, Clone, Default)]
pub struct FillRequest {
    pub template: Vec<u8>,
    /// PDF files, or single page images.
    pub evidence: Vec<Vec<u8>>,
}

/// Result of a fill.
#[derive(Debug, Clone, Serialize)]
pub struct FillReport {
    #[serde(skip)]
    pub document: Vec<u8>,
    pub extracted_text: String,
    pub placeholders: Vec<String>,
    pub mapping: FieldMapping,
    pub stats: FillStats,
    pub cleaned_text: Option<String>,
    pub validation: Option<ValidationReport>,
    pub warnings: Vec<PipelineWarning>,
    pub generated_at: DateTime<Utc>,
}

pub struct PipelineContext {
    // Input
    pub request: FillRequest,

    // Step 2 result (step 1 loads the template)
    pub pages: Vec<PageImage>,
    /// Pages rendered from each evidence item, in request order.
    pub evidence_pages: Vec<usize>,

    // Step 3 result
    pub extracted_text: String,

    // Step 4 result
    pub placeholders: Vec<String>,

    // Step 5 result
    pub mapping: FieldMapping,

    // Step 6 results
    pub stats: FillStats,
    pub output: Vec<u8>,

    // Step 7 result
    pub cleaned_text: Option<String>,

    // Step 8 result
    pub validation: Option<ValidationReport>,

    // Non-fatal warnings
    pub warnings: Vec<PipelineWarning>,
}

impl PipelineContext {
    pub fn new(request: FillRequest) -> Self {
        Self {
            request,
            pages: Vec::new(),
            evidence_pages: Vec::new(),
            extracted_text: String::new(),
            placeholders: Vec::new(),
            mapping: FieldMapping::new(),
            stats: FillStats::default(),
            output: Vec::new(),
            cleaned_text: None,
            validation: None,
            warnings: Vec::new(),
        }
    }

    pub fn into_report(self) -> FillReport {
        FillReport {
            document: self.output,
            extracted_text: self.extracted_text,
            placeholders: self.placeholders,
            mapping: self.mapping,
            stats: self.stats,
            cleaned_text: self.cleaned_text,
            validation: self.validation,
            warnings: self.warnings,
            generated_at: Utc::now(),
        }
    }
}
