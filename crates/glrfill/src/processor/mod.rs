pub mod ocr;
pub mod pdf;

use std::path::Path;

use crate::error::{OcrError, ProcessError};

/// One rendered page, ready to be sent to an OCR engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageImage {
    /// 1-based page number across all evidence files.
    pub page: usize,
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl PageImage {
    /// Wraps encoded image bytes, detecting the format from the content.
    pub fn new(page: usize, data: Vec<u8>) -> Result<Self, ProcessError> {
        let format = image::guess_format(&data)
            .map_err(|e| ProcessError::ImageProcessing(format!("Unrecognized image data: {}", e)))?;
        Ok(Self {
            page,
            mime_type: format.to_mime_type().to_string(),
            data,
        })
    }
}

/// Renders PDF pages to images.
pub trait PdfRasterizer: Send + Sync {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, ProcessError>;
}

/// Extracts text from a page image.
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    fn extract_text(&self, image: &PageImage) -> Result<String, OcrError>;
}

/// Whether the bytes look like a PDF file.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Joins per-page texts as `--- Page N ---` blocks, skipping empty pages.
pub fn join_page_texts<'a, I>(pages: I) -> String
where
    I: IntoIterator<Item = (usize, &'a str)>,
{
    pages
        .into_iter()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(page, text)| format!("--- Page {} ---\n{}", page, text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Reads an input file into memory.
pub fn read_input(path: &Path) -> Result<Vec<u8>, ProcessError> {
    std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })
}
