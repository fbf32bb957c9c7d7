use std::path::Path;
use std::process::Command;

use crate::error::ProcessError;
use crate::processor::{PageImage, PdfRasterizer};

/// Renders pages with `pdftoppm` from poppler-utils.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    dpi: u32,
}

impl PdftoppmRasterizer {
    pub fn new(dpi: u32) -> Self {
        Self { dpi }
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl PdfRasterizer for PdftoppmRasterizer {
    fn rasterize(&self, pdf: &[u8]) -> Result<Vec<PageImage>, ProcessError> {
        let _span = tracing::info_span!("processor.rasterize", dpi = self.dpi).entered();

        let page_count = match lopdf::Document::load_mem(pdf) {
            Ok(doc) => doc.get_pages().len(),
            Err(e) => {
                // poppler handles more PDF variants than lopdf.
                tracing::warn!("lopdf failed to parse PDF: {}. Asking pdfinfo for the page count.", e);
                count_pdf_pages(pdf)?
            }
        };
        if page_count == 0 {
            return Err(ProcessError::PdfProcessing("PDF has no pages".to_string()));
        }

        let mut pages = Vec::with_capacity(page_count);
        for page_num in 1..=page_count {
            let data = render_pdf_page_to_image(pdf, page_num as u32, self.dpi)?;
            pages.push(PageImage::new(page_num, data)?);
        }
        tracing::debug!(pages = pages.len(), "Rendered PDF pages");
        Ok(pages)
    }
}

/// Text of every page from the PDF's own text layer, in page order.
pub fn extract_page_texts(pdf: &[u8]) -> Result<Vec<String>, ProcessError> {
    let doc = lopdf::Document::load_mem(pdf)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

    let mut pages = Vec::new();
    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(text) => pages.push(text),
            Err(e) => {
                tracing::debug!(page = page_num, error = %e, "No text layer on page");
                pages.push(String::new());
            }
        }
    }
    Ok(pages)
}

/// Pattern for Identity-H Unimplemented errors (common with CID fonts).
const IDENTITY_H_PATTERN: &str = "?Identity-H Unimplemented?";

/// Text shorter than this is accepted regardless of character composition.
const MIN_TOTAL_CHARS: usize = 50;

/// Minimum percentage of alphanumeric characters for text to be usable.
const MIN_ALPHANUMERIC_PERCENT: usize = 10;

/// Whether text pulled from a PDF text layer can stand in for OCR output.
/// Rejects empty text, text made only of font encoding error markers, and
/// text with a very low ratio of alphanumeric characters.
pub fn is_usable_text(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let cleaned = trimmed
        .replace(IDENTITY_H_PATTERN, "")
        .replace(['\n', ' '], "");
    if cleaned.is_empty() {
        return false;
    }

    // chars().count() so non-ASCII text is measured correctly
    let total_chars = trimmed.chars().count();
    let alphanumeric_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();

    !(total_chars > MIN_TOTAL_CHARS
        && alphanumeric_chars * 100 < total_chars * MIN_ALPHANUMERIC_PERCENT)
}

fn temp_pdf(prefix: &str, pdf_bytes: &[u8]) -> Result<std::path::PathBuf, ProcessError> {
    let path = std::env::temp_dir().join(format!("{}_{}.pdf", prefix, uuid::Uuid::new_v4()));
    std::fs::write(&path, pdf_bytes)
        .map_err(|e| ProcessError::PdfProcessing(format!("Failed to write temp PDF: {}", e)))?;
    Ok(path)
}

/// Get the page count of a PDF using pdfinfo (poppler-utils).
fn count_pdf_pages(pdf_bytes: &[u8]) -> Result<usize, ProcessError> {
    let pdf_path = temp_pdf("glrfill_pagecount", pdf_bytes)?;

    let output = Command::new("pdfinfo").arg(&pdf_path).output().map_err(|e| {
        let _ = std::fs::remove_file(&pdf_path);
        ProcessError::PdfProcessing(format!(
            "Failed to run pdfinfo: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    let _ = std::fs::remove_file(&pdf_path);

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdfinfo failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .lines()
        .filter_map(|line| line.strip_prefix("Pages:"))
        .find_map(|count| count.trim().parse::<usize>().ok())
        .ok_or_else(|| ProcessError::PdfProcessing("pdfinfo reported no page count".to_string()))
}

fn render_pdf_page_to_image(
    pdf_bytes: &[u8],
    page_num: u32,
    dpi: u32,
) -> Result<Vec<u8>, ProcessError> {
    let pdf_path = temp_pdf("glrfill_render", pdf_bytes)?;
    let output_prefix = std::env::temp_dir().join(format!("glrfill_page_{}", uuid::Uuid::new_v4()));

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
        ])
        .arg(&pdf_path)
        .arg(&output_prefix)
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| {
        ProcessError::PdfProcessing(format!(
            "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
            e
        ))
    })?;

    if !output.status.success() {
        return Err(ProcessError::PdfProcessing(format!(
            "pdftoppm failed: {}",
            String::from_utf8_lossy(&output.stderr)
        )));
    }

    // pdftoppm zero-pads the page suffix depending on the page count
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];
    let image_path = candidates
        .iter()
        .find(|p| Path::new(p).exists())
        .ok_or_else(|| {
            ProcessError::PdfProcessing("Failed to find rendered page image".to_string())
        })?;

    let image_data = std::fs::read(image_path).map_err(|e| {
        ProcessError::PdfProcessing(format!("Failed to read rendered image: {}", e))
    })?;

    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}
