use std::sync::Arc;

use crate::error::OcrError;
use crate::processor::{OcrEngine, PageImage};

/// Local OCR through Tesseract. Only functional when built with the
/// `tesseract` feature; otherwise every call reports the missing dependency.
#[derive(Clone)]
pub struct TesseractOcr {
    inner: Arc<TesseractOcrInner>,
}

struct TesseractOcrInner {
    languages: String,
}

impl TesseractOcr {
    pub fn new(languages: &[String]) -> Self {
        let lang_str = if languages.is_empty() {
            "eng".to_string()
        } else {
            languages.join("+")
        };

        Self {
            inner: Arc::new(TesseractOcrInner {
                languages: lang_str,
            }),
        }
    }

    pub fn languages(&self) -> &str {
        &self.inner.languages
    }

    #[cfg(feature = "tesseract")]
    fn recognize(&self, image_data: &[u8]) -> Result<String, OcrError> {
        use std::io::Cursor;

        let img = image::load_from_memory(image_data)
            .map_err(|e| OcrError::Engine(format!("Failed to load image: {}", e)))?;

        // leptess reads PNG from memory
        let mut png_data = Vec::new();
        let mut cursor = Cursor::new(&mut png_data);
        img.write_to(&mut cursor, image::ImageFormat::Png)
            .map_err(|e| OcrError::Engine(format!("Failed to convert image: {}", e)))?;

        let mut lt = leptess::LepTess::new(None, &self.inner.languages)
            .map_err(|e| OcrError::Engine(format!("Failed to initialize Tesseract: {}", e)))?;

        lt.set_image_from_mem(&png_data)
            .map_err(|e| OcrError::Engine(format!("Failed to set image for OCR: {}", e)))?;

        lt.get_utf8_text()
            .map_err(|e| OcrError::Engine(format!("OCR failed: {}", e)))
    }

    #[cfg(not(feature = "tesseract"))]
    fn recognize(&self, _image_data: &[u8]) -> Result<String, OcrError> {
        Err(OcrError::MissingDependency {
            dependency: "tesseract",
            hint: "rebuild with `--features tesseract` and install tesseract and leptonica",
        })
    }
}

impl OcrEngine for TesseractOcr {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn extract_text(&self, image: &PageImage) -> Result<String, OcrError> {
        let _span = tracing::info_span!("processor.ocr", page = image.page).entered();
        self.recognize(&image.data)
    }
}
