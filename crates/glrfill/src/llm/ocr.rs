//! OCR through Gemini, and the retry/fallback chain every page goes through.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, info_span, warn};

use super::gemini::{GeminiError, GenerateContent, Part};
use crate::error::OcrError;
use crate::processor::{join_page_texts, OcrEngine, PageImage};

const OCR_PROMPT: &str = "Transcribe all text visible in this scanned insurance document page. \
Keep the reading order and line breaks, include numbers, dates and names exactly as written, \
and return only the transcribed text.";

/// Page OCR with a Gemini model.
pub struct GeminiOcr {
    backend: Arc<dyn GenerateContent>,
    model: String,
}

impl GeminiOcr {
    pub fn new(backend: Arc<dyn GenerateContent>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

impl OcrEngine for GeminiOcr {
    fn name(&self) -> &str {
        "gemini"
    }

    fn extract_text(&self, image: &PageImage) -> Result<String, OcrError> {
        let _span = info_span!("llm.ocr", page = image.page, model = %self.model).entered();
        let parts = vec![
            Part::text(OCR_PROMPT),
            Part::inline(image.mime_type.as_str(), &image.data),
        ];
        match self.backend.generate(&self.model, parts) {
            Ok(text) => Ok(text.trim().to_string()),
            Err(GeminiError::EmptyResponse) => Err(OcrError::EmptyResponse),
            Err(e) => Err(OcrError::Request(e.to_string())),
        }
    }
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(8000),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based): doubles each time, capped.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// A primary OCR engine retried under a [`RetryPolicy`], followed by local
/// fallbacks. Empty output counts as a failure.
pub struct OcrChain {
    primary: Option<Box<dyn OcrEngine>>,
    fallbacks: Vec<Box<dyn OcrEngine>>,
    retry: RetryPolicy,
    sleep: fn(Duration),
}

impl OcrChain {
    pub fn new(primary: Option<Box<dyn OcrEngine>>, retry: RetryPolicy) -> Self {
        Self {
            primary,
            fallbacks: Vec::new(),
            retry,
            sleep: std::thread::sleep,
        }
    }

    pub fn with_fallback(mut self, engine: Box<dyn OcrEngine>) -> Self {
        self.fallbacks.push(engine);
        self
    }

    /// Replaces the sleep used between attempts.
    pub fn with_sleeper(mut self, sleep: fn(Duration)) -> Self {
        self.sleep = sleep;
        self
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Text of one page.
    pub fn extract_page(&self, image: &PageImage) -> Result<String, OcrError> {
        let mut attempts = 0;
        let mut last_error = match &self.primary {
            Some(_) => OcrError::EmptyResponse,
            None => OcrError::NotConfigured("no API key for the OCR model".to_string()),
        };

        if let Some(primary) = &self.primary {
            let max_attempts = self.retry.max_attempts.max(1);
            for attempt in 1..=max_attempts {
                attempts = attempt;
                match primary.extract_text(image) {
                    Ok(text) if !text.trim().is_empty() => return Ok(text),
                    Ok(_) => last_error = OcrError::EmptyResponse,
                    Err(e) => last_error = e,
                }
                warn!(
                    engine = primary.name(),
                    page = image.page,
                    attempt,
                    max_attempts,
                    error = %last_error,
                    "OCR attempt failed"
                );
                if attempt < max_attempts {
                    (self.sleep)(self.retry.delay_after(attempt));
                }
            }
        }

        let mut notes = Vec::new();
        for fallback in &self.fallbacks {
            match fallback.extract_text(image) {
                Ok(text) if !text.trim().is_empty() => {
                    info!(engine = fallback.name(), page = image.page, "OCR fallback succeeded");
                    return Ok(text);
                }
                Ok(_) => notes.push(format!("{} returned no text", fallback.name())),
                Err(e) => notes.push(format!("{}: {}", fallback.name(), e)),
            }
        }
        if notes.is_empty() {
            notes.push("none configured".to_string());
        }

        Err(OcrError::Exhausted {
            attempts,
            last_error: last_error.to_string(),
            fallbacks: notes.join("; "),
        })
    }

    /// Text of every page, joined with page markers.
    pub fn extract_pages(&self, images: &[PageImage]) -> Result<String, OcrError> {
        let _span = info_span!("ocr_pages", pages = images.len()).entered();
        let mut texts = Vec::with_capacity(images.len());
        for image in images {
            texts.push((image.page, self.extract_page(image)?));
        }
        Ok(join_page_texts(
            texts.iter().map(|(page, text)| (*page, text.as_str())),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::tests::ScriptedModel;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FlakyEngine {
        name: &'static str,
        outputs: Mutex<Vec<Result<String, OcrError>>>,
        calls: Arc<AtomicUsize>,
    }

    impl FlakyEngine {
        fn boxed(
            name: &'static str,
            outputs: Vec<Result<String, OcrError>>,
        ) -> (Box<dyn OcrEngine>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let engine = Self {
                name,
                outputs: Mutex::new(outputs),
                calls: calls.clone(),
            };
            (Box::new(engine), calls)
        }
    }

    impl OcrEngine for FlakyEngine {
        fn name(&self) -> &str {
            self.name
        }

        fn extract_text(&self, _image: &PageImage) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut outputs = self.outputs.lock().unwrap();
            if outputs.is_empty() {
                return Err(OcrError::Request("no more output".to_string()));
            }
            outputs.remove(0)
        }
    }

    fn page(n: usize) -> PageImage {
        PageImage {
            page: n,
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        }
    }

    fn no_sleep(_: Duration) {}

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 6,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(3000),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(500));
        assert_eq!(policy.delay_after(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_after(3), Duration::from_millis(2000));
        assert_eq!(policy.delay_after(4), Duration::from_millis(3000));
        assert_eq!(policy.delay_after(40), Duration::from_millis(3000));
    }

    #[test]
    fn test_retries_until_success() {
        let (engine, calls) = FlakyEngine::boxed(
            "primary",
            vec![
                Err(OcrError::Request("503".to_string())),
                Ok("   ".to_string()),
                Ok("Date of Loss: 01/02/2024".to_string()),
            ],
        );
        let chain = OcrChain::new(Some(engine), RetryPolicy::default()).with_sleeper(no_sleep);
        assert_eq!(chain.extract_page(&page(1)).unwrap(), "Date of Loss: 01/02/2024");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fallback_after_exhaustion() {
        let (primary, primary_calls) = FlakyEngine::boxed("primary", vec![]);
        let (fallback, _) = FlakyEngine::boxed("local", vec![Ok("from fallback".to_string())]);
        let chain = OcrChain::new(
            Some(primary),
            RetryPolicy {
                max_attempts: 2,
                ..RetryPolicy::default()
            },
        )
        .with_fallback(fallback)
        .with_sleeper(no_sleep);

        assert_eq!(chain.extract_page(&page(1)).unwrap(), "from fallback");
        assert_eq!(primary_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_exhausted_error_names_missing_dependency() {
        let (primary, _) = FlakyEngine::boxed("primary", vec![]);
        let (fallback, _) = FlakyEngine::boxed(
            "tesseract",
            vec![Err(OcrError::MissingDependency {
                dependency: "tesseract",
                hint: "install it",
            })],
        );
        let chain = OcrChain::new(Some(primary), RetryPolicy::default())
            .with_fallback(fallback)
            .with_sleeper(no_sleep);

        let err = chain.extract_page(&page(1)).unwrap_err();
        match &err {
            OcrError::Exhausted {
                attempts,
                fallbacks,
                ..
            } => {
                assert_eq!(*attempts, 3);
                assert!(fallbacks.contains("missing dependency 'tesseract'"));
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_no_primary_goes_straight_to_fallbacks() {
        let chain = OcrChain::new(None, RetryPolicy::default()).with_sleeper(no_sleep);
        assert!(!chain.has_primary());
        match chain.extract_page(&page(1)).unwrap_err() {
            OcrError::Exhausted {
                attempts,
                last_error,
                fallbacks,
            } => {
                assert_eq!(attempts, 0);
                assert!(last_error.contains("not configured"));
                assert_eq!(fallbacks, "none configured");
            }
            other => panic!("Expected Exhausted, got {:?}", other),
        }
    }

    #[test]
    fn test_extract_pages_joins_with_markers() {
        let (engine, _) = FlakyEngine::boxed(
            "primary",
            vec![Ok("first page".to_string()), Ok("second page".to_string())],
        );
        let chain = OcrChain::new(Some(engine), RetryPolicy::default()).with_sleeper(no_sleep);
        let text = chain.extract_pages(&[page(1), page(2)]).unwrap();
        assert_eq!(
            text,
            "--- Page 1 ---\nfirst page\n\n--- Page 2 ---\nsecond page"
        );
    }

    #[test]
    fn test_gemini_ocr_sends_image_inline() {
        let model = Arc::new(ScriptedModel::replying("  Insured: Jane Roe \n"));
        let ocr = GeminiOcr::new(model.clone(), "gemini-2.5-flash");
        assert_eq!(ocr.extract_text(&page(1)).unwrap(), "Insured: Jane Roe");

        let calls = model.calls.lock().unwrap();
        assert_eq!(calls[0].0, "gemini-2.5-flash");
        let inline = calls[0].1[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "AQID");
    }

    #[test]
    fn test_gemini_ocr_maps_errors() {
        let model = Arc::new(ScriptedModel::new(vec![
            Err(GeminiError::EmptyResponse),
            Err(GeminiError::Status {
                status: 429,
                body: "quota".to_string(),
            }),
        ]));
        let ocr = GeminiOcr::new(model, "m");
        assert!(matches!(ocr.extract_text(&page(1)), Err(OcrError::EmptyResponse)));
        assert!(matches!(ocr.extract_text(&page(1)), Err(OcrError::Request(msg)) if msg.contains("429")));
    }
}
