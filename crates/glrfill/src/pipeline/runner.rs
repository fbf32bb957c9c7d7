use std::sync::Arc;

use tracing::{debug, info, info_span, warn};

use crate::config::Config;
use crate::docx::Document;
use crate::llm::{
    ContentCleaner, FieldMapper, GeminiCleaner, GeminiClient, GeminiMapper, GeminiOcr,
    GeminiValidator, GenerateContent, OcrChain, ReportValidator, ValidationReport,
    ValidationStatus,
};
use crate::placeholder::{
    apply_text_edits, extract_placeholders, fill_document, finalize, FieldMapping, RawPassOutcome,
};
use crate::processor::ocr::TesseractOcr;
use crate::processor::pdf::{extract_page_texts, is_usable_text, PdftoppmRasterizer};
use crate::processor::{is_pdf, join_page_texts, OcrEngine, PageImage, PdfRasterizer};

use super::config::PipelineConfig;
use super::context::{FillReport, FillRequest, PipelineContext};
use super::error::{PipelineError, PipelineWarning};
use super::progress::{PipelinePhase, ProgressEvent, ProgressReporter};

pub struct Pipeline {
    config: PipelineConfig,
    rasterizer: Box<dyn PdfRasterizer>,
    ocr: OcrChain,
    mapper: Option<Box<dyn FieldMapper>>,
    cleaner: Option<Box<dyn ContentCleaner>>,
    validator: Box<dyn ReportValidator>,
}

impl Pipeline {
    /// Production constructor: Gemini collaborators when an API key resolves,
    /// pdftoppm rasterization, tesseract as the local OCR fallback.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let gemini = &config.gemini;
        let backend: Option<Arc<dyn GenerateContent>> = match gemini.resolve_api_key()? {
            Some(key) => Some(Arc::new(GeminiClient::new(
                key,
                &gemini.base_url,
                gemini.timeout(),
            )?)),
            None => {
                warn!("No Gemini API key configured; OCR, mapping and validation are unavailable");
                None
            }
        };

        let primary = backend.clone().map(|b| {
            Box::new(GeminiOcr::new(b, gemini.ocr_model.clone())) as Box<dyn OcrEngine>
        });
        let mut ocr = OcrChain::new(primary, config.ocr.retry_policy());
        if config.ocr.local_fallback {
            ocr = ocr.with_fallback(Box::new(TesseractOcr::new(&config.ocr.languages)));
        }

        let mut pipeline = Self::new(
            PipelineConfig::from_config(config),
            Box::new(PdftoppmRasterizer::new(config.ocr.dpi)),
            ocr,
            Box::new(GeminiValidator::new(
                backend.clone(),
                gemini.validation_model.clone(),
            )),
        );
        if let Some(backend) = backend {
            pipeline = pipeline.with_mapper(Box::new(GeminiMapper::new(
                backend.clone(),
                gemini.mapping_model.clone(),
            )));
            if config.cleanup.enabled {
                pipeline = pipeline.with_cleaner(Box::new(GeminiCleaner::new(
                    backend,
                    gemini.cleanup_model.clone(),
                )));
            }
        }
        Ok(pipeline)
    }

    /// Constructor with explicit collaborators. Mapping and cleanup start
    /// unconfigured.
    pub fn new(
        config: PipelineConfig,
        rasterizer: Box<dyn PdfRasterizer>,
        ocr: OcrChain,
        validator: Box<dyn ReportValidator>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            ocr,
            mapper: None,
            cleaner: None,
            validator,
        }
    }

    pub fn with_mapper(mut self, mapper: Box<dyn FieldMapper>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn with_cleaner(mut self, cleaner: Box<dyn ContentCleaner>) -> Self {
        self.cleaner = Some(cleaner);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Fills the template from the evidence: OCR, mapping, substitution,
    /// then the optional cleanup and validation steps.
    pub fn run(
        &self,
        request: FillRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<FillReport, PipelineError> {
        let _pipeline_span = info_span!("pipeline",
            evidence = request.evidence.len(),
            template_bytes = request.template.len(),
        )
        .entered();

        let mut ctx = PipelineContext::new(request);
        if let Err(e) = self.run_steps(&mut ctx, progress) {
            progress.report(ProgressEvent::Failed {
                error: e.to_string(),
            });
            return Err(e);
        }

        progress.report(ProgressEvent::Completed {
            placeholders: ctx.placeholders.len(),
            filled: ctx.mapping.values().filter(|v| !v.is_empty()).count(),
            warnings: ctx.warnings.len(),
        });
        Ok(ctx.into_report())
    }

    fn run_steps(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        // Step 1: Load template
        let mut document = {
            let _step = info_span!("load_template").entered();
            report_phase(progress, PipelinePhase::LoadingTemplate, "Loading template...");
            Document::load(&ctx.request.template)?
        };

        // Step 2: Rasterize evidence
        {
            let _step = info_span!("rasterize").entered();
            report_phase(progress, PipelinePhase::Rasterizing, "Rendering evidence pages...");
            self.step_rasterize(ctx)?;
        }

        // Step 3: OCR
        {
            let _step = info_span!("ocr", pages = ctx.pages.len()).entered();
            report_phase(progress, PipelinePhase::Ocr, "Extracting text from pages...");
            self.step_ocr(ctx)?;
        }

        // Step 4: Extract placeholders
        {
            let _step = info_span!("scan_placeholders").entered();
            report_phase(
                progress,
                PipelinePhase::ScanningPlaceholders,
                "Finding template placeholders...",
            );
            ctx.placeholders = extract_placeholders(&document);
            info!(count = ctx.placeholders.len(), "Placeholders found");
        }

        // Step 5: Map fields
        {
            let _step = info_span!("map_fields").entered();
            report_phase(progress, PipelinePhase::Mapping, "Mapping evidence to fields...");
            self.step_map(ctx)?;
        }

        // Step 6: Fill and save
        {
            let _step = info_span!("fill").entered();
            report_phase(progress, PipelinePhase::Filling, "Filling template...");
            self.step_fill(ctx, &mut document)?;
        }

        // Step 7: Cleanup (optional)
        if self.config.cleanup_enabled {
            let _step = info_span!("cleanup").entered();
            report_phase(progress, PipelinePhase::Cleanup, "Cleaning up report text...");
            self.step_cleanup(ctx);
        }

        // Step 8: Validate (optional) and check for leftovers
        {
            let _step = info_span!("validate").entered();
            report_phase(progress, PipelinePhase::Validating, "Validating filled report...");
            self.step_validate(ctx);
        }

        Ok(())
    }

    fn step_rasterize(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if ctx.request.evidence.is_empty() {
            return Err(PipelineError::NoEvidence);
        }

        let mut next_page = 1;
        for (index, item) in ctx.request.evidence.iter().enumerate() {
            let pages = if is_pdf(item) {
                self.rasterizer.rasterize(item)?
            } else {
                vec![PageImage::new(next_page, item.clone())?]
            };
            debug!(evidence = index + 1, pages = pages.len(), "Evidence rendered");
            ctx.evidence_pages.push(pages.len());
            for mut page in pages {
                page.page = next_page;
                next_page += 1;
                ctx.pages.push(page);
            }
        }
        Ok(())
    }

    fn step_ocr(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        let ocr_error = match self.ocr.extract_pages(&ctx.pages) {
            Ok(text) => {
                ctx.extracted_text = text;
                return Ok(());
            }
            Err(e) => e,
        };

        if !self.config.text_layer_fallback {
            return Err(ocr_error.into());
        }
        match text_layer(&ctx.request.evidence, &ctx.evidence_pages) {
            Some(text) => {
                warn!(error = %ocr_error, "OCR failed, using the PDF text layer");
                ctx.warnings.push(PipelineWarning::TextLayerUsed {
                    ocr_error: ocr_error.to_string(),
                });
                ctx.extracted_text = text;
                Ok(())
            }
            None => Err(ocr_error.into()),
        }
    }

    fn step_map(&self, ctx: &mut PipelineContext) -> Result<(), PipelineError> {
        if ctx.placeholders.is_empty() {
            debug!("Template has no placeholders, skipping mapping");
            return Ok(());
        }
        let mapper = self
            .mapper
            .as_ref()
            .ok_or(PipelineError::NotConfigured("Field mapping"))?;
        ctx.mapping = mapper.map_fields(&ctx.extracted_text, &ctx.placeholders)?;
        Ok(())
    }

    fn step_fill(&self, ctx: &mut PipelineContext, document: &mut Document) -> Result<(), PipelineError> {
        ctx.stats = fill_document(document, &ctx.mapping, self.config.policy);
        ctx.output = if self.config.raw_pass {
            finalize(document, &ctx.mapping)?
        } else {
            document.save()?
        };
        Ok(())
    }

    fn step_cleanup(&self, ctx: &mut PipelineContext) {
        let Some(cleaner) = &self.cleaner else {
            ctx.warnings.push(PipelineWarning::CleanupFailed {
                error: "content cleanup is not configured (no API key available)".to_string(),
            });
            return;
        };

        let report_text = match Document::load(&ctx.output) {
            Ok(filled) => filled.text(),
            Err(e) => {
                ctx.warnings.push(PipelineWarning::CleanupFailed {
                    error: e.to_string(),
                });
                return;
            }
        };

        match cleaner.clean(&report_text, &ctx.extracted_text) {
            Ok(cleaned) => ctx.cleaned_text = Some(cleaned),
            Err(e) => {
                warn!(error = %e, "Content cleanup failed");
                ctx.warnings.push(PipelineWarning::CleanupFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    fn step_validate(&self, ctx: &mut PipelineContext) {
        if let Some(names) = remaining_placeholders(&ctx.output) {
            warn!(count = names.len(), "Placeholders remain in the output");
            ctx.warnings
                .push(PipelineWarning::PlaceholdersRemaining { names });
        }

        if !self.config.validation_enabled {
            return;
        }
        let report = self.validator.validate(&ctx.output, &ctx.mapping);
        if report.status == ValidationStatus::Error {
            ctx.warnings.push(PipelineWarning::ValidationUnavailable {
                issues: report.issues.clone(),
            });
        }
        ctx.validation = Some(report);
    }

    /// Fills a template from a known mapping: load, scan, fill, save.
    pub fn fill_template(
        &self,
        template: &[u8],
        mapping: &FieldMapping,
    ) -> Result<FillReport, PipelineError> {
        let _span = info_span!("fill_template", fields = mapping.len()).entered();
        let mut ctx = PipelineContext::new(FillRequest {
            template: template.to_vec(),
            evidence: Vec::new(),
        });
        let mut document = Document::load(template)?;
        ctx.placeholders = extract_placeholders(&document);
        ctx.mapping = mapping.clone();
        self.step_fill(&mut ctx, &mut document)?;
        if let Some(names) = remaining_placeholders(&ctx.output) {
            ctx.warnings
                .push(PipelineWarning::PlaceholdersRemaining { names });
        }
        Ok(ctx.into_report())
    }

    /// Applies reviewer edits (keys may carry token delimiters) to a filled
    /// document.
    pub fn apply_edits(document: &[u8], edits: &FieldMapping) -> Result<RawPassOutcome, PipelineError> {
        let _span = info_span!("apply_edits", edits = edits.len()).entered();
        Ok(apply_text_edits(document, edits)?)
    }

    pub fn validate(&self, document: &[u8], mapping: &FieldMapping) -> ValidationReport {
        self.validator.validate(document, mapping)
    }
}

fn report_phase(progress: &dyn ProgressReporter, phase: PipelinePhase, message: &str) {
    progress.report(ProgressEvent::Phase {
        phase,
        message: message.to_string(),
    });
}

/// Text of every PDF's own text layer, or `None` when it is not usable.
///
/// Each item's pages are numbered from where rasterization placed its first
/// page, so the numbers match the OCR page headers whatever the text layer
/// holds.
fn text_layer(evidence: &[Vec<u8>], evidence_pages: &[usize]) -> Option<String> {
    let mut first_page = 1;
    let mut pages = Vec::new();
    for (index, item) in evidence.iter().enumerate() {
        let rendered = evidence_pages.get(index).copied().unwrap_or(1);
        if is_pdf(item) {
            match extract_page_texts(item) {
                Ok(texts) => {
                    for (offset, text) in texts.into_iter().enumerate() {
                        pages.push((first_page + offset, text));
                    }
                }
                Err(e) => debug!(evidence = index + 1, error = %e, "No text layer"),
            }
        }
        first_page += rendered;
    }

    let raw: String = pages.iter().map(|(_, t)| t.as_str()).collect::<Vec<_>>().join("\n");
    if !is_usable_text(&raw) {
        return None;
    }
    Some(join_page_texts(pages.iter().map(|(n, t)| (*n, t.as_str()))))
}

fn remaining_placeholders(output: &[u8]) -> Option<Vec<String>> {
    let names = Document::load(output).ok().map(|d| extract_placeholders(&d))?;
    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}
