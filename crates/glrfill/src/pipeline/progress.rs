use std::sync::Mutex;

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelinePhase {
    LoadingTemplate,
    Rasterizing,
    Ocr,
    ScanningPlaceholders,
    Mapping,
    Filling,
    Cleanup,
    Validating,
}

/// Events emitted by the pipeline. Extracted text is never part of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Phase {
        phase: PipelinePhase,
        message: String,
    },
    Completed {
        placeholders: usize,
        filled: usize,
        warnings: usize,
    },
    Failed {
        error: String,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Writes progress to the tracing log.
pub struct LogProgress;

impl ProgressReporter for LogProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { phase, message } => info!(phase = ?phase, "{}", message),
            ProgressEvent::Completed {
                placeholders,
                filled,
                warnings,
            } => info!(placeholders, filled, warnings, "Report filled"),
            ProgressEvent::Failed { error } => warn!("Pipeline failed: {}", error),
        }
    }
}

/// Keeps every event; used to assert on the step sequence.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn phases(&self) -> Vec<PipelinePhase> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::Phase { phase, .. } => Some(phase),
                _ => None,
            })
            .collect()
    }
}

impl ProgressReporter for RecordingProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
