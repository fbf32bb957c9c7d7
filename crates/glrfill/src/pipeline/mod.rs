//! The fill pipeline: evidence in, filled report out.

pub mod config;
pub mod context;
pub mod error;
pub mod progress;
pub mod runner;

pub use config::PipelineConfig;
pub use context::{FillReport, FillRequest, PipelineContext};
pub use error::{PipelineError, PipelineWarning};
pub use progress::{
    LogProgress, NoopProgress, PipelinePhase, ProgressEvent, ProgressReporter, RecordingProgress,
};
pub use runner::Pipeline;
