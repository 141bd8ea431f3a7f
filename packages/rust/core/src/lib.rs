//! The support pipeline: stages, fallback model, and orchestration.
//!
//! Stages are plain async functions over the values they need; each returns a
//! [`StageOutcome`] and [`SupportPipeline`] merges the outcomes into the
//! ticket record.

pub mod classify;
pub mod draft;
pub mod format;
pub mod knowledge;
pub mod normalize;
pub mod outcome;
pub mod pipeline;
pub mod retrieve;
pub mod suggest;
pub mod validate;

#[cfg(test)]
mod test_support;

pub use format::{FormattedResponse, ResponseMetadata, chunk_text, format_response};
pub use outcome::{FallbackReason, StageOutcome};
pub use pipeline::{
    PipelineRun, PipelineSettings, ProgressReporter, SilentProgress, Stage, StageFallback,
    SupportPipeline,
};
pub use suggest::suggest_sources;
