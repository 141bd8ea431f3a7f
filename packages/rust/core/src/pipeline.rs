//! End-to-end ticket pipeline: normalize → classify → retrieve → draft →
//! validate → format.
//!
//! Each stage receives the values it needs and returns a [`StageOutcome`];
//! the orchestrator alone merges results into the [`TicketRecord`] and keeps
//! a log of every fallback taken. `run` never fails.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, instrument, warn};

use supportflow_llm::ChatModel;
use supportflow_search::SearchHandle;
use supportflow_shared::{AppConfig, Message, TicketRecord};

use crate::classify::Classifier;
use crate::draft::Drafter;
use crate::format::{FormattedResponse, format_response};
use crate::normalize::normalize;
use crate::outcome::{FallbackReason, StageOutcome};
use crate::retrieve::{Retriever, RetrieverSettings};
use crate::validate::Validator;

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Pipeline states in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Normalize,
    Classify,
    Retrieve,
    Draft,
    Validate,
    Format,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Self::Normalize,
        Self::Classify,
        Self::Retrieve,
        Self::Draft,
        Self::Validate,
        Self::Format,
    ];

    /// The following stage; `None` after `Format`.
    pub fn next(self) -> Option<Stage> {
        let idx = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(idx + 1).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Normalize => "normalize",
            Self::Classify => "classify",
            Self::Retrieve => "retrieve",
            Self::Draft => "draft",
            Self::Validate => "validate",
            Self::Format => "format",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a stage.
    fn stage(&self, stage: Stage);
    /// Called when the pipeline completes.
    fn done(&self, run: &PipelineRun);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage(&self, _stage: Stage) {}
    fn done(&self, _run: &PipelineRun) {}
}

// ---------------------------------------------------------------------------
// Settings & results
// ---------------------------------------------------------------------------

/// Tunables for one pipeline instance.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub classifier_temperature: f32,
    pub drafter_temperature: f32,
    pub validator_temperature: f32,
    /// Deadline applied to each external call.
    pub stage_timeout_secs: u64,
    /// Confidence below which review is always required.
    pub review_threshold: f64,
    pub retriever: RetrieverSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            classifier_temperature: 0.0,
            drafter_temperature: 0.7,
            validator_temperature: 0.0,
            stage_timeout_secs: 30,
            review_threshold: 0.8,
            retriever: RetrieverSettings::default(),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = config.pipeline.stage_timeout_secs;
        Self {
            classifier_temperature: config.llm.classifier_temperature,
            drafter_temperature: config.llm.drafter_temperature,
            validator_temperature: config.llm.validator_temperature,
            stage_timeout_secs: timeout,
            review_threshold: config.pipeline.review_threshold,
            retriever: RetrieverSettings {
                live_results: config.pipeline.live_results,
                filtered_results: config.pipeline.filtered_results,
                preview_chars: config.pipeline.preview_chars,
                deadline_secs: timeout,
            },
        }
    }
}

/// A substitution made by one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct StageFallback {
    pub stage: Stage,
    pub reason: FallbackReason,
}

/// Result of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// Fully populated record, with the formatted reply appended to its messages.
    pub record: TicketRecord,
    pub formatted: FormattedResponse,
    /// Fallbacks in stage order; empty when every collaborator answered.
    pub fallbacks: Vec<StageFallback>,
    pub elapsed: Duration,
}

impl PipelineRun {
    /// The reason `stage` fell back, if it did.
    pub fn fallback_for(&self, stage: Stage) -> Option<&FallbackReason> {
        self.fallbacks
            .iter()
            .find(|f| f.stage == stage)
            .map(|f| &f.reason)
    }
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

/// The assembled stages. Shared across requests; holds no per-ticket state.
pub struct SupportPipeline {
    classifier: Classifier,
    retriever: Retriever,
    drafter: Drafter,
    validator: Validator,
}

impl SupportPipeline {
    pub fn new(model: Arc<dyn ChatModel>, search: SearchHandle, settings: PipelineSettings) -> Self {
        let timeout = settings.stage_timeout_secs;
        Self {
            classifier: Classifier::new(model.clone(), settings.classifier_temperature, timeout),
            retriever: Retriever::new(search, settings.retriever),
            drafter: Drafter::new(model.clone(), settings.drafter_temperature, timeout),
            validator: Validator::new(
                model,
                settings.validator_temperature,
                timeout,
                settings.review_threshold,
            ),
        }
    }

    pub fn from_config(config: &AppConfig, model: Arc<dyn ChatModel>, search: SearchHandle) -> Self {
        Self::new(model, search, PipelineSettings::from_config(config))
    }

    /// Run every stage once, in order, and return the populated record.
    #[instrument(skip_all, fields(ticket_id = %record.ticket_id))]
    pub async fn run(&self, record: TicketRecord, progress: &dyn ProgressReporter) -> PipelineRun {
        let start = Instant::now();
        let mut fallbacks = Vec::new();

        progress.stage(Stage::Normalize);
        let query = normalize(&record);
        let record = record.with_query(query);

        progress.stage(Stage::Classify);
        let outcome = self.classifier.classify(&record.customer_query).await;
        let classification = settle(Stage::Classify, outcome, &mut fallbacks);
        let record = record.with_classification(
            classification.category,
            classification.sentiment,
            classification.urgency,
        );

        progress.stage(Stage::Retrieve);
        let outcome = self
            .retriever
            .retrieve(
                &record.customer_query,
                record.category,
                record.selected_sources.as_deref(),
            )
            .await;
        let retrieval = settle(Stage::Retrieve, outcome, &mut fallbacks);
        let record = record.with_retrieval(retrieval.context, retrieval.sources);

        progress.stage(Stage::Draft);
        let context = record.context_block();
        let outcome = self.drafter.draft(&record.customer_query, &context).await;
        let draft = settle(Stage::Draft, outcome, &mut fallbacks);
        let record = record.with_draft(draft);

        progress.stage(Stage::Validate);
        let outcome = self
            .validator
            .validate(&record.customer_query, &context, &record.draft_response)
            .await;
        let validation = settle(Stage::Validate, outcome, &mut fallbacks);
        let record = record.with_validation(
            validation.confidence_score,
            validation.needs_human_review,
            validation.critique,
        );

        progress.stage(Stage::Format);
        let formatted = format_response(&record);
        let record = record.with_message(Message::assistant(formatted.message.clone()));

        let run = PipelineRun {
            record,
            formatted,
            fallbacks,
            elapsed: start.elapsed(),
        };

        info!(
            category = %run.record.category,
            confidence = run.record.confidence_score,
            needs_review = run.record.needs_human_review,
            fallbacks = run.fallbacks.len(),
            elapsed_ms = run.elapsed.as_millis() as u64,
            "pipeline complete"
        );
        progress.done(&run);
        run
    }
}

fn settle<T>(stage: Stage, outcome: StageOutcome<T>, fallbacks: &mut Vec<StageFallback>) -> T {
    let (value, reason) = outcome.into_parts();
    if let Some(reason) = reason {
        warn!(%stage, kind = reason.kind(), %reason, "stage fell back");
        fallbacks.push(StageFallback { stage, reason });
    }
    value
}
