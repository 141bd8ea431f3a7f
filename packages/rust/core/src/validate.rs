//! Draft quality validation and the review gate.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use supportflow_llm::{ChatModel, ChatRequest, extract_json_object};

use crate::outcome::{FallbackReason, StageOutcome, with_deadline};

/// Critique attached to the safe triple.
pub const VALIDATION_FAILED_CRITIQUE: &str = "Validation failed, requiring manual review.";

const VALIDATOR_PROMPT: &str = "You are a Quality Assurance Specialist for Customer Support.
Review the draft response against the user query and context.

Check for:
1. Accuracy: does the response directly answer the query using the context?
2. Completeness: are all parts of the question addressed?
3. Tone: is it professional?
4. Hallucination: does it invent facts not in the context?

Output JSON matching the schema.";

/// The validator's judgment of one draft.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Validation {
    pub confidence_score: f64,
    pub needs_human_review: bool,
    pub critique: String,
}

impl Validation {
    /// Confidence 0.0, review required.
    pub fn safe() -> Self {
        Self {
            confidence_score: 0.0,
            needs_human_review: true,
            critique: VALIDATION_FAILED_CRITIQUE.to_string(),
        }
    }

    /// Require review whenever confidence is below `threshold`.
    pub fn gated(mut self, threshold: f64) -> Self {
        if self.confidence_score < threshold && !self.needs_human_review {
            warn!(
                confidence = self.confidence_score,
                threshold, "low confidence reported without review flag, requiring review"
            );
            self.needs_human_review = true;
        }
        self
    }
}

/// Parse a validator reply. All three fields are required and confidence
/// must be a finite value in [0, 1].
pub fn parse_validation(text: &str) -> Result<Validation, FallbackReason> {
    let object = extract_json_object(text).map_err(|e| FallbackReason::Malformed(e.to_string()))?;
    let validation: Validation = serde_json::from_value(serde_json::Value::Object(object))
        .map_err(|e| FallbackReason::Malformed(format!("schema mismatch: {e}")))?;

    if !(0.0..=1.0).contains(&validation.confidence_score) {
        return Err(FallbackReason::OutOfRange(format!(
            "confidence_score={}",
            validation.confidence_score
        )));
    }
    Ok(validation)
}

fn format_instructions(threshold: f64) -> String {
    format!(
        "Respond with a single JSON object with exactly these fields:
- \"confidence_score\" (number between 0.0 and 1.0): confidence in the answer's accuracy
- \"needs_human_review\" (boolean): true if the score is below {threshold} or if the answer states it cannot help
- \"critique\" (string): brief explanation of the score"
    )
}

/// Validation stage.
pub struct Validator {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    deadline_secs: u64,
    review_threshold: f64,
}

impl Validator {
    pub fn new(
        model: Arc<dyn ChatModel>,
        temperature: f32,
        deadline_secs: u64,
        review_threshold: f64,
    ) -> Self {
        Self {
            model,
            temperature,
            deadline_secs,
            review_threshold,
        }
    }

    /// Judge `draft`. Every failure mode resolves to [`Validation::safe`].
    #[instrument(skip_all, fields(model = %self.model.model_id()))]
    pub async fn validate(&self, query: &str, context: &str, draft: &str) -> StageOutcome<Validation> {
        let user = format!(
            "Query: {query}\nContext: {context}\nDraft Response: {draft}\n\n{}",
            format_instructions(self.review_threshold)
        );
        let request = ChatRequest::new(VALIDATOR_PROMPT, user, self.temperature).json();

        let parsed = match with_deadline("validate", self.deadline_secs, self.model.complete(&request))
            .await
        {
            Ok(reply) => parse_validation(&reply),
            Err(e) => Err(FallbackReason::from_error(&e)),
        };

        match parsed {
            Ok(validation) => {
                let validation = validation.gated(self.review_threshold);
                info!(
                    confidence = validation.confidence_score,
                    needs_review = validation.needs_human_review,
                    "draft validated"
                );
                StageOutcome::Primary(validation)
            }
            Err(reason) => {
                warn!(%reason, "validation failed, forcing manual review");
                StageOutcome::fallback(Validation::safe(), reason)
            }
        }
    }
}
