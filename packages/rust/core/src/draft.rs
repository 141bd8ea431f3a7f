//! Reply drafting from retrieved context.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use supportflow_llm::{ChatModel, ChatRequest};

use crate::outcome::{FallbackReason, StageOutcome, with_deadline};

/// Draft used when the generation call fails.
pub const DRAFT_UNAVAILABLE: &str = "I couldn't generate a response.";

fn system_prompt(context: &str) -> String {
    format!(
        "You are a helpful and professional Customer Support Agent.
Your goal is to draft a response to the user's inquiry based *strictly* on the provided context.

Guidelines:
- Tone: friendly, empathetic, and professional.
- Format: clear, concise paragraphs. Use bullet points if listing steps.
- If the context doesn't contain the answer, politely state that you will escalate the ticket.
- Include links to relevant documentation if available in the context.

Context:
{context}"
    )
}

/// Drafting stage. The reply is taken verbatim.
pub struct Drafter {
    model: Arc<dyn ChatModel>,
    temperature: f32,
    deadline_secs: u64,
}

impl Drafter {
    pub fn new(model: Arc<dyn ChatModel>, temperature: f32, deadline_secs: u64) -> Self {
        Self {
            model,
            temperature,
            deadline_secs,
        }
    }

    #[instrument(skip_all, fields(model = %self.model.model_id()))]
    pub async fn draft(&self, query: &str, context: &str) -> StageOutcome<String> {
        let request = ChatRequest::new(
            system_prompt(context),
            format!("User Query: {query}"),
            self.temperature,
        );

        match with_deadline("draft", self.deadline_secs, self.model.complete(&request)).await {
            Ok(draft) => {
                info!(chars = draft.len(), "draft generated");
                StageOutcome::Primary(draft)
            }
            Err(e) => {
                warn!(error = %e, "draft generation failed");
                StageOutcome::fallback(DRAFT_UNAVAILABLE.to_string(), FallbackReason::from_error(&e))
            }
        }
    }
}
