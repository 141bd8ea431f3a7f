//! Final message and metadata envelope.

use serde::Serialize;

use supportflow_shared::{Category, RagSource, Sentiment, TicketRecord, Urgency};

const REVIEW_NOTE: &str = "**Note:** This response should be reviewed by a human before sending.";

/// Structured metadata returned alongside the draft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseMetadata {
    pub confidence: f64,
    pub critique: String,
    pub needs_human_review: bool,
    pub category: Category,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub rag_sources: Vec<RagSource>,
}

/// The human-readable message plus its metadata envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResponse {
    pub message: String,
    pub metadata: ResponseMetadata,
}

/// Confidence as a whole percentage, rounded half away from zero.
pub fn confidence_percent(confidence: f64) -> i64 {
    (confidence * 100.0).round() as i64
}

pub fn format_response(record: &TicketRecord) -> FormattedResponse {
    let mut message = format!(
        "Here's my draft response for this ticket:\n\n---\n\n{}\n\n---\n\n**AI Confidence:** {}%\n",
        record.draft_response,
        confidence_percent(record.confidence_score)
    );
    if record.needs_human_review {
        message.push('\n');
        message.push_str(REVIEW_NOTE);
    }
    if !record.critique.is_empty() {
        message.push_str("\n**Validation Notes:** ");
        message.push_str(&record.critique);
    }

    FormattedResponse {
        message,
        metadata: ResponseMetadata {
            confidence: record.confidence_score,
            critique: record.critique.clone(),
            needs_human_review: record.needs_human_review,
            category: record.category,
            sentiment: record.sentiment,
            urgency: record.urgency,
            rag_sources: record.rag_sources.clone(),
        },
    }
}

/// Split `text` into pieces of at most `chars` characters for streaming.
pub fn chunk_text(text: &str, chars: usize) -> Vec<String> {
    let chars = chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;

    for ch in text.chars() {
        current.push(ch);
        count += 1;
        if count == chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
