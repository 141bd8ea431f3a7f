//! The ticket state contract threaded through the support pipeline.
//!
//! A [`TicketRecord`] is created per incoming query, passed by value from
//! stage to stage, and dropped once the formatted reply has been returned.
//! Each `with_*` helper consumes the record and returns the merged one, so a
//! stage can only touch the fields its helper names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SupportFlowError;

/// Query used when no user text can be extracted from the request.
pub const NO_QUERY_SENTINEL: &str = "No query provided";

// ---------------------------------------------------------------------------
// TicketId
// ---------------------------------------------------------------------------

/// Opaque ticket identifier supplied by the caller (never validated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(pub String);

impl TicketId {
    /// Generate a fresh time-sortable identifier for callers that have none.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for TicketId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Closed enumerations
// ---------------------------------------------------------------------------

/// Routing category of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    Billing,
    #[default]
    Technical,
    Feature,
    Bug,
}

impl Category {
    pub const ALL: [Category; 4] = [Self::Billing, Self::Technical, Self::Feature, Self::Bug];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Billing => "Billing",
            Self::Technical => "Technical",
            Self::Feature => "Feature",
            Self::Bug => "Bug",
        }
    }
}

/// Customer sentiment detected in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    #[default]
    Neutral,
    Negative,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Self::Positive, Self::Neutral, Self::Negative];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "Positive",
            Self::Neutral => "Neutral",
            Self::Negative => "Negative",
        }
    }
}

/// How quickly the ticket needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Urgency {
    pub const ALL: [Urgency; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

/// Exact-spelling parse shared by the three enums; anything else is rejected.
macro_rules! impl_closed_enum {
    ($ty:ident, $label:literal) => {
        impl FromStr for $ty {
            type Err = SupportFlowError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                $ty::ALL
                    .into_iter()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| SupportFlowError::validation(format!("unknown {}: {s:?}", $label)))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_closed_enum!(Category, "category");
impl_closed_enum!(Sentiment, "sentiment");
impl_closed_enum!(Urgency, "urgency");

// ---------------------------------------------------------------------------
// Conversation messages
// ---------------------------------------------------------------------------

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
    /// Tool/function messages and anything else a transport forwards.
    #[serde(other)]
    Other,
}

/// One role-tagged message in the conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RagSource
// ---------------------------------------------------------------------------

/// Metadata describing one retrieved knowledge snippet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagSource {
    /// Source document name.
    pub document: String,
    /// Section within the document.
    pub section: String,
    /// Category stored with the chunk (or the ticket's category for fallbacks).
    pub category: String,
    /// Normalized similarity in [0, 1], rounded to 3 decimals.
    pub relevance: f64,
    /// Leading characters of the chunk, suffixed with `...`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_preview: Option<String>,
}

// ---------------------------------------------------------------------------
// TicketRecord
// ---------------------------------------------------------------------------

/// The single state value threaded through every pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub ticket_id: TicketId,
    pub customer_query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_sources: Option<Vec<String>>,

    pub category: Category,
    pub sentiment: Sentiment,
    pub urgency: Urgency,
    pub retrieved_context: Vec<String>,
    pub rag_sources: Vec<RagSource>,

    pub draft_response: String,
    pub confidence_score: f64,
    pub critique: String,
    pub needs_human_review: bool,

    messages: Vec<Message>,
}

impl TicketRecord {
    /// Seed a record for one request.
    ///
    /// An empty `selected_sources` list is treated as "no filter".
    pub fn new(
        ticket_id: TicketId,
        customer_query: impl Into<String>,
        selected_sources: Option<Vec<String>>,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            ticket_id,
            customer_query: customer_query.into(),
            selected_sources: selected_sources.filter(|s| !s.is_empty()),
            category: Category::default(),
            sentiment: Sentiment::default(),
            urgency: Urgency::default(),
            retrieved_context: Vec::new(),
            rag_sources: Vec::new(),
            draft_response: String::new(),
            confidence_score: 0.0,
            critique: String::new(),
            needs_human_review: true,
            messages,
        }
    }

    /// Conversation history, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn with_query(self, customer_query: String) -> Self {
        Self {
            customer_query,
            ..self
        }
    }

    pub fn with_classification(
        self,
        category: Category,
        sentiment: Sentiment,
        urgency: Urgency,
    ) -> Self {
        Self {
            category,
            sentiment,
            urgency,
            ..self
        }
    }

    pub fn with_retrieval(self, retrieved_context: Vec<String>, rag_sources: Vec<RagSource>) -> Self {
        Self {
            retrieved_context,
            rag_sources,
            ..self
        }
    }

    pub fn with_draft(self, draft_response: String) -> Self {
        Self {
            draft_response,
            ..self
        }
    }

    pub fn with_validation(
        self,
        confidence_score: f64,
        needs_human_review: bool,
        critique: String,
    ) -> Self {
        Self {
            confidence_score,
            needs_human_review,
            critique,
            ..self
        }
    }

    /// Append a message; earlier entries are never rewritten.
    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    /// Retrieved snippets joined into the single context block fed to the LLM.
    pub fn context_block(&self) -> String {
        self.retrieved_context.join("\n")
    }
}
