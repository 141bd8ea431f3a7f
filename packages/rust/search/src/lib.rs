//! Vector-search capability over the support knowledge base.
//!
//! The retriever talks to a [`SearchBackend`] through a process-wide
//! [`SearchHandle`]. Scores come back as an explicit [`ScoreMetric`] so
//! relevance derivation is a total match rather than an attribute probe.

mod filter;
mod handle;
mod sources;
mod weaviate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use supportflow_shared::Result;

pub use filter::DocumentFilter;
pub use handle::{Availability, SearchHandle};
pub use sources::{SourceSummary, summarize_sources};
pub use weaviate::WeaviateClient;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// One similarity query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Text the backend vectorizes.
    pub query: String,
    /// Maximum number of hits.
    pub limit: usize,
    /// Optional restriction on the `document` property.
    pub filter: Option<DocumentFilter>,
}

/// Similarity signal attached to a hit by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoreMetric {
    /// Normalized certainty in [0, 1] (higher is closer).
    Certainty(f64),
    /// Vector distance (lower is closer).
    Distance(f64),
    /// The backend reported neither.
    Unknown,
}

/// One chunk returned by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub content: String,
    pub document: String,
    pub section: String,
    /// Category stored with the chunk, when the index has one.
    pub category: Option<String>,
    pub score: ScoreMetric,
}

/// Chunk metadata used for listing available sources.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRow {
    pub id: String,
    pub document: String,
    pub section: String,
    pub category: Option<String>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// A search service that tolerates concurrent read-only queries.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Health probe; `Ok(false)` means reachable but not serving.
    async fn ready(&self) -> Result<bool>;

    /// Run a similarity search.
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>>;

    /// List up to `limit` chunks without ranking.
    async fn list_chunks(&self, limit: usize) -> Result<Vec<ChunkRow>>;

    /// Release backend resources. Called once at shutdown.
    async fn close(&self) {}

    /// Backend name for tracing.
    fn name(&self) -> &str;
}
