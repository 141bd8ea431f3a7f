//! Knowledge retrieval with the unavailable / empty / error fallback ladder.

use tracing::{info, instrument, warn};

use supportflow_search::{
    Availability, DocumentFilter, ScoreMetric, SearchHandle, SearchHit, SearchRequest,
};
use supportflow_shared::{Category, RagSource};

use crate::knowledge::{FallbackKind, fallback_sources, static_snippets};
use crate::outcome::{FallbackReason, StageOutcome, with_deadline};

/// Relevance used when the backend reports neither certainty nor distance.
const DEFAULT_RELEVANCE: f64 = 0.75;

/// Snippets plus their source metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Retrieval {
    pub context: Vec<String>,
    pub sources: Vec<RagSource>,
}

impl Retrieval {
    /// The static substitute for `category`.
    pub fn substitute(category: Category, kind: FallbackKind) -> Self {
        Self {
            context: static_snippets(category)
                .iter()
                .map(|s| s.to_string())
                .collect(),
            sources: fallback_sources(category, kind),
        }
    }
}

/// Limits for the search request and source previews.
#[derive(Debug, Clone)]
pub struct RetrieverSettings {
    /// Result count without a source filter.
    pub live_results: usize,
    /// Result count when the caller selected sources.
    pub filtered_results: usize,
    pub preview_chars: usize,
    pub deadline_secs: u64,
}

impl Default for RetrieverSettings {
    fn default() -> Self {
        Self {
            live_results: 3,
            filtered_results: 5,
            preview_chars: 150,
            deadline_secs: 30,
        }
    }
}

/// Build the similarity query for a ticket.
pub fn build_request(
    query: &str,
    category: Category,
    selected: Option<&[String]>,
    settings: &RetrieverSettings,
) -> SearchRequest {
    let filter = selected.and_then(DocumentFilter::for_sources);
    SearchRequest {
        query: format!("{category}: {query}"),
        limit: if filter.is_some() {
            settings.filtered_results
        } else {
            settings.live_results
        },
        filter,
    }
}

/// Normalized relevance in [0, 1], rounded to 3 decimals.
pub fn relevance(score: ScoreMetric) -> f64 {
    let raw = match score {
        ScoreMetric::Certainty(c) => c,
        ScoreMetric::Distance(d) => (1.0 - d).max(0.0),
        ScoreMetric::Unknown => DEFAULT_RELEVANCE,
    };
    if !raw.is_finite() {
        return DEFAULT_RELEVANCE;
    }
    round3(raw.clamp(0.0, 1.0))
}

/// Round half away from zero to 3 decimals.
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// First `chars` characters of `content`, suffixed with `...`.
pub fn content_preview(content: &str, chars: usize) -> String {
    let mut preview: String = content.chars().take(chars).collect();
    preview.push_str("...");
    preview
}

/// Source metadata for one live hit. `fallback_category` fills in a missing
/// chunk category.
pub fn hit_source(hit: &SearchHit, fallback_category: &str, preview_chars: usize) -> RagSource {
    RagSource {
        document: hit.document.clone(),
        section: hit.section.clone(),
        category: hit
            .category
            .clone()
            .unwrap_or_else(|| fallback_category.to_string()),
        relevance: relevance(hit.score),
        content_preview: Some(content_preview(&hit.content, preview_chars)),
    }
}

/// Retrieval stage backed by the process-wide search handle.
pub struct Retriever {
    search: SearchHandle,
    settings: RetrieverSettings,
}

impl Retriever {
    pub fn new(search: SearchHandle, settings: RetrieverSettings) -> Self {
        Self { search, settings }
    }

    /// Retrieve snippets for a ticket. The context is never empty.
    #[instrument(skip_all, fields(category = %category))]
    pub async fn retrieve(
        &self,
        query: &str,
        category: Category,
        selected: Option<&[String]>,
    ) -> StageOutcome<Retrieval> {
        let Some(backend) = self.search.backend().await else {
            let reason = match self.search.availability() {
                _ if self.search.is_closed() => "search handle closed".to_string(),
                Some(Availability::Unavailable { reason }) => reason.clone(),
                _ => "search backend not connected".to_string(),
            };
            warn!(%reason, "search unavailable, using static knowledge");
            return StageOutcome::fallback(
                Retrieval::substitute(category, FallbackKind::Substitute),
                FallbackReason::Unavailable(reason),
            );
        };

        let request = build_request(query, category, selected, &self.settings);
        if let Some(filter) = &request.filter {
            info!(sources = ?filter.documents(), "filtering by selected sources");
        }

        match with_deadline(
            "retrieve",
            self.settings.deadline_secs,
            backend.search(&request),
        )
        .await
        {
            Ok(hits) if hits.is_empty() => {
                warn!("search returned no results, using static knowledge");
                StageOutcome::fallback(
                    Retrieval::substitute(category, FallbackKind::Substitute),
                    FallbackReason::EmptyResults,
                )
            }
            Ok(hits) => {
                let sources = hits
                    .iter()
                    .map(|hit| hit_source(hit, category.as_str(), self.settings.preview_chars))
                    .collect();
                let context = hits.into_iter().map(|hit| hit.content).collect();
                let retrieval = Retrieval { context, sources };
                info!(count = retrieval.context.len(), "retrieved live context");
                StageOutcome::Primary(retrieval)
            }
            Err(e) => {
                warn!(error = %e, "search failed, using static knowledge");
                StageOutcome::fallback(
                    Retrieval::substitute(category, FallbackKind::Error),
                    FallbackReason::from_error(&e),
                )
            }
        }
    }
}
