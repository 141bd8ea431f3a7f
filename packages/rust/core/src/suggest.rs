//! Source suggestions for a query, without drafting.

use tracing::{debug, instrument, warn};

use supportflow_search::{SearchHandle, SearchRequest};
use supportflow_shared::RagSource;

use crate::outcome::with_deadline;
use crate::retrieve::hit_source;

const UNCATEGORIZED: &str = "General";

/// Rank knowledge-base documents for `query`, one entry per document.
///
/// Search on the raw query (no category prefix, no filter). An empty query,
/// an unavailable backend, or a failed or timed-out search all yield no
/// suggestions.
#[instrument(skip_all, fields(limit = limit))]
pub async fn suggest_sources(
    search: &SearchHandle,
    query: &str,
    limit: usize,
    preview_chars: usize,
    deadline_secs: u64,
) -> Vec<RagSource> {
    if query.trim().is_empty() {
        return Vec::new();
    }
    let Some(backend) = search.backend().await else {
        debug!("search unavailable, no suggestions");
        return Vec::new();
    };

    let request = SearchRequest {
        query: query.to_string(),
        limit,
        filter: None,
    };
    let hits = match with_deadline("suggest", deadline_secs, backend.search(&request)).await {
        Ok(hits) => hits,
        Err(e) => {
            warn!(error = %e, "source suggestion search failed");
            return Vec::new();
        }
    };

    let mut suggested: Vec<RagSource> = Vec::new();
    for hit in &hits {
        if suggested.iter().any(|s| s.document == hit.document) {
            continue;
        }
        suggested.push(hit_source(hit, UNCATEGORIZED, preview_chars));
    }
    suggested
}

#[cfg(test)]
mod tests {
    use super::*;
    use supportflow_search::ScoreMetric;

    use crate::test_support::{RecordingBackend, SearchScript, hit};

    #[tokio::test]
    async fn dedupes_by_document_keeping_best_ranked() {
        let mut uncategorized = hit("faq.md", "Login", "Reset your password.", ScoreMetric::Unknown);
        uncategorized.category = None;
        let backend = RecordingBackend::new(SearchScript::Hits(vec![
            hit("billing_guide.md", "Refunds", "Refunds.", ScoreMetric::Certainty(0.9)),
            hit("billing_guide.md", "Invoices", "Invoices.", ScoreMetric::Certainty(0.8)),
            uncategorized,
        ]));
        let handle = SearchHandle::new(backend.clone());

        let suggested = suggest_sources(&handle, "refund", 5, 150, 30).await;
        assert_eq!(suggested.len(), 2);
        assert_eq!(suggested[0].section, "Refunds");
        assert_eq!(suggested[0].relevance, 0.9);
        assert_eq!(suggested[1].category, "General");
        assert_eq!(suggested[1].relevance, 0.75);

        let request = &backend.requests()[0];
        assert_eq!(request.query, "refund");
        assert_eq!(request.limit, 5);
        assert!(request.filter.is_none());
    }

    #[tokio::test]
    async fn empty_query_or_no_backend_yields_nothing() {
        let handle = SearchHandle::new(RecordingBackend::new(SearchScript::Hits(vec![hit(
            "a.md",
            "s",
            "c",
            ScoreMetric::Unknown,
        )])));
        assert!(suggest_sources(&handle, "   ", 5, 150, 30).await.is_empty());

        let offline = SearchHandle::disconnected("offline");
        assert!(suggest_sources(&offline, "refund", 5, 150, 30).await.is_empty());
    }

    #[tokio::test]
    async fn search_error_yields_nothing() {
        let handle = SearchHandle::new(RecordingBackend::new(SearchScript::Fail("boom".into())));
        assert!(suggest_sources(&handle, "refund", 5, 150, 30).await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_search_times_out_to_nothing() {
        let backend = RecordingBackend::new(SearchScript::Hang);
        let handle = SearchHandle::new(backend.clone());

        assert!(suggest_sources(&handle, "refund", 5, 150, 2).await.is_empty());
        assert_eq!(backend.requests().len(), 1);
    }
}
