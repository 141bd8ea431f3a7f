//! Static knowledge substitute used when live retrieval cannot answer.

use supportflow_shared::{Category, RagSource};

/// Source label for the substitute when search is unavailable or empty.
pub const SUBSTITUTE_DOCUMENT: &str = "Mock Knowledge Base";
/// Source label for the substitute after a search error.
pub const ERROR_SUBSTITUTE_DOCUMENT: &str = "Mock Knowledge Base (Error Fallback)";

const SUBSTITUTE_SECTION: &str = "General";

/// Which rung of the retrieval ladder produced the substitute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    /// Backend unavailable, or it returned no results.
    Substitute,
    /// The search call itself failed.
    Error,
}

impl FallbackKind {
    pub fn document(&self) -> &'static str {
        match self {
            Self::Substitute => SUBSTITUTE_DOCUMENT,
            Self::Error => ERROR_SUBSTITUTE_DOCUMENT,
        }
    }

    pub fn relevance(&self) -> f64 {
        match self {
            Self::Substitute => 0.85,
            Self::Error => 0.80,
        }
    }
}

/// Example snippets for `category`.
pub fn static_snippets(category: Category) -> &'static [&'static str] {
    match category {
        Category::Billing => &[
            "To request a refund, navigate to Settings > Billing > Transaction History and click 'Request Refund' next to the charge.",
            "Duplicate charges are typically processed within 3-5 business days. Contact billing@example.com for urgent issues.",
        ],
        Category::Technical => &[
            "For API 500 errors, first check our status page at status.example.com for any ongoing incidents.",
            "Common causes of /v1/users endpoint failures: invalid API key, rate limiting (100 req/min), or malformed request body.",
        ],
        Category::Feature => &[
            "To enable dark mode: Settings > Appearance > Theme > Select 'Dark'.",
            "Feature requests can be submitted at feedback.example.com. Popular requests are reviewed monthly.",
        ],
        Category::Bug => &[
            "If you encounter a crash, please provide: 1) Browser/OS version, 2) Steps to reproduce, 3) Console errors (F12).",
            "Known issue: Data sync delays may occur during peak hours (9-11 AM EST). We're working on scaling improvements.",
        ],
    }
}

/// The single synthetic metadata entry describing the substitute.
pub fn fallback_sources(category: Category, kind: FallbackKind) -> Vec<RagSource> {
    vec![RagSource {
        document: kind.document().to_string(),
        section: SUBSTITUTE_SECTION.to_string(),
        category: category.as_str().to_string(),
        relevance: kind.relevance(),
        content_preview: None,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_snippets() {
        for category in Category::ALL {
            assert!(!static_snippets(category).is_empty(), "{category} has no snippets");
        }
    }

    #[test]
    fn billing_substitute_mentions_refunds() {
        assert!(static_snippets(Category::Billing)[0].contains("Request Refund"));
    }

    #[test]
    fn fallback_source_labels() {
        let sources = fallback_sources(Category::Bug, FallbackKind::Substitute);
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].document, "Mock Knowledge Base");
        assert_eq!(sources[0].section, "General");
        assert_eq!(sources[0].category, "Bug");
        assert_eq!(sources[0].relevance, 0.85);

        let sources = fallback_sources(Category::Bug, FallbackKind::Error);
        assert_eq!(sources[0].document, "Mock Knowledge Base (Error Fallback)");
        assert_eq!(sources[0].relevance, 0.80);
    }
}
