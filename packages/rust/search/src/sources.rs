//! Aggregation of indexed chunks into per-document source summaries.

use serde::Serialize;

use crate::ChunkRow;

/// Category reported for documents indexed without one.
const UNCATEGORIZED: &str = "General";

/// One selectable knowledge-base document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    /// Object id of the document's first listed chunk.
    pub id: String,
    pub document: String,
    pub category: String,
    /// Distinct section names, first-seen order.
    pub sections: Vec<String>,
    pub total_chunks: usize,
}

/// Group chunk rows by document, preserving the order documents first appear.
pub fn summarize_sources(rows: &[ChunkRow]) -> Vec<SourceSummary> {
    let mut summaries: Vec<SourceSummary> = Vec::new();

    for row in rows {
        let idx = match summaries.iter().position(|s| s.document == row.document) {
            Some(idx) => idx,
            None => {
                summaries.push(SourceSummary {
                    id: row.id.clone(),
                    document: row.document.clone(),
                    category: row
                        .category
                        .clone()
                        .filter(|c| !c.is_empty())
                        .unwrap_or_else(|| UNCATEGORIZED.to_string()),
                    sections: Vec::new(),
                    total_chunks: 0,
                });
                summaries.len() - 1
            }
        };

        let summary = &mut summaries[idx];
        summary.total_chunks += 1;
        if !row.section.is_empty() && !summary.sections.contains(&row.section) {
            summary.sections.push(row.section.clone());
        }
    }

    summaries
}
