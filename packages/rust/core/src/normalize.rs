//! Query extraction from the conversation history.

use supportflow_shared::{NO_QUERY_SENTINEL, Role, TicketRecord};

/// Resolve the query text for `record`.
///
/// A non-empty `customer_query` is returned unchanged. Otherwise the most
/// recent user message wins, and with none the sentinel is used.
pub fn normalize(record: &TicketRecord) -> String {
    if !record.customer_query.is_empty() {
        return record.customer_query.clone();
    }

    record
        .messages()
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.clone())
        .unwrap_or_else(|| NO_QUERY_SENTINEL.to_string())
}
