//! Document-name filters and their GraphQL rendering.

/// Restriction on the `document` property of indexed chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentFilter {
    /// `document == name`.
    Equal(String),
    /// OR over equality filters, one per name.
    AnyOf(Vec<DocumentFilter>),
}

impl DocumentFilter {
    /// Build the filter for a caller-selected list of documents.
    ///
    /// No names means no filter, one name an equality filter, and several
    /// names an OR of equality filters in the given order.
    pub fn for_sources(sources: &[String]) -> Option<Self> {
        match sources {
            [] => None,
            [single] => Some(Self::Equal(single.clone())),
            many => Some(Self::AnyOf(
                many.iter().map(|s| Self::Equal(s.clone())).collect(),
            )),
        }
    }

    /// Document names this filter accepts.
    pub fn documents(&self) -> Vec<&str> {
        match self {
            Self::Equal(name) => vec![name.as_str()],
            Self::AnyOf(operands) => operands.iter().flat_map(|f| f.documents()).collect(),
        }
    }

    /// Render as a Weaviate GraphQL `where` argument.
    pub fn to_graphql(&self) -> String {
        match self {
            Self::Equal(name) => format!(
                "{{path: [\"document\"], operator: Equal, valueText: {}}}",
                graphql_string(name)
            ),
            Self::AnyOf(operands) => {
                let rendered: Vec<String> = operands.iter().map(Self::to_graphql).collect();
                format!("{{operator: Or, operands: [{}]}}", rendered.join(", "))
            }
        }
    }
}

/// Quote a GraphQL string literal (JSON string escaping is valid GraphQL).
pub(crate) fn graphql_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
