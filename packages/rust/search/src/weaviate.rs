//! Weaviate client speaking the REST readiness probe and GraphQL `Get` queries.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use supportflow_shared::{Result, SearchConfig, SupportFlowError};

use crate::filter::graphql_string;
use crate::{ChunkRow, ScoreMetric, SearchBackend, SearchHit, SearchRequest};

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("SupportFlow/", env!("CARGO_PKG_VERSION"));

/// Header carrying the vectorizer key to Weaviate's text2vec-openai module.
const VECTORIZER_KEY_HEADER: &str = "x-openai-api-key";

/// Collection names are interpolated into GraphQL, so they must be identifiers.
static CLASS_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Za-z0-9_]*$").expect("valid class regex"));

/// [`SearchBackend`] backed by a Weaviate instance.
#[derive(Debug, Clone)]
pub struct WeaviateClient {
    client: Client,
    base: String,
    collection: String,
}

impl WeaviateClient {
    pub fn new(
        base_url: &str,
        collection: &str,
        api_key: Option<&str>,
        vectorizer_key: Option<&str>,
        timeout: Duration,
    ) -> Result<Self> {
        let base = Url::parse(base_url).map_err(|e| {
            SupportFlowError::config(format!("invalid search url '{base_url}': {e}"))
        })?;

        if !CLASS_NAME_RE.is_match(collection) {
            return Err(SupportFlowError::config(format!(
                "invalid collection name '{collection}': expected a capitalized GraphQL identifier"
            )));
        }

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key.filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| SupportFlowError::config(format!("invalid search api key: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Some(key) = vectorizer_key.filter(|k| !k.is_empty()) {
            let value = HeaderValue::from_str(key)
                .map_err(|e| SupportFlowError::config(format!("invalid vectorizer key: {e}")))?;
            headers.insert(VECTORIZER_KEY_HEADER, value);
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| SupportFlowError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
            collection: collection.to_string(),
        })
    }

    /// Build from the `[search]` section, resolving keys from the environment.
    pub fn from_config(config: &SearchConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).ok();
        let vectorizer_key = std::env::var(&config.openai_key_env).ok();
        Self::new(
            &config.url,
            &config.collection,
            api_key.as_deref(),
            vectorizer_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// GraphQL for a `nearText` search.
    pub fn near_text_query(&self, request: &SearchRequest) -> String {
        let mut args = format!(
            "nearText: {{concepts: [{}]}}, limit: {}",
            graphql_string(&request.query),
            request.limit
        );
        if let Some(filter) = &request.filter {
            args.push_str(", where: ");
            args.push_str(&filter.to_graphql());
        }
        format!(
            "{{ Get {{ {}({args}) {{ content document section category _additional {{ certainty distance }} }} }} }}",
            self.collection
        )
    }

    fn list_query(&self, limit: usize) -> String {
        format!(
            "{{ Get {{ {}(limit: {limit}) {{ document section category _additional {{ id }} }} }} }}",
            self.collection
        )
    }

    /// POST a GraphQL query and return the objects of the collection.
    async fn graphql(&self, query: String) -> Result<Vec<Value>> {
        let url = format!("{}/v1/graphql", self.base);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "query": query }))
            .send()
            .await
            .map_err(|e| SupportFlowError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SupportFlowError::Search(format!("{url}: HTTP {status}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SupportFlowError::Search(format!("invalid GraphQL payload: {e}")))?;

        collection_objects(body, &self.collection)
    }
}

/// Pull `data.Get.<collection>` out of a GraphQL response.
fn collection_objects(mut body: Value, collection: &str) -> Result<Vec<Value>> {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors
                .iter()
                .filter_map(|e| e.get("message").and_then(Value::as_str))
                .collect();
            return Err(SupportFlowError::Search(format!(
                "GraphQL error: {}",
                messages.join("; ")
            )));
        }
    }

    match body
        .pointer_mut(&format!("/data/Get/{collection}"))
        .map(Value::take)
    {
        Some(Value::Array(objects)) => Ok(objects),
        Some(Value::Null) => Ok(Vec::new()),
        None => Err(SupportFlowError::Search(format!(
            "malformed GraphQL payload: missing data.Get.{collection}"
        ))),
        Some(other) => Err(SupportFlowError::Search(format!(
            "unexpected {collection} payload: {other}"
        ))),
    }
}

fn str_prop(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Certainty wins over distance; neither is `Unknown`.
fn score_of(object: &Value) -> ScoreMetric {
    let additional = object.get("_additional");
    let metric = |key: &str| additional.and_then(|a| a.get(key)).and_then(Value::as_f64);

    match (metric("certainty"), metric("distance")) {
        (Some(certainty), _) => ScoreMetric::Certainty(certainty),
        (None, Some(distance)) => ScoreMetric::Distance(distance),
        (None, None) => ScoreMetric::Unknown,
    }
}

fn parse_hit(object: &Value) -> SearchHit {
    SearchHit {
        content: str_prop(object, "content").unwrap_or_default(),
        document: str_prop(object, "document").unwrap_or_else(|| "Unknown".into()),
        section: str_prop(object, "section").unwrap_or_else(|| "Unknown".into()),
        category: str_prop(object, "category"),
        score: score_of(object),
    }
}

fn parse_row(object: &Value) -> ChunkRow {
    ChunkRow {
        id: object
            .pointer("/_additional/id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        document: str_prop(object, "document").unwrap_or_else(|| "Unknown".into()),
        section: str_prop(object, "section").unwrap_or_else(|| "Unknown".into()),
        category: str_prop(object, "category"),
    }
}

#[async_trait]
impl SearchBackend for WeaviateClient {
    async fn ready(&self) -> Result<bool> {
        let url = format!("{}/v1/.well-known/ready", self.base);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SupportFlowError::Network(format!("{url}: {e}")))?;
        Ok(response.status().is_success())
    }

    #[instrument(skip_all, fields(limit = request.limit, filtered = request.filter.is_some()))]
    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let objects = self.graphql(self.near_text_query(request)).await?;
        debug!(hits = objects.len(), "nearText search complete");
        Ok(objects.iter().map(parse_hit).collect())
    }

    async fn list_chunks(&self, limit: usize) -> Result<Vec<ChunkRow>> {
        let objects = self.graphql(self.list_query(limit)).await?;
        Ok(objects.iter().map(parse_row).collect())
    }

    async fn close(&self) {
        info!(base = %self.base, "closing search client");
    }

    fn name(&self) -> &str {
        "weaviate"
    }
}
