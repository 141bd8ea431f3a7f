use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use supportflow_core::{PipelineSettings, SupportPipeline};
use supportflow_llm::{ChatModel, ChatRequest};
use supportflow_search::{ChunkRow, ScoreMetric, SearchBackend, SearchHandle, SearchHit, SearchRequest};
use supportflow_server::routes;
use supportflow_server::state::AppState;
use supportflow_shared::{AppConfig, Result};

/// Answers each stage by looking at the system prompt.
struct StageAwareChat;

#[async_trait]
impl ChatModel for StageAwareChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let system = &request.messages[0].content;
        let reply = if system.contains("routing agent") {
            r#"{"category": "Billing", "sentiment": "Negative", "urgency": "High"}"#
        } else if system.contains("Quality Assurance") {
            r#"{"confidence_score": 0.91, "needs_human_review": false, "critique": "Grounded."}"#
        } else {
            "Refunds are issued from Settings > Billing."
        };
        Ok(reply.to_string())
    }

    fn model_id(&self) -> &str {
        "stage-aware"
    }
}

struct FixtureSearch;

#[async_trait]
impl SearchBackend for FixtureSearch {
    async fn ready(&self) -> Result<bool> {
        Ok(true)
    }

    async fn search(&self, _request: &SearchRequest) -> Result<Vec<SearchHit>> {
        let hit = |document: &str, section: &str, score| SearchHit {
            content: format!("{section} content"),
            document: document.to_string(),
            section: section.to_string(),
            category: Some("Billing".to_string()),
            score,
        };
        Ok(vec![
            hit("billing_guide.md", "Refunds", ScoreMetric::Certainty(0.93)),
            hit("billing_guide.md", "Invoices", ScoreMetric::Distance(0.3)),
            hit("faq.md", "Payments", ScoreMetric::Unknown),
        ])
    }

    async fn list_chunks(&self, _limit: usize) -> Result<Vec<ChunkRow>> {
        let row = |id: &str, document: &str, section: &str| ChunkRow {
            id: id.to_string(),
            document: document.to_string(),
            section: section.to_string(),
            category: Some("Billing".to_string()),
        };
        Ok(vec![
            row("1", "billing_guide.md", "Refunds"),
            row("2", "billing_guide.md", "Invoices"),
            row("3", "faq.md", "Payments"),
        ])
    }

    fn name(&self) -> &str {
        "fixture"
    }
}

fn app(search: SearchHandle) -> axum::Router {
    let mut config = AppConfig::default();
    config.server.stream_chunk_delay_ms = 0;
    let pipeline =
        SupportPipeline::new(Arc::new(StageAwareChat), search.clone(), PipelineSettings::default());
    routes::router(AppState::new(pipeline, search, &config))
}

fn connected() -> SearchHandle {
    SearchHandle::new(Arc::new(FixtureSearch))
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("Failed to build request.")
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body.");
    String::from_utf8(bytes.to_vec()).expect("Body is not UTF-8.")
}

#[tokio::test]
async fn root_reports_ok() {
    let response = app(connected())
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .expect("Failed to call /.");

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn copilot_batch_returns_completion_with_metadata() {
    let payload = serde_json::json!({
        "model": "gpt-4",
        "stream": false,
        "temperature": 0.5,
        "messages": [
            { "role": "system", "content": "You are helpful." },
            { "role": "user", "content": "I was charged twice, can I get a refund?" }
        ],
        "selected_sources": ["billing_guide.md"]
    });
    let response = app(connected())
        .oneshot(post_json("/copilot", payload))
        .await
        .expect("Failed to call /copilot.");

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(
        body["choices"][0]["message"]["content"],
        "Refunds are issued from Settings > Billing."
    );

    let metadata = &body["metadata"];
    assert_eq!(metadata["category"], "Billing");
    assert_eq!(metadata["sentiment"], "Negative");
    assert_eq!(metadata["urgency"], "High");
    assert_eq!(metadata["confidence"], 0.91);
    assert_eq!(metadata["needs_human_review"], false);
    assert_eq!(metadata["rag_sources"].as_array().map(Vec::len), Some(3));
    assert_eq!(metadata["rag_sources"][1]["relevance"], 0.7);
}

#[tokio::test]
async fn copilot_stream_emits_thinking_chunks_and_done() {
    let payload = serde_json::json!({
        "messages": [{ "role": "user", "content": "refund please" }]
    });
    let response = app(SearchHandle::disconnected("offline"))
        .oneshot(post_json("/copilot", payload))
        .await
        .expect("Failed to call /copilot.");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "text/event-stream"
    );
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let body = body_string(response).await;
    let events: Vec<&str> = body
        .split("\n\n")
        .filter(|e| !e.is_empty())
        .map(|e| e.trim_start_matches("data: "))
        .collect();

    assert_eq!(events.last(), Some(&"[DONE]"));

    let deltas: Vec<String> = events[..events.len() - 1]
        .iter()
        .map(|e| {
            let value: serde_json::Value = serde_json::from_str(e).expect("delta is JSON");
            value["choices"][0]["delta"]["content"]
                .as_str()
                .expect("delta content")
                .to_string()
        })
        .collect();

    assert_eq!(deltas[0], "Analyzing your request...");
    assert!(deltas[1..].iter().all(|d| d.chars().count() <= 10));
    let message: String = deltas[1..].concat();
    assert!(message.starts_with("Here's my draft response for this ticket:"));
    assert!(message.contains("**AI Confidence:** 91%"));
    assert!(message.contains("**Validation Notes:** Grounded."));
}

#[tokio::test]
async fn copilot_rejects_malformed_body() {
    let response = app(connected())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/copilot")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .expect("Failed to call /copilot.");

    assert!(response.status().is_client_error());
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error_code"], "invalid_request");
}

#[tokio::test]
async fn sources_summarizes_documents() {
    let response = app(connected())
        .oneshot(Request::builder().uri("/sources").body(Body::empty()).unwrap())
        .await
        .expect("Failed to call /sources.");

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let sources = body["sources"].as_array().expect("sources array");
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0]["document"], "billing_guide.md");
    assert_eq!(sources[0]["total_chunks"], 2);
    assert_eq!(sources[0]["sections"], serde_json::json!(["Refunds", "Invoices"]));
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn sources_without_backend_reports_error() {
    let response = app(SearchHandle::disconnected("offline"))
        .oneshot(Request::builder().uri("/sources").body(Body::empty()).unwrap())
        .await
        .expect("Failed to call /sources.");

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["sources"], serde_json::json!([]));
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn suggest_sources_dedupes_documents() {
    let payload = serde_json::json!({
        "messages": [
            { "role": "user", "content": "old question" },
            { "role": "assistant", "content": "answer" },
            { "role": "user", "content": "how do refunds work?" }
        ]
    });
    let response = app(connected())
        .oneshot(post_json("/suggest-sources", payload))
        .await
        .expect("Failed to call /suggest-sources.");

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    let suggested = body["suggested_sources"].as_array().expect("array");
    assert_eq!(suggested.len(), 2);
    assert_eq!(suggested[0]["document"], "billing_guide.md");
    assert_eq!(suggested[0]["relevance"], 0.93);
    assert_eq!(suggested[1]["document"], "faq.md");
    assert_eq!(suggested[1]["relevance"], 0.75);
}

#[tokio::test]
async fn suggest_sources_without_user_message_is_empty() {
    let payload = serde_json::json!({ "messages": [{ "role": "assistant", "content": "hi" }] });
    let response = app(connected())
        .oneshot(post_json("/suggest-sources", payload))
        .await
        .expect("Failed to call /suggest-sources.");

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["suggested_sources"], serde_json::json!([]));
}
