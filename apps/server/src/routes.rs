use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::{HeaderName, StatusCode, header};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use supportflow_core::{ResponseMetadata, SilentProgress, chunk_text, suggest_sources};
use supportflow_search::{SourceSummary, summarize_sources};
use supportflow_shared::{Message, RagSource, Role, TicketId, TicketRecord};

use crate::state::AppState;

const THINKING_MESSAGE: &str = "Analyzing your request...";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/copilot", post(copilot))
        .route("/sources", get(sources))
        .route("/suggest-sources", post(suggest))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// One message as sent by OpenAI-style clients; `content` may be null.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Self {
            role: wire.role,
            content: wire.content.unwrap_or_default(),
        }
    }
}

/// OpenAI-style chat request. Unknown fields (model, temperature, tools) are
/// accepted and ignored.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionRequest {
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub selected_sources: Option<Vec<String>>,
    #[serde(default)]
    pub ticket_id: Option<String>,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Serialize)]
pub struct ChatCompletion {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub choices: Vec<CompletionChoice>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Serialize)]
pub struct CompletionChoice {
    pub index: u32,
    pub message: Message,
    pub finish_reason: &'static str,
}

#[derive(Debug, Serialize)]
pub struct SourcesResponse {
    pub sources: Vec<SourceSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub suggested_sources: Vec<RagSource>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "SupportFlow API is running",
    }))
}

async fn copilot(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    let streaming = request.stream;
    let record = ticket_record(request);

    tracing::info!(ticket_id = %record.ticket_id, streaming, "copilot request");

    if streaming {
        return Ok(stream_reply(state, record).into_response());
    }

    let run = state.pipeline.run(record, &SilentProgress).await;
    let completion = ChatCompletion {
        id: format!("chatcmpl-{}", run.record.ticket_id),
        object: "chat.completion",
        created: chrono::Utc::now().timestamp(),
        choices: vec![CompletionChoice {
            index: 0,
            message: Message::assistant(run.record.draft_response.clone()),
            finish_reason: "stop",
        }],
        metadata: run.formatted.metadata,
    };
    Ok(Json(completion).into_response())
}

async fn sources(State(state): State<AppState>) -> Json<SourcesResponse> {
    let Some(backend) = state.search.backend().await else {
        return Json(SourcesResponse {
            sources: Vec::new(),
            error: Some("search backend not connected".to_string()),
        });
    };

    match backend.list_chunks(state.server.sources_limit).await {
        Ok(rows) => Json(SourcesResponse {
            sources: summarize_sources(&rows),
            error: None,
        }),
        Err(e) => {
            tracing::warn!(error = %e, "listing sources failed");
            Json(SourcesResponse {
                sources: Vec::new(),
                error: Some(e.to_string()),
            })
        }
    }
}

async fn suggest(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let Json(request) = payload?;
    let query = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .and_then(|m| m.content.as_deref())
        .unwrap_or_default();

    let suggested_sources = suggest_sources(
        &state.search,
        query,
        state.server.suggest_limit,
        state.preview_chars,
        state.deadline_secs,
    )
    .await;
    Ok(Json(SuggestResponse { suggested_sources }))
}

fn ticket_record(request: ChatCompletionRequest) -> TicketRecord {
    let ticket_id = request
        .ticket_id
        .map(TicketId)
        .unwrap_or_else(TicketId::generate);
    let messages = request.messages.into_iter().map(Message::from).collect();
    TicketRecord::new(ticket_id, "", request.selected_sources, messages)
}

// ---------------------------------------------------------------------------
// Streaming
// ---------------------------------------------------------------------------

fn delta_event(content: &str) -> Result<Event, Infallible> {
    let payload = serde_json::json!({
        "choices": [{ "delta": { "content": content }, "index": 0 }]
    });
    Ok(Event::default().data(payload.to_string()))
}

/// SSE reply: a thinking delta, the formatted message in chunks, then
/// `[DONE]`. The pipeline runs inside the stream, so a client disconnect
/// drops it mid-stage.
fn stream_reply(state: AppState, record: TicketRecord) -> impl IntoResponse {
    let chunk_chars = state.server.stream_chunk_chars;
    let delay = Duration::from_millis(state.server.stream_chunk_delay_ms);

    let thinking = stream::once(async { delta_event(THINKING_MESSAGE) });
    let body = stream::once(async move {
        let run = state.pipeline.run(record, &SilentProgress).await;
        chunk_text(&run.formatted.message, chunk_chars)
    })
    .flat_map(stream::iter)
    .then(move |chunk| async move {
        tokio::time::sleep(delay).await;
        delta_event(&chunk)
    });
    let done = stream::once(async { Ok::<_, Infallible>(Event::default().data("[DONE]")) });

    let events: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(thinking.chain(body).chain(done));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(events),
    )
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ErrorBody {
    error_code: String,
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error_code: String,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            error_code: error_code.into(),
            message: message.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), "invalid_request", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error_code: self.error_code,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
