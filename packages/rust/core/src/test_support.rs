//! In-process collaborators for stage and pipeline tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use supportflow_llm::{ChatModel, ChatRequest};
use supportflow_search::{ChunkRow, ScoreMetric, SearchBackend, SearchHit, SearchRequest};
use supportflow_shared::{Result, SupportFlowError};

/// One scripted model reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fail(String),
    /// Never resolves; exercises stage deadlines.
    Hang,
}

/// A [`ChatModel`] that pops replies in order and records every request.
pub struct ScriptedChat {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedChat {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatModel for ScriptedChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail(message)) => Err(SupportFlowError::Llm(message)),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(SupportFlowError::Llm("script exhausted".into())),
        }
    }

    fn model_id(&self) -> &str {
        "scripted"
    }
}

/// Scripted search result.
#[derive(Debug, Clone)]
pub enum SearchScript {
    Hits(Vec<SearchHit>),
    Fail(String),
    /// Never resolves; exercises search deadlines.
    Hang,
}

/// A ready [`SearchBackend`] answering every search from a script.
pub struct RecordingBackend {
    script: SearchScript,
    requests: Mutex<Vec<SearchRequest>>,
}

impl RecordingBackend {
    pub fn new(script: SearchScript) -> Arc<Self> {
        Arc::new(Self {
            script,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<SearchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchBackend for RecordingBackend {
    async fn ready(&self) -> Result<bool> {
        Ok(true)
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>> {
        self.requests.lock().unwrap().push(request.clone());
        match &self.script {
            SearchScript::Hits(hits) => Ok(hits.iter().take(request.limit).cloned().collect()),
            SearchScript::Fail(message) => Err(SupportFlowError::Search(message.clone())),
            SearchScript::Hang => std::future::pending().await,
        }
    }

    async fn list_chunks(&self, _limit: usize) -> Result<Vec<ChunkRow>> {
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

pub fn hit(document: &str, section: &str, content: &str, score: ScoreMetric) -> SearchHit {
    SearchHit {
        content: content.into(),
        document: document.into(),
        section: section.into(),
        category: Some("Billing".into()),
        score,
    }
}

/// A well-formed validator reply.
pub fn validation_reply(confidence: f64, review: bool, critique: &str) -> Reply {
    Reply::Text(
        serde_json::json!({
            "confidence_score": confidence,
            "needs_human_review": review,
            "critique": critique,
        })
        .to_string(),
    )
}
