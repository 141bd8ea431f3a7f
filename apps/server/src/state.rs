use std::sync::Arc;

use supportflow_core::SupportPipeline;
use supportflow_search::SearchHandle;
use supportflow_shared::{AppConfig, ServerConfig};

/// Shared request state. Cloned per request; every field is reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SupportPipeline>,
    pub search: SearchHandle,
    pub server: Arc<ServerConfig>,
    pub preview_chars: usize,
    pub deadline_secs: u64,
}

impl AppState {
    pub fn new(pipeline: SupportPipeline, search: SearchHandle, config: &AppConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            search,
            server: Arc::new(config.server.clone()),
            preview_chars: config.pipeline.preview_chars,
            deadline_secs: config.pipeline.stage_timeout_secs,
        }
    }
}
