//! Shared types, error model, and configuration for SupportFlow.
//!
//! This crate is the foundation depended on by all other SupportFlow crates.
//! It provides:
//! - [`SupportFlowError`]: the unified error type
//! - The ticket state contract ([`TicketRecord`] and its closed enums)
//! - Configuration ([`AppConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, LlmConfig, PipelineConfig, SearchConfig, ServerConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_config, validate_api_key,
};
pub use error::{Result, SupportFlowError};
pub use types::{
    Category, Message, NO_QUERY_SENTINEL, RagSource, Role, Sentiment, TicketId, TicketRecord,
    Urgency,
};
