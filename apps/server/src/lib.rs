//! HTTP transport for the support pipeline.
//!
//! Serves an OpenAI-style `/copilot` chat endpoint (streamed over SSE or as a
//! single completion) plus knowledge-base listing and source suggestions.

pub mod routes;
pub mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use supportflow_core::SupportPipeline;
use supportflow_llm::OpenAiChat;
use supportflow_search::SearchHandle;
use supportflow_shared::{resolve_config, validate_api_key};

use crate::state::AppState;

#[derive(Debug, Parser)]
#[command(name = "supportflow-server", version, rename_all = "kebab")]
pub struct Args {
    /// Config file (defaults to ~/.supportflow/supportflow.toml).
    #[arg(long, short = 'c', value_name = "FILE", env = "SUPPORTFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address, overriding `[server].bind`.
    #[arg(long)]
    pub bind: Option<String>,

    /// Emit JSON log lines.
    #[arg(long)]
    pub json_logs: bool,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
    init_tracing(&args);

    let config = resolve_config(args.config.as_deref())?;
    let api_key = validate_api_key(&config)?;
    let bind = args.bind.as_deref().unwrap_or(&config.server.bind);
    let addr: SocketAddr = bind
        .parse()
        .map_err(|e| eyre::eyre!("invalid bind address '{bind}': {e}"))?;

    let model = OpenAiChat::from_config(&config.llm, api_key)?;
    let search = SearchHandle::from_config(&config.search);
    // Warm the connection once; failure only degrades retrieval.
    search.connect().await;

    let pipeline = SupportPipeline::from_config(&config, Arc::new(model), search.clone());
    let state = AppState::new(pipeline, search.clone(), &config);
    let app = routes::router(state);

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "HTTP server listening.");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    search.close().await;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

fn init_tracing(args: &Args) {
    let filter = match args.verbose {
        0 => "supportflow=info,tower_http=info",
        1 => "supportflow=debug,tower_http=debug",
        _ => "supportflow=trace,tower_http=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false).init();
    }
}
