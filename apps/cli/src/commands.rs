//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use supportflow_core::{PipelineRun, ProgressReporter, Stage, SupportPipeline, suggest_sources};
use supportflow_llm::OpenAiChat;
use supportflow_search::{Availability, SearchHandle, SourceSummary, summarize_sources};
use supportflow_shared::{
    AppConfig, Message, TicketId, TicketRecord, init_config, resolve_config, validate_api_key,
};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// SupportFlow: draft and validate customer-support replies.
#[derive(Parser)]
#[command(
    name = "supportflow",
    version,
    about = "Classify a support query, retrieve knowledge, and draft a reviewed reply.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Config file (defaults to ~/.supportflow/supportflow.toml).
    #[arg(long, global = true, env = "SUPPORTFLOW_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run one query through the pipeline and print the drafted reply.
    Ask {
        /// Customer query text.
        query: String,

        /// Restrict retrieval to a document (repeatable).
        #[arg(short, long = "source")]
        sources: Vec<String>,

        /// Ticket identifier (generated when omitted).
        #[arg(long)]
        ticket_id: Option<String>,

        /// Print the message and metadata envelope as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List the documents available in the knowledge base.
    Sources,

    /// Suggest knowledge-base documents for a query without drafting.
    Suggest {
        /// Query text.
        query: String,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "supportflow=info",
        1 => "supportflow=debug",
        _ => "supportflow=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Ask {
            query,
            sources,
            ticket_id,
            json,
        } => cmd_ask(config_path, &query, sources, ticket_id, json).await,
        Command::Sources => cmd_sources(config_path).await,
        Command::Suggest { query } => cmd_suggest(config_path, &query).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show(config_path).await,
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(
    config_path: Option<&Path>,
    query: &str,
    sources: Vec<String>,
    ticket_id: Option<String>,
    json: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        return Err(eyre!("query must not be empty"));
    }

    // Validate API key before doing anything
    let config = resolve_config(config_path)?;
    let api_key = validate_api_key(&config)?;

    let model = OpenAiChat::from_config(&config.llm, api_key)?;
    let search = SearchHandle::from_config(&config.search);
    let pipeline = SupportPipeline::from_config(&config, Arc::new(model), search.clone());

    let ticket_id = ticket_id.map(TicketId).unwrap_or_else(TicketId::generate);
    let record = TicketRecord::new(
        ticket_id,
        query,
        Some(sources),
        vec![Message::user(query)],
    );

    info!(ticket_id = %record.ticket_id, "drafting reply");

    let reporter = CliProgress::new();
    let run = pipeline.run(record, &reporter).await;
    search.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&run.formatted)?);
        return Ok(());
    }

    let record = &run.record;
    println!();
    println!("{}", run.formatted.message);
    println!();
    println!("  Ticket:    {}", record.ticket_id);
    println!(
        "  Routing:   {} | {} | {}",
        record.category, record.sentiment, record.urgency
    );
    for source in &record.rag_sources {
        println!(
            "  Source:    {} / {} ({:.3})",
            source.document, source.section, source.relevance
        );
    }
    for fallback in &run.fallbacks {
        println!("  Fallback:  {} ({})", fallback.stage, fallback.reason);
    }
    println!("  Time:      {:.1}s", run.elapsed.as_secs_f64());
    println!();

    Ok(())
}

/// List indexed documents, closing the handle on every path.
async fn list_sources(search: &SearchHandle, limit: usize) -> Result<Vec<SourceSummary>> {
    let Some(backend) = search.backend().await else {
        let reason = match search.connect().await {
            Availability::Unavailable { reason } => reason.clone(),
            Availability::Ready => "handle closed".to_string(),
        };
        search.close().await;
        return Err(eyre!("search backend unavailable: {reason}"));
    };

    let rows = backend.list_chunks(limit).await;
    search.close().await;
    Ok(summarize_sources(&rows?))
}

async fn cmd_sources(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let search = SearchHandle::from_config(&config.search);
    let summaries = list_sources(&search, config.server.sources_limit).await?;

    if summaries.is_empty() {
        println!("No documents indexed.");
        return Ok(());
    }

    println!();
    for summary in &summaries {
        println!(
            "  {}  [{}]  {} chunks",
            summary.document, summary.category, summary.total_chunks
        );
        if !summary.sections.is_empty() {
            println!("      sections: {}", summary.sections.join(", "));
        }
    }
    println!();

    Ok(())
}

async fn cmd_suggest(config_path: Option<&Path>, query: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let search = SearchHandle::from_config(&config.search);

    let suggested = suggest_sources(
        &search,
        query,
        config.server.suggest_limit,
        config.pipeline.preview_chars,
        config.pipeline.stage_timeout_secs,
    )
    .await;
    search.close().await;

    if suggested.is_empty() {
        println!("No suggestions.");
        return Ok(());
    }

    println!();
    for source in &suggested {
        println!(
            "  {:.3}  {} / {}  [{}]",
            source.relevance, source.document, source.section, source.category
        );
    }
    println!();

    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage(&self, stage: Stage) {
        let label = match stage {
            Stage::Normalize => "Reading query",
            Stage::Classify => "Classifying",
            Stage::Retrieve => "Retrieving knowledge",
            Stage::Draft => "Drafting reply",
            Stage::Validate => "Validating draft",
            Stage::Format => "Formatting",
        };
        self.spinner.set_message(label);
    }

    fn done(&self, _run: &PipelineRun) {
        self.spinner.finish_and_clear();
    }
}
