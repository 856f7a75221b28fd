mod cli;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nexus_knowledge::config::KnowledgeConfig;
use nexus_knowledge::knowledge::{ChunkType, Domain, SearchMode};

#[derive(Parser)]
#[command(name = "nexus-kb", version, about = "Local knowledge store and debug investigator")]
struct Cli {
    /// Config file (default: ~/.nexus/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a chunk
    Ingest {
        /// error_resolution, task_outcome, conversation, code_change or directive_summary
        chunk_type: ChunkType,
        content: String,
        #[arg(long)]
        source_id: Option<String>,
        #[arg(long)]
        domain: Option<Domain>,
        #[arg(long, default_value = "")]
        project: String,
        /// Metadata entry as key=value; repeatable
        #[arg(long = "meta")]
        meta: Vec<String>,
    },
    /// Ranked semantic search
    Search {
        query: String,
        #[arg(long, default_value = "all")]
        mode: SearchMode,
        #[arg(long)]
        domain: Option<Domain>,
        #[arg(long, default_value = "")]
        project: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        json: bool,
    },
    /// Investigate an error against past knowledge
    Debug {
        error: String,
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        domain: Option<Domain>,
        #[arg(long, default_value = "")]
        project: String,
        /// Also analyse similar directives for risk and cost
        #[arg(long)]
        directives: bool,
        #[arg(long)]
        json: bool,
    },
    /// Exit 0 if a proven fix exists for this error, 1 otherwise
    Check { error: String },
    /// Chunk counts by type
    Stats {
        #[arg(long)]
        project: Option<String>,
    },
    /// Delete chunks past their retention window
    Prune,
    /// Delete every chunk of a project
    DeleteProject { name: String },
    /// Export all chunks as JSON to stdout
    Export,
    /// Import chunks from an export file, re-embedding content
    Import { file: PathBuf },
    /// Database diagnostics
    Doctor,
    /// Manage embedding backends
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the ONNX model and tokenizer into the cache directory
    Download,
    /// Fit the TF-IDF vocabulary from stored chunks
    Fit,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KnowledgeConfig::load_from(path)?,
        None => KnowledgeConfig::load()?,
    };

    // stdout carries command output; logs go to stderr.
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Ingest {
            chunk_type,
            content,
            source_id,
            domain,
            project,
            meta,
        } => cli::ingest::ingest(&config, chunk_type, &content, source_id, domain, &project, &meta)?,
        Command::Search {
            query,
            mode,
            domain,
            project,
            top_k,
            threshold,
            json,
        } => {
            let options = cli::search::SearchOptions { mode, domain, project, top_k, threshold, json };
            cli::search::search(&config, &query, &options)?
        }
        Command::Debug {
            error,
            file,
            domain,
            project,
            directives,
            json,
        } => {
            let options = cli::debug::DebugOptions { file, domain, project, directives, json };
            cli::debug::debug(&config, &error, &options)?
        }
        Command::Check { error } => {
            if !cli::debug::check(&config, &error)? {
                std::process::exit(1);
            }
        }
        Command::Stats { project } => cli::stats::stats(&config, project.as_deref())?,
        Command::Prune => cli::maintenance::prune(&config)?,
        Command::DeleteProject { name } => cli::maintenance::delete_project(&config, &name)?,
        Command::Export => cli::export::export(&config)?,
        Command::Import { file } => cli::import::import(&config, &file)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => cli::model_download(&config.embedding).await?,
            ModelAction::Fit => cli::model_fit(&config)?,
        },
    }

    Ok(())
}
