use anyhow::{Context, Result};
use clap::builder::RangedU64ValueParser;
use clap::{Parser, Subcommand};
use colored::Colorize;
use finrag_core::config::{Config, StorageMode};
use finrag_core::{Answer, Credentials, RagPipeline};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "finrag")]
#[command(about = "Ask questions about P&L statements", long_about = None)]
#[command(version)]
struct Cli {
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Extract, chunk, embed and store a PDF statement")]
    Ingest {
        #[arg(help = "Path to the PDF file")]
        path: PathBuf,
    },

    #[command(about = "Answer a question from the stored statements")]
    Ask {
        #[arg(help = "Question, e.g. 'What is the total revenue?'")]
        query: String,

        #[arg(
            short = 'k',
            long,
            value_parser = RangedU64ValueParser::<usize>::new().range(1..),
            help = "Number of contexts to retrieve"
        )]
        top_k: Option<usize>,

        #[arg(long, help = "Print the answer as JSON")]
        json: bool,
    },

    #[command(about = "Show the effective configuration")]
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { path } => ingest(&config, &path).await,
        Commands::Ask { query, top_k, json } => ask(&config, &query, top_k, json).await,
        Commands::Show => {
            show_config(&config);
            Ok(())
        }
    }
}

/// Loads the config file, or defaults when the file doesn't exist.
fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }
    Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))
}

async fn connect(config: &Config) -> Result<RagPipeline> {
    let credentials = Credentials::from_env()
        .context("Set PINECONE_API_KEY and GROQ_API_KEY in the environment or a .env file")?;

    RagPipeline::connect(config, &credentials)
        .await
        .context("Failed to initialize pipeline")
}

async fn ingest(config: &Config, path: &Path) -> Result<()> {
    let pipeline = connect(config).await?;

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    println!("{} Processing {}...", "→".blue(), path.display());
    let chunks = pipeline.process_document(bytes).await?;

    if chunks == 0 {
        println!("{}", "No text could be extracted; nothing was stored.".yellow());
    } else {
        println!("{} Stored {} chunks", "✓".green().bold(), chunks.to_string().cyan());
    }

    Ok(())
}

async fn ask(config: &Config, query: &str, top_k: Option<usize>, json: bool) -> Result<()> {
    let pipeline = connect(config).await?;

    let answer = match top_k {
        Some(k) => pipeline.answer_query_with_top_k(query, k).await?,
        None => pipeline.answer_query(query).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("{}", "Answer:".bold().green());
    println!("{}", answer.response);
    println!();
    println!("{}", "Retrieved contexts:".bold());

    if answer.contexts.is_empty() {
        println!("  {}", "(none)".yellow());
    }

    for (i, ctx) in answer.contexts.iter().enumerate() {
        println!(
            "  {} {} {}",
            format!("[{}]", i + 1).cyan(),
            format!("({:.3})", ctx.score).dimmed(),
            ctx.text.replace('\n', " ")
        );
    }
}

fn show_config(config: &Config) {
    println!("{}", "Current Configuration:".bold().green());
    println!();
    println!("{}", "LLM:".bold());
    println!("  Model:          {}", config.llm.model.cyan());
    println!("  Base URL:       {}", config.llm.base_url);
    println!("  Temperature:    {}", config.llm.temperature);
    println!("  Max Tokens:     {}", config.llm.max_tokens);
    println!();
    println!("{}", "Embedding:".bold());
    println!("  Model:          {}", config.embedding.model.cyan());
    println!("  Base URL:       {}", config.embedding.base_url);
    println!("  Dimension:      {}", config.embedding.dimension);
    println!();
    println!("{}", "RAG:".bold());
    println!("  Chunk Size:     {}", config.rag.chunk_size);
    println!("  Chunk Overlap:  {}", config.rag.chunk_overlap);
    println!("  Top K:          {}", config.rag.top_k);
    println!("  Batch Size:     {}", config.rag.upsert_batch_size);
    println!();
    println!("{}", "Storage:".bold());
    println!("  Index:          {}", config.storage.vector_db.index_name.cyan());

    match &config.storage.storage_mode {
        StorageMode::Pinecone { control_url, cloud, region, .. } => {
            println!("  Backend:        Pinecone ({cloud}/{region})");
            println!("  Control URL:    {control_url}");
        }
        StorageMode::Qdrant { url } => {
            println!("  Backend:        Qdrant");
            println!("  URL:            {url}");
        }
        StorageMode::Memory => println!("  Backend:        in-memory"),
    }
}
