//! Command-line interface definitions.
//!
//! Two subcommands share the JSON-lines interchange format:
//! `scrape` writes `data/news.jsonl`, `extract` reads it and writes
//! `data/news_processed.jsonl`. LLM credentials can come from the
//! environment.

use crate::extract;
use crate::scrapers::thairath::{self, CRIME_PATH, ENDPOINT};
use clap::{Args, Parser, Subcommand};

/// Scrape Thairath crime news and extract incident metadata with an LLM.
///
/// # Examples
///
/// ```sh
/// # Scrape 500 articles
/// thairath_incidents scrape -a 500 -o data/news.jsonl
///
/// # Extract incident fields with an OpenAI-compatible API
/// OPENAI_API_KEY=sk-... thairath_incidents extract -i data/news.jsonl
///
/// # Use a local server and a YAML config
/// thairath_incidents extract --api-base http://localhost:11434/v1 -c llm.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Disable per-item progress lines
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape articles into a JSON-lines file
    Scrape(ScrapeArgs),
    /// Extract incident fields from scraped articles
    Extract(ExtractArgs),
}

#[derive(Args, Debug)]
pub struct ScrapeArgs {
    /// Output path to scraped news
    #[arg(short, long, default_value = "data/news.jsonl")]
    pub output_path: String,

    /// Number of scraped documents
    #[arg(short, long, default_value_t = 1_000)]
    pub amt: usize,

    /// Concurrent article downloads
    #[arg(short, long, default_value_t = thairath::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Stop after this many listing pages even if `amt` is not reached
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Listing API base URL
    #[arg(long, env = "THAIRATH_ENDPOINT", default_value = ENDPOINT)]
    pub endpoint: String,

    /// Listing section path
    #[arg(long, default_value = CRIME_PATH)]
    pub path: String,
}

#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Path to scraped data
    #[arg(short, long, default_value = "data/news.jsonl")]
    pub input_path: String,

    /// Path to processed output data
    #[arg(short, long, default_value = "data/news_processed.jsonl")]
    pub output_path: String,

    /// Concurrent LLM requests
    #[arg(short, long, default_value_t = extract::DEFAULT_WORKERS)]
    pub workers: usize,

    /// Optional path to an LLM config YAML file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Optional path to a prompt template YAML file
    #[arg(short, long)]
    pub template: Option<String>,

    /// API key for the chat-completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL")]
    pub api_base: Option<String>,

    /// Model name
    #[arg(short, long)]
    pub model: Option<String>,
}
