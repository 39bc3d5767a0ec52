//! `thairath_incidents` command-line entry point.
//!
//! ```sh
//! thairath_incidents scrape -a 1000 -o data/news.jsonl
//! thairath_incidents extract -i data/news.jsonl -o data/news_processed.jsonl
//! ```
//!
//! Logging goes through `tracing`; set `RUST_LOG` to adjust verbosity.

use clap::Parser;
use std::error::Error;
use tracing::{debug, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use thairath_incidents::api::{LlmClient, OpenAiChat};
use thairath_incidents::cli::{Cli, Command, ExtractArgs, ScrapeArgs};
use thairath_incidents::config::LlmConfig;
use thairath_incidents::extract::NewsExtractor;
use thairath_incidents::models::ArticleRecord;
use thairath_incidents::outputs::jsonl::{read_jsonl, write_jsonl};
use thairath_incidents::progress::{LogProgress, Progress, Silent};
use thairath_incidents::prompts::PromptManager;
use thairath_incidents::scrapers::thairath::{ThairathApi, ThairathScraper};
use thairath_incidents::utils::{ensure_writable_dir, parent_dir};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let progress: Box<dyn Progress> = if args.quiet {
        Box::new(Silent)
    } else {
        Box::new(LogProgress::default())
    };

    match args.command {
        Command::Scrape(scrape) => run_scrape(scrape, progress.as_ref()).await?,
        Command::Extract(extract) => run_extract(extract, progress.as_ref()).await?,
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

#[instrument(level = "info", skip_all, fields(output = %args.output_path, amt = args.amt))]
async fn run_scrape(args: ScrapeArgs, progress: &dyn Progress) -> Result<(), Box<dyn Error>> {
    // Fail before scraping if the output can't be written.
    ensure_writable_dir(parent_dir(&args.output_path)).await?;

    let scraper = ThairathScraper::new(ThairathApi::new(&args.endpoint, &args.path))
        .with_workers(args.workers)
        .with_max_pages(args.max_pages);

    let news = scraper.scrape(args.amt, progress).await?;
    info!(count = news.len(), "Scraped news");

    write_jsonl(&news, &args.output_path).await?;
    Ok(())
}

#[instrument(level = "info", skip_all, fields(input = %args.input_path, output = %args.output_path))]
async fn run_extract(args: ExtractArgs, progress: &dyn Progress) -> Result<(), Box<dyn Error>> {
    ensure_writable_dir(parent_dir(&args.output_path)).await?;

    let config = LlmConfig::load(args.config.as_deref())
        .await?
        .with_overrides(args.api_base, args.api_key, args.model);
    if config.api_key.is_none() {
        warn!(api_base = %config.api_base, "No API key configured; sending unauthenticated requests");
    }
    info!(model = %config.model, api_base = %config.api_base, "Using LLM");

    let prompts = PromptManager::load(args.template.as_deref()).await?;
    let news: Vec<ArticleRecord> = read_jsonl(&args.input_path).await?;

    let llm = LlmClient::new(OpenAiChat::new(&config), &config, &prompts)?;
    let extractor = NewsExtractor::new(llm, prompts, config.validation_retries);

    let output = extractor.batch_extract(&news, args.workers, progress).await;
    write_jsonl(&output, &args.output_path).await?;
    Ok(())
}
