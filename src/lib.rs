//! # Thairath Incidents
//!
//! Scrapes crime-news articles from Thairath and extracts structured incident
//! metadata (crime type, victim count, incident date, address) from each
//! article with an OpenAI-compatible LLM.
//!
//! ## Architecture
//!
//! Two independent pipelines share a JSON-lines format:
//! 1. **Scrape**: page backwards through the listing API
//!    ([`scrapers::thairath`]), fetch article bodies concurrently and write
//!    [`models::ArticleRecord`]s
//! 2. **Extract**: read records back, run one LLM extraction per article
//!    ([`extract`], 5 at a time by default) and write
//!    [`models::ExtractedRecord`]s
//!
//! Concurrency is bounded per stage with `futures::stream::buffer_unordered`;
//! one failing article never aborts its batch.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod outputs;
pub mod progress;
pub mod prompts;
pub mod scrapers;
pub mod utils;

pub use error::{Error, ErrorKind, Result};
