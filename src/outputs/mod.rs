//! Output persistence.
//!
//! Both pipelines exchange data as JSON-lines files:
//!
//! ```text
//! data/
//! ├── news.jsonl            # `scrape` output, `extract` input
//! └── news_processed.jsonl  # `extract` output
//! ```

pub mod jsonl;
