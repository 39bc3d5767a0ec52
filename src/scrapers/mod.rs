//! Article scraping for the Thairath crime section.
//!
//! Scraping follows a two-phase pattern:
//!
//! 1. **Listing**: request a page of article stubs from the `loadmore` API
//! 2. **Fetching**: download every listed article concurrently and extract
//!    its body text
//!
//! | Module | Role |
//! |--------|------|
//! | [`thairath`] | Listing client, concurrent page fetcher and pagination loop |
//! | [`content`] | HTML body extraction heuristic |
//!
//! Failed article fetches are logged and skipped; a failed listing request
//! aborts the scrape.

pub mod content;
pub mod thairath;
