//! Thairath crime-news scraper.
//!
//! Articles are discovered through the `loadmore` listing API, which pages
//! backwards in time from a UNIX-timestamp cursor:
//!
//! ```text
//! GET {endpoint}/loadmore?path=news/crime&ts=1704067200&limit=100
//! {"items": [{"canonical": "...", "publishTime": "2024-01-01T00:00:00.000Z", ...}]}
//! ```
//!
//! Each listed article page is then fetched concurrently and its body text is
//! extracted with a [`ContentExtractor`].

use crate::error::{Error, Result};
use crate::models::{ArticleRecord, ListingItem, ListingPage};
use crate::progress::Progress;
use crate::scrapers::content::{ArticleContentExtractor, ContentExtractor};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use reqwest::{Client, StatusCode};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const ENDPOINT: &str = "https://api.thairath.co.th/tr-api/v1.1/thairath-online";
pub const CRIME_PATH: &str = "news/crime";
/// Listing size for every page after the first.
pub const PAGE_LIMIT: usize = 100;
pub const DEFAULT_WORKERS: usize = 5;
const CURSOR_OFFSET_SECS: i64 = 1;

/// Where listings and article pages come from.
#[allow(async_fn_in_trait)]
pub trait NewsSource {
    /// Request up to `limit` stubs published before the `ts` cursor.
    async fn load_more(&self, limit: usize, ts: i64) -> Result<Vec<ListingItem>>;

    /// Download one article page.
    async fn fetch_html(&self, url: &str) -> Result<String>;
}

/// HTTP client for the Thairath API.
#[derive(Debug, Clone)]
pub struct ThairathApi {
    client: Client,
    endpoint: String,
    path: String,
}

impl Default for ThairathApi {
    fn default() -> Self {
        Self::new(ENDPOINT, CRIME_PATH)
    }
}

impl ThairathApi {
    pub fn new(endpoint: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            path: path.into(),
        }
    }

    pub fn loadmore_url(&self, limit: usize, ts: i64) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/loadmore", self.endpoint.trim_end_matches('/')))?;
        url.query_pairs_mut()
            .append_pair("path", &self.path)
            .append_pair("ts", &ts.to_string())
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }
}

impl NewsSource for ThairathApi {
    #[instrument(level = "debug", skip(self))]
    async fn load_more(&self, limit: usize, ts: i64) -> Result<Vec<ListingItem>> {
        let url = self.loadmore_url(limit, ts)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Listing {
                status: status.as_u16(),
                body,
            });
        }

        let page: ListingPage = response.json().await?;
        debug!(count = page.items.len(), "Loaded listing");
        Ok(page.items)
    }

    async fn fetch_html(&self, url: &str) -> Result<String> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(body)
    }
}

/// Concurrent page fetcher plus the pagination loop on top of it.
#[derive(Debug)]
pub struct ThairathScraper<S, E = ArticleContentExtractor> {
    source: S,
    extractor: E,
    num_workers: usize,
    page_limit: usize,
    max_pages: Option<usize>,
}

impl<S: NewsSource> ThairathScraper<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            extractor: ArticleContentExtractor,
            num_workers: DEFAULT_WORKERS,
            page_limit: PAGE_LIMIT,
            max_pages: None,
        }
    }
}

impl<S: NewsSource, E: ContentExtractor> ThairathScraper<S, E> {
    pub fn with_extractor<E2: ContentExtractor>(self, extractor: E2) -> ThairathScraper<S, E2> {
        ThairathScraper {
            source: self.source,
            extractor,
            num_workers: self.num_workers,
            page_limit: self.page_limit,
            max_pages: self.max_pages,
        }
    }

    pub fn with_workers(mut self, num_workers: usize) -> Self {
        self.num_workers = num_workers.max(1);
        self
    }

    pub fn with_page_limit(mut self, page_limit: usize) -> Self {
        self.page_limit = page_limit.max(1);
        self
    }

    /// Stop paginating after `max_pages` pages even if `amt` is not reached.
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Download one article and extract its body text.
    pub async fn fetch_content(&self, url: &str) -> Result<Option<String>> {
        let html = self.source.fetch_html(url).await?;
        let content = self.extractor.extract(url, &html);
        if content.is_none() {
            warn!(%url, "News has no extractable content");
        }
        Ok(content)
    }

    /// Fetch one listing page and the content of every article on it.
    ///
    /// # Arguments
    ///
    /// * `ts` - Listing cursor in UNIX seconds; `None` means now
    /// * `limit` - Number of listing items requested
    /// * `page_no` - Page number shown in progress output, if any
    /// * `progress` - Observer notified once per article
    ///
    /// # Returns
    ///
    /// Records in completion order. Items whose fetch fails or that have no
    /// content are logged and dropped.
    ///
    /// # Errors
    ///
    /// Only a failed listing request ([`Error::Listing`] or a transport
    /// error) fails the page.
    #[instrument(level = "info", skip(self, progress))]
    pub async fn scrape_page(
        &self,
        ts: Option<i64>,
        limit: usize,
        page_no: Option<usize>,
        progress: &dyn Progress,
    ) -> Result<Vec<ArticleRecord>> {
        let ts = ts.unwrap_or_else(|| Utc::now().timestamp());
        let items = self.source.load_more(limit, ts).await?;

        let stage = match page_no {
            Some(n) => format!("scraping page {n}"),
            None => "scraping".to_string(),
        };
        progress.start(&stage, items.len());

        let records: Vec<ArticleRecord> = stream::iter(items.iter())
            .map(|item| async move { (item, self.fetch_content(&item.canonical).await) })
            .buffer_unordered(self.num_workers)
            .filter_map(|(item, outcome)| {
                let record = match outcome {
                    Ok(Some(content)) => Some(ArticleRecord::from_stub(item, content)),
                    Ok(None) => None,
                    Err(e) => {
                        warn!(url = %item.canonical, error = %e, "News generated an exception");
                        None
                    }
                };
                progress.item(&stage, &item.canonical, record.is_some());
                std::future::ready(record)
            })
            .collect()
            .await;

        progress.finish(&stage);
        info!(listed = items.len(), fetched = records.len(), "Scraped page");
        Ok(records)
    }

    /// Page backwards through the listing until at least `amt` articles are
    /// collected.
    ///
    /// Articles already collected (same URL) are skipped. The loop also stops
    /// when a page adds nothing new, since the cursor could not move again,
    /// or when the optional page ceiling is reached.
    ///
    /// # Errors
    ///
    /// The first failed listing request aborts the whole scrape.
    #[instrument(level = "info", skip(self, progress))]
    pub async fn scrape(&self, amt: usize, progress: &dyn Progress) -> Result<Vec<ArticleRecord>> {
        let mut seen = HashSet::new();
        let mut news = Vec::new();
        let mut page_no = 1;

        let first = self.scrape_page(None, amt, Some(page_no), progress).await?;
        accumulate(&mut news, &mut seen, first);

        while news.len() < amt {
            if self.max_pages.is_some_and(|max| page_no >= max) {
                warn!(page_no, count = news.len(), amt, "Reached page ceiling");
                break;
            }
            let Some(ts) = next_cursor(&news)? else {
                warn!("First page returned no articles");
                break;
            };

            page_no += 1;
            let page = self
                .scrape_page(Some(ts), self.page_limit, Some(page_no), progress)
                .await?;
            if accumulate(&mut news, &mut seen, page) == 0 {
                warn!(page_no, count = news.len(), amt, "Page added no new articles; stopping");
                break;
            }
            debug!(page_no, count = news.len(), "Accumulated articles");
        }

        info!(count = news.len(), pages = page_no, "Scrape complete");
        Ok(news)
    }
}

/// Append unseen records, returning how many were added.
fn accumulate(
    news: &mut Vec<ArticleRecord>,
    seen: &mut HashSet<String>,
    page: Vec<ArticleRecord>,
) -> usize {
    let before = news.len();
    news.extend(page.into_iter().filter(|r| seen.insert(r.url.clone())));
    news.len() - before
}

/// Cursor for the next older page: oldest `publish_time` minus one second.
pub fn next_cursor(records: &[ArticleRecord]) -> Result<Option<i64>> {
    let mut oldest: Option<i64> = None;
    for record in records {
        let ts = record.published_at()?.timestamp();
        oldest = Some(oldest.map_or(ts, |o| o.min(ts)));
    }
    Ok(oldest.map(|ts| ts - CURSOR_OFFSET_SECS))
}
