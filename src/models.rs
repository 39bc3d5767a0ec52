//! Data models shared by the scrape and extract pipelines.
//!
//! - [`ListingItem`]: one stub from the Thairath `loadmore` listing endpoint
//! - [`ArticleRecord`]: a scraped article with its full body text
//! - [`ExtractedRecord`]: an article merged with the LLM's incident fields
//!
//! Both record types are persisted as JSON-lines and round-trip through
//! `serde_json` without escaping non-ASCII text.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a listing response: `{"items": [...]}`.
#[derive(Debug, Deserialize)]
pub struct ListingPage {
    #[serde(default)]
    pub items: Vec<ListingItem>,
}

/// An article stub as returned by the listing endpoint.
///
/// Only the fields the scraper copies into [`ArticleRecord`] are kept. The
/// listing uses camelCase for `publishTime`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ListingItem {
    /// Canonical article URL, fetched for the body text.
    pub canonical: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub r#abstract: String,
    /// ISO-8601 UTC timestamp, e.g. `2024-01-03T00:00:00.000Z`.
    #[serde(rename = "publishTime")]
    pub publish_time: String,
}

/// A scraped article with metadata and body text.
///
/// `content` is never empty: articles without extractable content are dropped
/// before a record is built.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ArticleRecord {
    pub url: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub r#abstract: String,
    pub content: String,
    pub publish_time: String,
}

impl ArticleRecord {
    /// Build a record from a listing stub and the fetched body text.
    pub fn from_stub(item: &ListingItem, content: String) -> Self {
        Self {
            url: item.canonical.clone(),
            section: item.section.clone(),
            topic: item.topic.clone(),
            title: item.title.clone(),
            r#abstract: item.r#abstract.clone(),
            content,
            publish_time: item.publish_time.clone(),
        }
    }

    /// Human-readable identifier for log lines: the title, or `"Unknown"`.
    pub fn label(&self) -> &str {
        if self.title.trim().is_empty() {
            "Unknown"
        } else {
            &self.title
        }
    }

    /// Parse `publish_time` as an RFC-3339 timestamp.
    pub fn published_at(&self) -> Result<DateTime<FixedOffset>> {
        DateTime::parse_from_rfc3339(&self.publish_time).map_err(|source| Error::Timestamp {
            value: self.publish_time.clone(),
            source,
        })
    }
}

/// An [`ArticleRecord`] enriched with LLM-derived incident fields.
///
/// Expected extra keys are `crime_type` (list of strings), `num_victims`
/// (integer), `incident_datetime` (`day/month/year`, Gregorian) and
/// `incident_address` (`name`/`province`/`district`/`subdistrict`). The record
/// is kept as a flat JSON object so any additional keys the model emits are
/// preserved as-is.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ExtractedRecord(Map<String, Value>);

impl ExtractedRecord {
    /// Shallow-merge `response` into a copy of `record`; response keys win.
    pub fn merge(record: &ArticleRecord, response: Map<String, Value>) -> Result<Self> {
        let mut fields = match serde_json::to_value(record)? {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.extend(response);
        Ok(Self(fields))
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn title(&self) -> Option<&str> {
        self.get("title").and_then(Value::as_str)
    }

    pub fn incident_datetime(&self) -> Option<&str> {
        self.get("incident_datetime").and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}
