//! Incident extraction: one LLM call per article, post-processed and merged
//! back into the record.
//!
//! Two retry layers are stacked on purpose:
//!
//! - [`LlmClient::complete`] retries transport, provider and JSON errors
//! - [`NewsExtractor::extract`] re-runs the whole extraction only when the
//!   model's answer parses but fails validation; every other error
//!   propagates immediately

use crate::api::{ChatBackend, Completion, LlmClient};
use crate::error::{Error, ErrorKind, Result};
use crate::models::{ArticleRecord, ExtractedRecord};
use crate::progress::Progress;
use crate::prompts::PromptManager;
use crate::utils::truncate_for_log;
use futures::stream::{self, StreamExt};
use itertools::{Either, Itertools};
use serde_json::{Map, Value};
use tracing::{error, info, instrument, warn};

pub const DEFAULT_WORKERS: usize = 5;
const STAGE: &str = "Extracting News Info";

/// Years above this are Buddhist Era.
const BUDDHIST_ERA_THRESHOLD: i64 = 2500;
const BUDDHIST_ERA_OFFSET: i64 = 543;

/// Normalize a `day/month/year` date to a Gregorian year.
///
/// Years above 2500 are Buddhist Era and lose 543. A year still above 2500
/// after that is not a plausible date and fails validation.
///
/// # Errors
///
/// [`Error::Validation`] when `raw` is not three `/`-separated parts, the
/// year is not an integer, or the converted year is still above 2500.
pub fn normalize_incident_date(raw: &str) -> Result<String> {
    let parts: Vec<&str> = raw.split('/').collect();
    let [day, month, year] = parts.as_slice() else {
        return Err(Error::Validation(format!(
            "incident_datetime {raw:?} is not day/month/year"
        )));
    };
    let mut year: i64 = year.trim().parse().map_err(|_| {
        Error::Validation(format!("incident_datetime {raw:?} has a non-numeric year"))
    })?;
    if year > BUDDHIST_ERA_THRESHOLD {
        year -= BUDDHIST_ERA_OFFSET;
    }
    if year > BUDDHIST_ERA_THRESHOLD {
        return Err(Error::Validation(format!(
            "incident_datetime {raw:?} has an out-of-range year"
        )));
    }
    Ok(format!("{day}/{month}/{year}"))
}

/// Validate the model's answer and convert `incident_datetime` in place.
pub fn postprocess_response(response: &mut Map<String, Value>) -> Result<()> {
    let raw = match response.get("incident_datetime") {
        Some(Value::String(raw)) => raw,
        Some(other) => {
            return Err(Error::Validation(format!(
                "incident_datetime is not a string: {other}"
            )));
        }
        None => return Err(Error::Validation("missing incident_datetime".to_string())),
    };
    let normalized = normalize_incident_date(raw)?;
    response.insert("incident_datetime".to_string(), Value::String(normalized));
    Ok(())
}

/// Turn a completion into a post-processed answer object.
///
/// A text completion must still hold a JSON object; anything else is a
/// validation failure so the extraction round is repeated.
fn validated(completion: &Completion) -> Result<Map<String, Value>> {
    let mut response = match completion {
        Completion::Json(map) => map.clone(),
        Completion::Text(text) => match serde_json::from_str::<Value>(text.trim()) {
            Ok(Value::Object(map)) => map,
            _ => return Err(Error::Validation("answer is not a JSON object".to_string())),
        },
    };
    postprocess_response(&mut response)?;
    Ok(response)
}

/// Extracts incident fields from articles through an [`LlmClient`].
#[derive(Debug)]
pub struct NewsExtractor<B> {
    llm: LlmClient<B>,
    prompts: PromptManager,
    max_retries: usize,
}

impl<B: ChatBackend> NewsExtractor<B> {
    pub fn new(llm: LlmClient<B>, prompts: PromptManager, max_retries: usize) -> Self {
        Self {
            llm,
            prompts,
            max_retries,
        }
    }

    /// Extract and merge incident fields for one article.
    ///
    /// The completion is requested in the template's
    /// [`response_format`](PromptManager::response_format).
    ///
    /// # Arguments
    ///
    /// * `record` - The scraped article to send to the model
    ///
    /// # Returns
    ///
    /// The article's fields merged with the model's answer, the answer
    /// winning on key collisions.
    ///
    /// # Errors
    ///
    /// - [`Error::Validation`] once the answer failed validation on
    ///   `1 + max_retries` extraction rounds
    /// - Any non-validation error from [`LlmClient::complete`], unchanged
    #[instrument(level = "debug", skip_all, fields(title = %record.label()))]
    pub async fn extract(&self, record: &ArticleRecord) -> Result<ExtractedRecord> {
        let prompt = self
            .prompts
            .extract_info(&record.title, &record.r#abstract, &record.content)?;
        let format = self.prompts.response_format();
        let mut retries = 0usize;

        loop {
            let completion = self.llm.complete(&prompt, format).await?;
            match validated(&completion) {
                Ok(response) => return ExtractedRecord::merge(record, response),
                Err(e) if e.kind() == ErrorKind::Validation => {
                    retries += 1;
                    let raw = completion.to_string();
                    warn!(
                        retries,
                        max = self.max_retries,
                        error = %e,
                        response = %truncate_for_log(&raw, 300),
                        "Can't validate output"
                    );
                    if retries > self.max_retries {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run [`extract`](Self::extract) over `records` with at most
    /// `num_workers` in flight.
    ///
    /// # Arguments
    ///
    /// * `records` - Scraped articles
    /// * `num_workers` - Concurrent extractions; `0` is treated as `1`
    /// * `progress` - Observer notified once per finished item
    ///
    /// # Returns
    ///
    /// The successfully extracted records in completion order. Failed items
    /// are logged with their title and left out.
    #[instrument(level = "info", skip_all, fields(total = records.len(), num_workers = num_workers))]
    pub async fn batch_extract(
        &self,
        records: &[ArticleRecord],
        num_workers: usize,
        progress: &dyn Progress,
    ) -> Vec<ExtractedRecord> {
        progress.start(STAGE, records.len());

        let outcomes: Vec<(&ArticleRecord, Result<ExtractedRecord>)> = stream::iter(records)
            .map(|record| async move { (record, self.extract(record).await) })
            .buffer_unordered(num_workers.max(1))
            .inspect(|(record, outcome)| {
                if let Err(e) = outcome {
                    error!(title = %record.label(), error = %e, "Error processing news item");
                }
                progress.item(STAGE, record.label(), outcome.is_ok());
            })
            .collect()
            .await;

        let (extracted, failed): (Vec<ExtractedRecord>, Vec<&str>) = outcomes
            .into_iter()
            .partition_map(|(record, outcome)| match outcome {
                Ok(extracted) => Either::Left(extracted),
                Err(_) => Either::Right(record.label()),
            });

        progress.finish(STAGE);
        info!(
            total = records.len(),
            successful = extracted.len(),
            failed = failed.len(),
            "Completed batch extraction"
        );
        extracted
    }
}
