//! LLM chat-completion calls with fixed-delay retry.
//!
//! # Architecture
//!
//! - [`ChatBackend`]: one raw chat-completion round trip
//! - [`OpenAiChat`]: `reqwest` implementation against an OpenAI-compatible
//!   `/chat/completions` endpoint
//! - [`LlmClient`]: builds the request from fixed settings, validates the
//!   answer for the requested [`ResponseFormat`] and retries failures
//!
//! # Retry Strategy
//!
//! - Every failure is classified with [`Error::kind`]; only retryable kinds
//!   are attempted again
//! - At most `1 + max_retries` attempts (3 retries by default)
//! - Fixed 3 second sleep between attempts, no backoff growth and no jitter
//!
//! [`LlmClient`] only holds immutable configuration, so one instance is
//! shared by reference across all concurrent extraction tasks.

use crate::config::LlmConfig;
use crate::error::{Error, Result};
use crate::prompts::PromptManager;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Shape of the completion the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    Text,
    Json,
}

impl FromStr for ResponseFormat {
    type Err = Error;

    /// Case-insensitive: `"json"`, `"JSON "`, `"Text"`...
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ResponseFormat::Text),
            "json" => Ok(ResponseFormat::Json),
            _ => Err(Error::UnsupportedFormat(s.to_string())),
        }
    }
}

/// A validated completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Text(String),
    Json(Map<String, Value>),
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Text(text) => f.write_str(text),
            Completion::Json(map) => write!(f, "{}", Value::Object(map.clone())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Request body for `/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub temperature: f32,
    pub seed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<Value>,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// One chat-completion round trip returning the first choice's text.
#[allow(async_fn_in_trait)]
pub trait ChatBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<String>;
}

/// [`ChatBackend`] for OpenAI-compatible HTTP APIs.
pub struct OpenAiChat {
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("client", &"<reqwest::Client>")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl OpenAiChat {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            client: Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

impl ChatBackend for OpenAiChat {
    #[instrument(level = "debug", skip_all, fields(model = %request.model))]
    async fn chat(&self, request: &ChatRequest) -> Result<String> {
        let t0 = Instant::now();
        let mut builder = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                elapsed_ms = t0.elapsed().as_millis() as u64,
                status = status.as_u16(),
                "API call failed"
            );
            return Err(Error::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;
        debug!(elapsed_ms = t0.elapsed().as_millis() as u64, "API call succeeded");
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(Error::EmptyCompletion)
    }
}

/// Fixed-delay retry settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Completion client with fixed model settings and system prompt.
#[derive(Debug)]
pub struct LlmClient<B> {
    backend: B,
    model: String,
    temperature: f32,
    seed: i64,
    system_prompt: String,
    retry: RetryPolicy,
}

impl<B: ChatBackend> LlmClient<B> {
    pub fn new(backend: B, config: &LlmConfig, prompts: &PromptManager) -> Result<Self> {
        Ok(Self {
            backend,
            model: config.model.clone(),
            temperature: config.temperature,
            seed: config.seed,
            system_prompt: prompts.system_prompt()?,
            retry: RetryPolicy {
                max_retries: config.max_retries,
                delay: Duration::from_secs(config.retry_delay_secs),
            },
        })
    }

    #[cfg(test)]
    pub(crate) fn backend(&self) -> &B {
        &self.backend
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn request(&self, prompt: &str, format: ResponseFormat) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            seed: self.seed,
            response_format: match format {
                ResponseFormat::Text => None,
                ResponseFormat::Json => Some(json!({ "type": "json_object" })),
            },
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: self.system_prompt.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        }
    }

    /// Run one completion, retrying retryable failures with a fixed delay.
    ///
    /// # Arguments
    ///
    /// * `prompt` - User message; the system prompt is fixed per client
    /// * `format` - [`ResponseFormat::Json`] asks for JSON mode and requires
    ///   the answer to be a JSON object
    ///
    /// # Returns
    ///
    /// The first answer that satisfies `format`. The identical request is
    /// sent on every attempt.
    ///
    /// # Errors
    ///
    /// The last error once `1 + max_retries` attempts have failed, or the
    /// first error whose [`ErrorKind`](crate::ErrorKind) is not retryable.
    #[instrument(level = "debug", skip(self, prompt))]
    pub async fn complete(&self, prompt: &str, format: ResponseFormat) -> Result<Completion> {
        let request = self.request(prompt, format);
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let outcome = match self.backend.chat(&request).await {
                Ok(text) => parse_completion(text, format),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(completion) => {
                    if attempt > 0 {
                        info!(attempt, "complete() succeeded after retry");
                    }
                    return Ok(completion);
                }
                Err(e) => {
                    attempt += 1;
                    let elapsed_ms_total = total_t0.elapsed().as_millis() as u64;

                    if !e.kind().is_retryable() {
                        error!(attempt, kind = ?e.kind(), error = %e, "complete() failed; not retryable");
                        return Err(e);
                    }
                    if attempt > self.retry.max_retries {
                        error!(
                            attempt,
                            max = self.retry.max_retries,
                            elapsed_ms_total,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        attempt,
                        max = self.retry.max_retries,
                        elapsed_ms_total,
                        delay = ?self.retry.delay,
                        error = %e,
                        "complete() attempt failed; retrying"
                    );
                    sleep(self.retry.delay).await;
                }
            }
        }
    }
}

fn parse_completion(text: String, format: ResponseFormat) -> Result<Completion> {
    match format {
        ResponseFormat::Text => Ok(Completion::Text(text)),
        ResponseFormat::Json => match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(Completion::Json(map)),
            _ => Err(Error::NotAnObject),
        },
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{ChatBackend, ChatRequest};
    use crate::error::Result;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Backend answering through a closure of `(call index, request)`.
    pub struct FakeBackend<F> {
        respond: F,
        pub calls: AtomicUsize,
        pub requests: Mutex<Vec<ChatRequest>>,
    }

    impl<F> FakeBackend<F>
    where
        F: Fn(usize, &ChatRequest) -> Result<String>,
    {
        pub fn new(respond: F) -> Self {
            Self {
                respond,
                calls: AtomicUsize::new(0),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl<F> ChatBackend for FakeBackend<F>
    where
        F: Fn(usize, &ChatRequest) -> Result<String>,
    {
        async fn chat(&self, request: &ChatRequest) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request.clone());
            (self.respond)(n, request)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeBackend;
    use super::*;

    fn client<F>(backend: FakeBackend<F>) -> LlmClient<FakeBackend<F>>
    where
        F: Fn(usize, &ChatRequest) -> Result<String>,
    {
        LlmClient::new(backend, &LlmConfig::default(), &PromptManager::builtin().unwrap())
            .unwrap()
            .with_retry(RetryPolicy {
                max_retries: 3,
                delay: Duration::ZERO,
            })
    }

    fn provider_error() -> Error {
        Error::Provider {
            status: 500,
            body: "overloaded".to_string(),
        }
    }

    #[test]
    fn test_response_format_parsing() {
        assert_eq!("json".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
        assert_eq!(" JSON ".parse::<ResponseFormat>().unwrap(), ResponseFormat::Json);
        assert_eq!("Text".parse::<ResponseFormat>().unwrap(), ResponseFormat::Text);
        assert!(matches!(
            "xml".parse::<ResponseFormat>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_request_shape() {
        let llm = client(FakeBackend::new(|_, _| Ok(String::new())));

        let json_request = serde_json::to_value(llm.request("hello", ResponseFormat::Json)).unwrap();
        assert_eq!(json_request["model"], "gpt-4o-mini");
        assert_eq!(json_request["seed"], 42);
        assert_eq!(json_request["response_format"]["type"], "json_object");
        assert_eq!(json_request["messages"][0]["role"], "system");
        assert_eq!(json_request["messages"][1]["role"], "user");
        assert_eq!(json_request["messages"][1]["content"], "hello");

        let text_request = serde_json::to_value(llm.request("hello", ResponseFormat::Text)).unwrap();
        assert!(text_request.get("response_format").is_none());
    }

    #[tokio::test]
    async fn test_complete_text() {
        let llm = client(FakeBackend::new(|_, _| Ok("plain answer".to_string())));
        let completion = llm.complete("q", ResponseFormat::Text).await.unwrap();
        assert_eq!(completion, Completion::Text("plain answer".to_string()));
    }

    #[tokio::test]
    async fn test_complete_succeeds_on_third_attempt() {
        let llm = client(FakeBackend::new(|n, _| {
            if n < 2 {
                Err(provider_error())
            } else {
                Ok(format!(r#"{{"attempt": {}}}"#, n + 1))
            }
        }));

        let Completion::Json(map) = llm.complete("q", ResponseFormat::Json).await.unwrap() else {
            panic!("expected a JSON completion");
        };
        assert_eq!(map["attempt"], 3);
        assert_eq!(llm.backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_complete_exhausts_retries() {
        let llm = client(FakeBackend::new(|_, _| Err(provider_error())));
        let result = llm.complete("q", ResponseFormat::Text).await;
        assert!(matches!(result, Err(Error::Provider { status: 500, .. })));
        assert_eq!(llm.backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_malformed_json_is_retried() {
        let llm = client(FakeBackend::new(|n, _| match n {
            0 => Ok("not json at all".to_string()),
            1 => Ok("[1, 2, 3]".to_string()),
            _ => Ok(r#"{"ok": true}"#.to_string()),
        }));

        let Completion::Json(map) = llm.complete("q", ResponseFormat::Json).await.unwrap() else {
            panic!("expected a JSON completion");
        };
        assert_eq!(map["ok"], true);
        assert_eq!(llm.backend.calls(), 3);
    }

    #[tokio::test]
    async fn test_fatal_errors_are_not_retried() {
        let llm = client(FakeBackend::new(|_, _| {
            Err(Error::Template("broken".to_string()))
        }));
        assert!(llm.complete("q", ResponseFormat::Text).await.is_err());
        assert_eq!(llm.backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_same_request_every_attempt() {
        let llm = client(FakeBackend::new(|n, _| {
            if n == 0 {
                Err(Error::EmptyCompletion)
            } else {
                Ok("{}".to_string())
            }
        }));
        llm.complete("prompt text", ResponseFormat::Json).await.unwrap();

        let requests = llm.backend.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert!(requests[0].messages[0].content.contains("crime_type"));
    }
}
