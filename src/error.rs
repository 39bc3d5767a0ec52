//! Crate-wide error type and retry classification.
//!
//! Every fallible operation returns [`Error`]. Retry loops never match on
//! variants directly; they ask [`Error::kind`] and then
//! [`ErrorKind::is_retryable`], so the classification lives in one place.

use thiserror::Error;

/// Coarse error category used to decide whether an operation may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network failure or unexpected HTTP status.
    Transport,
    /// Malformed payload (JSON, timestamps, completion shape).
    Parse,
    /// The LLM provider answered with an error or an empty completion.
    Provider,
    /// The LLM answered, but the extracted fields do not validate.
    Validation,
    /// Bad configuration, template or caller input.
    Config,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Whether a fresh attempt of the same operation could succeed.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Config | ErrorKind::Io)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("connection error: listing returned {status}: {body}")]
    Listing { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid record on line {line}: {source}")]
    Record {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid timestamp {value:?}: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("LLM provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("LLM returned no completion content")]
    EmptyCompletion,

    #[error("LLM returned JSON that is not an object")]
    NotAnObject,

    #[error("Response format not supported: {0:?}, we only support json|text")]
    UnsupportedFormat(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Listing { .. } | Error::Http(_) => ErrorKind::Transport,
            Error::Json(_) | Error::Record { .. } | Error::Timestamp { .. } | Error::NotAnObject => {
                ErrorKind::Parse
            }
            Error::Provider { .. } | Error::EmptyCompletion => ErrorKind::Provider,
            Error::Validation(_) => ErrorKind::Validation,
            Error::Url(_) | Error::UnsupportedFormat(_) | Error::Template(_) | Error::Config(_) => {
                ErrorKind::Config
            }
            Error::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_failures_are_retryable() {
        assert!(Error::EmptyCompletion.kind().is_retryable());
        assert!(Error::NotAnObject.kind().is_retryable());
        let provider = Error::Provider {
            status: 500,
            body: "boom".to_string(),
        };
        assert!(provider.kind().is_retryable());
    }

    #[test]
    fn test_config_errors_are_fatal() {
        assert_eq!(
            Error::UnsupportedFormat("xml".to_string()).kind(),
            ErrorKind::Config
        );
        assert!(!Error::Template("x".to_string()).kind().is_retryable());
    }

    #[test]
    fn test_validation_kind() {
        let e = Error::Validation("missing incident_datetime".to_string());
        assert_eq!(e.kind(), ErrorKind::Validation);
        assert!(e.to_string().contains("incident_datetime"));
    }

    #[test]
    fn test_listing_error_message() {
        let e = Error::Listing {
            status: 503,
            body: "unavailable".to_string(),
        };
        assert_eq!(e.kind(), ErrorKind::Transport);
        assert!(e.to_string().starts_with("connection error"));
    }
}
