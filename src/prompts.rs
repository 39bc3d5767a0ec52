//! Prompt templates for the extraction pipeline.
//!
//! Templates are stored as YAML with two entries, `system_prompt` and
//! `extract_info`. The default set is compiled into the binary from
//! `templates/news_extraction.yaml`; `--template` points at a replacement.
//! Placeholders use the `{{ name }}` form.
//!
//! An optional `response_format` entry (`json` or `text`, default `json`)
//! selects how the completion is requested. `text` is for OpenAI-compatible
//! servers that reject JSON mode; the answer must still be a JSON object.

use crate::api::ResponseFormat;
use crate::error::{Error, Result};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use tracing::{info, instrument};

const BUILTIN_TEMPLATES: &str = include_str!("../templates/news_extraction.yaml");

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap());

#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplates {
    pub system_prompt: String,
    pub extract_info: String,
    #[serde(default = "default_response_format")]
    pub response_format: String,
}

fn default_response_format() -> String {
    "json".to_string()
}

/// Renders the system and extraction prompts.
#[derive(Debug, Clone)]
pub struct PromptManager {
    templates: PromptTemplates,
    response_format: ResponseFormat,
}

impl PromptManager {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_TEMPLATES)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let templates: PromptTemplates = serde_yaml::from_str(yaml)?;
        let response_format = templates.response_format.parse::<ResponseFormat>()?;
        Ok(Self {
            templates,
            response_format,
        })
    }

    /// Load templates from `path`, or the built-in set when `None`.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => {
                let yaml = tokio::fs::read_to_string(path).await?;
                let manager = Self::from_yaml(&yaml)?;
                info!(%path, "Loaded prompt templates");
                Ok(manager)
            }
            None => Self::builtin(),
        }
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    pub fn system_prompt(&self) -> Result<String> {
        render(&self.templates.system_prompt, &[])
    }

    pub fn extract_info(&self, title: &str, r#abstract: &str, content: &str) -> Result<String> {
        render(
            &self.templates.extract_info,
            &[("title", title), ("abstract", r#abstract), ("content", content)],
        )
    }
}

/// Substitute `{{ name }}` placeholders. Unknown names are an error.
pub fn render(template: &str, vars: &[(&str, &str)]) -> Result<String> {
    let mut missing: Option<String> = None;
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let name = &caps[1];
        match vars.iter().find(|(key, _)| *key == name) {
            Some((_, value)) => value.to_string(),
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    if let Some(name) = missing {
        return Err(Error::Template(format!("unknown placeholder {{{{ {name} }}}}")));
    }
    Ok(rendered.into_owned())
}
