//! Gemini API key transport (Generative Language API, `generateContent`).

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;

use super::{
    GatewayError, GenerateRequest, GroundingMetadata, ModelReply, ModelTransport,
    classify_reqwest_error,
};
use crate::config::{Config, resolve_api_key, resolve_base_url};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const BASE_URL_ENV: &str = "GEMINI_BASE_URL";

/// Standard User-Agent header for mmchat API requests.
pub const USER_AGENT: &str = concat!("mmchat/", env!("CARGO_PKG_VERSION"));

/// Gemini API configuration, fixed for the lifetime of a client.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Option<Duration>,
}

impl GeminiConfig {
    /// Resolves the transport settings from config and environment.
    ///
    /// Authentication resolution order:
    /// 1. `api_key` in config.toml
    /// 2. `GEMINI_API_KEY` environment variable
    ///
    /// `GEMINI_BASE_URL` overrides `base_url` from config.
    ///
    /// # Errors
    /// Returns a configuration error if no API key is available or the base
    /// URL is malformed.
    pub fn from_config(config: &Config) -> Result<Self, GatewayError> {
        Self::from_config_with_env(config, API_KEY_ENV)
    }

    fn from_config_with_env(config: &Config, api_key_env: &str) -> Result<Self, GatewayError> {
        let api_key = resolve_api_key(config.api_key.as_deref(), api_key_env).ok_or_else(|| {
            GatewayError::configuration(format!(
                "No API key available. Set {api_key_env} or api_key in config.toml."
            ))
        })?;
        let base_url = resolve_base_url(config.effective_base_url(), BASE_URL_ENV, DEFAULT_BASE_URL)
            .map_err(|e| GatewayError::configuration(format!("{e:#}")))?;

        Ok(Self {
            api_key,
            base_url,
            model: config.model.clone(),
            timeout: config.request_timeout(),
        })
    }
}

/// Gemini client.
pub struct GeminiClient {
    config: GeminiConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// # Errors
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: GeminiConfig) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| GatewayError::configuration(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        )
    }
}

impl ModelTransport for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<ModelReply, GatewayError> {
        let body = serde_json::to_vec(request)
            .map_err(|e| GatewayError::encoding(format!("Failed to encode request: {e}")))?;
        let headers = build_headers(&self.config.api_key)?;

        tracing::debug!(model = %self.config.model, bytes = body.len(), "POST generateContent");
        let response = self
            .http
            .post(self.endpoint())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| classify_reqwest_error(&e))?;
        if !status.is_success() {
            return Err(GatewayError::http_status(status.as_u16(), &text));
        }

        parse_generate_response(&text)
    }
}

fn build_headers(api_key: &str) -> Result<HeaderMap, GatewayError> {
    let mut headers = HeaderMap::new();
    let key = HeaderValue::from_str(api_key)
        .map_err(|e| GatewayError::configuration(format!("API key is not a valid header value: {e}")))?;
    headers.insert("x-goog-api-key", key);
    headers.insert("accept", HeaderValue::from_static("application/json"));
    headers.insert("content-type", HeaderValue::from_static("application/json"));
    Ok(headers)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    /// Thought summaries are not part of the answer.
    #[serde(default)]
    thought: bool,
}

/// Parses a `generateContent` body: text of the first candidate plus its grounding.
fn parse_generate_response(body: &str) -> Result<ModelReply, GatewayError> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| GatewayError::parse(format!("Failed to parse Gemini response: {e}")))?;

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::parse("Gemini returned no candidates"))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter(|part| !part.thought)
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(GatewayError::parse("Gemini returned an empty response"));
    }

    Ok(ModelReply {
        text,
        grounding: candidate.grounding_metadata,
    })
}
