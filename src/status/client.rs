//! Short-timeout JSON client for the local data service.
//!
//! Every failure (transport error, timeout, non-2xx, malformed body) is
//! folded into `None`. There are no retries; the next scheduled poll is
//! the retry.

use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};
use tracing::debug;

use crate::{AppError, Result};

const USER_AGENT: &str = concat!("aw-supervisor/", env!("CARGO_PKG_VERSION"));

/// HTTP client bound to one data-service base URL.
#[derive(Debug, Clone)]
pub struct StatusClient {
    http: Client,
    base_url: String,
}

impl StatusClient {
    /// Build a client whose requests are bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|err| AppError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
        })
    }

    /// Base URL requests are issued against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET {base_url}{path}` parsed as any JSON value.
    pub async fn fetch(&self, path: &str) -> Option<Value> {
        let url = format!("{}{path}", self.base_url);
        match self.try_fetch(&url).await {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(%url, %err, "status fetch yielded no data");
                None
            }
        }
    }

    /// `GET {base_url}{path}` parsed as a JSON object; other shapes yield `None`.
    pub async fn fetch_object(&self, path: &str) -> Option<Map<String, Value>> {
        match self.fetch(path).await? {
            Value::Object(map) => Some(map),
            other => {
                debug!(path, kind = json_kind(&other), "expected a json object");
                None
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| AppError::Network(format!("request failed: {err}")))?
            .error_for_status()
            .map_err(|err| AppError::Network(format!("unexpected status: {err}")))?;

        let body = response
            .bytes()
            .await
            .map_err(|err| AppError::Network(format!("failed to read body: {err}")))?;

        serde_json::from_slice(&body)
            .map_err(|err| AppError::MalformedResponse(format!("invalid json: {err}")))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
