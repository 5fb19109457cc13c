pub mod auth;
pub mod documents;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Response;
use tracing::debug;

use crate::config::Settings;
use crate::error::{detail_message, ApiError};

pub use auth::{AuthBackend, AuthClient};
pub use documents::{DocumentBackend, DocumentClient};

/// Shared HTTP plumbing for the backend clients.
#[derive(Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Arc<str>,
}

impl HttpApi {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(&settings.api_url, settings.http_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn client(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

/// Pass a successful response through; turn anything else into an [`ApiError`]
/// carrying the backend `detail`, or `fallback` when there is none.
pub(crate) async fn check_response(
    response: Response,
    fallback: &str,
) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let detail = detail_message(&body).unwrap_or_else(|| fallback.to_string());
    debug!(%status, detail = %detail, "backend returned an error");
    Err(ApiError::from_status(status, detail))
}
