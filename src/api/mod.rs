//! Client for the remote document/LLM service.
//!
//! Every call authenticates with the `x-api-key` header. Transport failures
//! and non-success statuses are mapped to actionable `anyhow` errors.

mod documents;
pub(crate) mod http_errors;
mod messages;
mod projects;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use http_errors::{api_request_error, api_status_error};

pub use documents::{DocumentStatus, UploadedDocument, content_type_for};
pub use messages::{PostedMessage, Reply, ReplyDirection};
pub use projects::{Project, ProjectConfig, User};

pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    endpoint: String,
    token: String,
    timeout_secs: u64,
}

impl ApiClient {
    pub fn new(client: Client, cfg: &Config, token: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: cfg.endpoint.trim_end_matches('/').to_string(),
            token: token.into(),
            timeout_secs: cfg.http_timeout_secs,
        }
    }

    fn url(&self, segments: &[&str]) -> String {
        let mut url = self.endpoint.clone();
        for segment in segments {
            url.push('/');
            url.push_str(segment.trim_matches('/'));
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(API_KEY_HEADER, &self.token)
            .timeout(Duration::from_secs(self.timeout_secs))
    }

    async fn send(&self, request: RequestBuilder, api_url: &str) -> Result<Response> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|err| {
                warn!(api_url = %api_url, error = %err, "api request failed");
                api_request_error(err, api_url, self.timeout_secs)
            })?;

        if !response.status().is_success() {
            warn!(
                api_url = %api_url,
                status = %response.status(),
                "api returned non-success status"
            );
            return Err(api_status_error(api_url, response).await);
        }

        debug!(api_url = %api_url, status = %response.status(), "api request succeeded");
        Ok(response)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        api_url: &str,
    ) -> Result<T> {
        self.send(request, api_url)
            .await?
            .json()
            .await
            .with_context(|| format!("Failed to parse response from '{api_url}'"))
    }

    /// `GET /users/me`, returning the caller's account with its projects.
    pub async fn me(&self) -> Result<User> {
        let api_url = self.url(&["users", "me"]);
        self.send_json(self.client.get(&api_url), &api_url).await
    }

    /// Whether the token is accepted: exactly HTTP 200 on `/users/me`.
    /// Transport failures are errors, not a verdict.
    pub async fn check_token(&self) -> Result<bool> {
        let api_url = self.url(&["users", "me"]);
        let response = self
            .authorized(self.client.get(&api_url))
            .send()
            .await
            .map_err(|err| api_request_error(err, &api_url, self.timeout_secs))?;
        debug!(api_url = %api_url, status = %response.status(), "token check completed");
        Ok(response.status() == StatusCode::OK)
    }
}
