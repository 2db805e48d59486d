use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;

#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    #[error("token endpoint '{url}' unreachable: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("token endpoint '{url}' returned status {status}")]
    Status { url: String, status: StatusCode },
    #[error("token endpoint '{url}' returned an unusable body: {reason}")]
    MalformedBody { url: String, reason: String },
}

pub type ExchangeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, ExchangeError>> + Send + 'a>>;

/// Converts an authorization code into an access token.
pub trait CodeExchanger: Send + Sync {
    fn exchange<'a>(&'a self, code: &'a str, redirect_uri: &'a str) -> ExchangeFuture<'a>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// `POST {auth_server}/login/token` with an `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct HttpCodeExchanger {
    client: Client,
    token_url: String,
    client_id: String,
    timeout: Duration,
}

impl HttpCodeExchanger {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            token_url: format!("{}/login/token", cfg.auth_server.trim_end_matches('/')),
            client_id: cfg.client_id.clone(),
            timeout: Duration::from_secs(cfg.http_timeout_secs),
        }
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    async fn request_token(&self, code: &str, redirect_uri: &str) -> Result<String, ExchangeError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("client_id", self.client_id.as_str()),
        ];
        debug!(token_url = %self.token_url, "exchanging authorization code");

        let response = self
            .client
            .post(&self.token_url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| ExchangeError::Transport {
                url: self.token_url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(ExchangeError::Status {
                url: self.token_url.clone(),
                status: response.status(),
            });
        }

        let parsed: TokenResponse =
            response
                .json()
                .await
                .map_err(|err| ExchangeError::MalformedBody {
                    url: self.token_url.clone(),
                    reason: err.to_string(),
                })?;

        parsed
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ExchangeError::MalformedBody {
                url: self.token_url.clone(),
                reason: "missing access_token".to_string(),
            })
    }
}

impl CodeExchanger for HttpCodeExchanger {
    fn exchange<'a>(&'a self, code: &'a str, redirect_uri: &'a str) -> ExchangeFuture<'a> {
        Box::pin(self.request_token(code, redirect_uri))
    }
}

/// Best-effort exchange: on any failure the raw code is returned, since the
/// API may accept it as a bearer credential.
pub async fn exchange_or_fallback(
    exchanger: &dyn CodeExchanger,
    code: &str,
    redirect_uri: &str,
) -> String {
    match exchanger.exchange(code, redirect_uri).await {
        Ok(token) => {
            debug!("authorization code exchanged for access token");
            token
        }
        Err(err) => {
            warn!(
                error = %err,
                "authorization code exchange failed; using the code as the token"
            );
            code.to_string()
        }
    }
}
