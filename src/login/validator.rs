use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::Config;

pub type ValidationFuture<'a> = Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

/// Decides whether a freshly obtained token may be persisted.
pub trait TokenValidator: Sync {
    fn validate<'a>(&'a self, token: &'a str) -> ValidationFuture<'a>;
}

/// Checks the token against `GET /users/me`.
pub struct ApiTokenValidator<'a> {
    client: &'a Client,
    cfg: &'a Config,
}

impl<'a> ApiTokenValidator<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self { client, cfg }
    }
}

impl TokenValidator for ApiTokenValidator<'_> {
    fn validate<'b>(&'b self, token: &'b str) -> ValidationFuture<'b> {
        Box::pin(async move {
            let api = ApiClient::new(self.client.clone(), self.cfg, token);
            match api.check_token().await {
                Ok(valid) => {
                    debug!(valid, "token validation completed");
                    valid
                }
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "token validation request failed");
                    false
                }
            }
        })
    }
}
