use std::sync::Arc;

use reqwest::Url;
use tokio::sync::watch;
use uuid::Uuid;

use super::LoginError;

/// Single-writer result cell shared between the callback handler and the
/// waiting login flow. The first non-empty token offered wins.
#[derive(Debug, Clone)]
pub struct CredentialSlot {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl CredentialSlot {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Stores `token` unless a credential is already present.
    /// Returns whether this call was the one that stored it.
    pub fn offer(&self, token: String) -> bool {
        if token.is_empty() {
            return false;
        }
        self.tx.send_if_modified(move |slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(token);
            true
        })
    }

    pub fn is_set(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Resolves once a credential has been stored.
    pub async fn wait(&self) -> String {
        let mut rx = self.tx.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(token) => token.clone().unwrap_or_default(),
            // The sender lives as long as `self`.
            Err(_) => std::future::pending().await,
        }
    }
}

impl Default for CredentialSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// One login attempt: the anti-forgery state, where the browser must
/// redirect to, and the credential once the callback delivers it.
#[derive(Debug)]
pub struct LoginSession {
    port: u16,
    state: String,
    redirect_uri: String,
    credential: CredentialSlot,
}

impl LoginSession {
    pub fn new(port: u16) -> Self {
        Self::with_state(port, Uuid::new_v4().to_string())
    }

    pub fn with_state(port: u16, state: impl Into<String>) -> Self {
        Self {
            port,
            state: state.into(),
            redirect_uri: format!("http://localhost:{port}/callback"),
            credential: CredentialSlot::new(),
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    pub fn credential(&self) -> &CredentialSlot {
        &self.credential
    }

    pub fn state_matches(&self, candidate: Option<&str>) -> bool {
        candidate == Some(self.state.as_str())
    }

    /// `{auth_server}/login?response_type=code&redirect_uri=..&state=..&client_id=..`
    pub fn authorization_url(&self, auth_server: &str, client_id: &str) -> Result<Url, LoginError> {
        let base = format!("{}/login", auth_server.trim_end_matches('/'));
        Url::parse_with_params(
            &base,
            [
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("state", self.state.as_str()),
                ("client_id", client_id),
            ],
        )
        .map_err(|err| LoginError::InvalidAuthServer {
            url: base,
            reason: err.to_string(),
        })
    }
}
