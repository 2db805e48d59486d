//! Browser-based login.
//!
//! One attempt binds a local callback port, opens the remote login page,
//! waits for the redirect to deliver a credential, validates it, and
//! persists it in the profile store. The listener is stopped on every
//! exit path before the outcome is reported.

pub mod exchange;
pub mod listener;
pub mod session;
pub mod validator;

use std::io;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::profile::{ProfileError, ProfileStore};
use exchange::CodeExchanger;
use listener::{CallbackListener, bind_callback_port};
use session::LoginSession;
use validator::TokenValidator;

#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error(
        "failed to start the login callback listener on port {port}: {source}; \
         choose another port with --port or SLP_CALLBACK_PORT"
    )]
    ListenerStart {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("invalid auth server URL '{url}': {reason}")]
    InvalidAuthServer { url: String, reason: String },
    #[error("authentication timed out after {secs}s; please try again")]
    Timeout { secs: u64 },
    #[error("login interrupted")]
    Interrupted,
    #[error("invalid token received; authentication failed, please try again")]
    Validation,
    #[error(transparent)]
    Persist(#[from] ProfileError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOptions {
    pub port: u16,
    pub timeout: Duration,
    pub auth_server: String,
    pub client_id: String,
}

impl LoginOptions {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            port: cfg.callback_port,
            timeout: Duration::from_secs(cfg.login_timeout_secs),
            auth_server: cfg.auth_server.clone(),
            client_id: cfg.client_id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub host: String,
    pub token: String,
}

/// Drives one browser login attempt. Each call to [`BrowserLogin::run`]
/// uses a fresh session, state value, and listener.
pub struct BrowserLogin<'a, V: ?Sized> {
    options: LoginOptions,
    exchanger: Arc<dyn CodeExchanger>,
    validator: &'a V,
    store: &'a ProfileStore,
    host: &'a str,
}

impl<'a, V> BrowserLogin<'a, V>
where
    V: TokenValidator + ?Sized,
{
    pub fn new(
        options: LoginOptions,
        exchanger: Arc<dyn CodeExchanger>,
        validator: &'a V,
        store: &'a ProfileStore,
        host: &'a str,
    ) -> Self {
        Self {
            options,
            exchanger,
            validator,
            store,
            host,
        }
    }

    /// `launch` is handed the live session and the login page URL once the
    /// listener is accepting callbacks.
    pub async fn run(
        &self,
        launch: impl FnOnce(&LoginSession, &Url),
    ) -> Result<LoginOutcome, LoginError> {
        let tcp = bind_callback_port(self.options.port).await?;
        let port = tcp
            .local_addr()
            .map_err(|source| LoginError::ListenerStart {
                port: self.options.port,
                source,
            })?
            .port();
        let session = Arc::new(LoginSession::new(port));
        let listener = CallbackListener::spawn(tcp, session.clone(), self.exchanger.clone())?;

        let url = session.authorization_url(&self.options.auth_server, &self.options.client_id);
        let waited = match url {
            Ok(url) => {
                launch(&session, &url);
                wait_for_credential(&session, self.options.timeout).await
            }
            Err(err) => Err(err),
        };

        listener.shutdown().await;

        let token = waited?;
        complete_login(self.validator, self.store, self.host, &token).await
    }
}

async fn wait_for_credential(
    session: &LoginSession,
    timeout: Duration,
) -> Result<String, LoginError> {
    debug!(
        port = session.port(),
        timeout_secs = timeout.as_secs(),
        "waiting for login callback"
    );

    tokio::select! {
        waited = tokio::time::timeout(timeout, session.credential().wait()) => {
            waited.map_err(|_| {
                warn!(timeout_secs = timeout.as_secs(), "login callback did not arrive in time");
                LoginError::Timeout { secs: timeout.as_secs() }
            })
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("login interrupted by user");
            Err(LoginError::Interrupted)
        }
    }
}

/// Validates `token` and, only if it is accepted, stores it for `host`.
pub async fn complete_login<V>(
    validator: &V,
    store: &ProfileStore,
    host: &str,
    token: &str,
) -> Result<LoginOutcome, LoginError>
where
    V: TokenValidator + ?Sized,
{
    if !validator.validate(token).await {
        return Err(LoginError::Validation);
    }

    store.set_token(host, token)?;
    info!(host = %host, "login succeeded; token saved");

    Ok(LoginOutcome {
        host: host.to_string(),
        token: token.to_string(),
    })
}

/// Default launcher: print the URL and try the system browser.
pub fn open_in_browser(_session: &LoginSession, url: &Url) {
    println!("A browser window has been opened for you to complete the login process.");
    println!("If it doesn't open automatically, please go to the following URL:");
    println!("{url}");
    println!("Complete the login, and the token will be sent back to this terminal automatically.");

    if let Err(err) = opener::open_browser(url.as_str()) {
        warn!(error = %err, "failed to open the system browser");
    }
}
