//! Short-lived local HTTP listener that receives the browser redirect.
//!
//! Only `GET /callback` touches the session. It is served on a background
//! task and stopped with a graceful shutdown signal, so a response that is
//! already being written is never cut off.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::LoginError;
use super::exchange::{CodeExchanger, exchange_or_fallback};
use super::session::LoginSession;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

const PAGE_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>{title}</title>
<style>
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #1b1b1b; color: #f0f0f0; text-align: center; padding-top: 15vh; }
.error { color: #ff6b6b; }
code { color: #7fd1b9; }
</style>
</head>
<body>
<h1>{title}</h1>
<p class="{class}">{message}</p>
<p>{hint}</p>
</body>
</html>"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CallbackRejection {
    #[error("Invalid state parameter. Authentication failed.")]
    StateMismatch,
    #[error("No token or authorization code received.")]
    MissingCredential,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackAccepted {
    Stored,
    AlreadyStored,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

/// Validates one callback against the session and stores its credential.
/// Rejections never mutate the session.
pub async fn process_callback(
    session: &LoginSession,
    exchanger: &dyn CodeExchanger,
    query: &CallbackQuery,
) -> Result<CallbackAccepted, CallbackRejection> {
    if !session.state_matches(query.state.as_deref()) {
        return Err(CallbackRejection::StateMismatch);
    }

    let token = if let Some(token) = non_empty(query.token.as_deref()) {
        token.to_string()
    } else if let Some(code) = non_empty(query.code.as_deref()) {
        if session.credential().is_set() {
            return Ok(CallbackAccepted::AlreadyStored);
        }
        exchange_or_fallback(exchanger, code, session.redirect_uri()).await
    } else {
        return Err(CallbackRejection::MissingCredential);
    };

    if session.credential().offer(token) {
        Ok(CallbackAccepted::Stored)
    } else {
        Ok(CallbackAccepted::AlreadyStored)
    }
}

fn render_page(title: &str, class: &str, message: &str, hint: &str) -> Html<String> {
    Html(
        PAGE_TEMPLATE
            .replace("{title}", title)
            .replace("{class}", class)
            .replace("{message}", message)
            .replace("{hint}", hint),
    )
}

fn success_page() -> Html<String> {
    render_page(
        "Authentication Successful",
        "success",
        "You are now logged in to Smartloop.",
        "You can close this window and return to your terminal.",
    )
}

fn error_page(message: &str) -> Html<String> {
    render_page(
        "Authentication Error",
        "error",
        message,
        "Please try again by running <code>smartloop login</code> in your terminal.",
    )
}

#[derive(Clone)]
struct ListenerState {
    session: Arc<LoginSession>,
    exchanger: Arc<dyn CodeExchanger>,
}

async fn handle_callback(
    State(state): State<ListenerState>,
    Query(query): Query<CallbackQuery>,
) -> (StatusCode, Html<String>) {
    match process_callback(&state.session, state.exchanger.as_ref(), &query).await {
        Ok(CallbackAccepted::Stored) => {
            info!(port = state.session.port(), "login callback accepted");
            (StatusCode::OK, success_page())
        }
        Ok(CallbackAccepted::AlreadyStored) => {
            debug!("login callback repeated after a credential was stored; ignoring");
            (StatusCode::OK, success_page())
        }
        Err(rejection) => {
            warn!(reason = ?rejection, "login callback rejected");
            (StatusCode::BAD_REQUEST, error_page(&rejection.to_string()))
        }
    }
}

async fn handle_unknown() -> (StatusCode, Html<String>) {
    (StatusCode::NOT_FOUND, error_page("Not found."))
}

fn router(session: Arc<LoginSession>, exchanger: Arc<dyn CodeExchanger>) -> Router {
    Router::new()
        .route("/callback", get(handle_callback))
        .fallback(handle_unknown)
        .with_state(ListenerState { session, exchanger })
}

/// Binds the callback port on the loopback interface. Port 0 picks a free one.
pub async fn bind_callback_port(port: u16) -> Result<TcpListener, LoginError> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr)
        .await
        .map_err(|source| LoginError::ListenerStart { port, source })
}

/// A running callback listener. Stop it with [`CallbackListener::shutdown`];
/// dropping it only signals shutdown.
pub struct CallbackListener {
    addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl CallbackListener {
    pub fn spawn(
        listener: TcpListener,
        session: Arc<LoginSession>,
        exchanger: Arc<dyn CodeExchanger>,
    ) -> Result<Self, LoginError> {
        let addr = listener
            .local_addr()
            .map_err(|source| LoginError::ListenerStart {
                port: session.port(),
                source,
            })?;
        let app = router(session, exchanger);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(err) = serve.await {
                warn!(addr = %addr, error = %err, "login callback listener failed");
            }
        });
        debug!(addr = %addr, "login callback listener started");

        Ok(Self {
            addr,
            shutdown_tx: Some(shutdown_tx),
            task: Some(task),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stops accepting, lets in-flight responses finish, and waits for the
    /// port to be released. Connections still open after the grace period
    /// are dropped.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(mut task) = self.task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
                warn!(addr = %self.addr, "login callback listener did not stop in time; aborting");
                task.abort();
                let _ = task.await;
            }
        }
        debug!(addr = %self.addr, "login callback listener stopped");
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
