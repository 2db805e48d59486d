use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::App;
use super::console::success;
use crate::login::exchange::HttpCodeExchanger;
use crate::login::validator::ApiTokenValidator;
use crate::login::{self, BrowserLogin, LoginOptions};

/// Browser login unless `token` is given; CLI flags override configuration.
pub async fn login(
    app: &App,
    port: Option<u16>,
    timeout_secs: Option<u64>,
    token: Option<String>,
) -> Result<()> {
    let validator = ApiTokenValidator::new(&app.client, &app.cfg);

    let outcome = match token.filter(|token| !token.trim().is_empty()) {
        Some(token) => {
            info!(host = %app.host, "logging in with a supplied token");
            login::complete_login(&validator, &app.store, &app.host, token.trim()).await?
        }
        None => {
            let mut options = LoginOptions::from_config(&app.cfg);
            if let Some(port) = port {
                options.port = port;
            }
            if let Some(secs) = timeout_secs.filter(|secs| *secs > 0) {
                options.timeout = Duration::from_secs(secs);
            }
            let exchanger = Arc::new(HttpCodeExchanger::new(app.client.clone(), &app.cfg));
            BrowserLogin::new(options, exchanger, &validator, &app.store, &app.host)
                .run(login::open_in_browser)
                .await?
        }
    };

    success("[✓] Token successfully saved in user profile");
    success(&format!("[✓] Logged in to {}", outcome.host));
    println!("Next, select a project with `smartloop projects select` or create one with `smartloop projects create --name <NAME>`.");
    Ok(())
}

pub async fn whoami(app: &App) -> Result<()> {
    let user = app.api()?.me().await?;
    match user.name.as_deref().filter(|name| !name.is_empty()) {
        Some(name) => println!("{name}"),
        None => println!("(unnamed account)"),
    }
    Ok(())
}

pub fn version() {
    println!("Version: {}", env!("CARGO_PKG_VERSION"));
}
