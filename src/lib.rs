pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;
pub mod login;
pub mod profile;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tracing::{debug, info};

use cli::Cli;
use commands::App;
use config::Config;

pub async fn run() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = logging::init(cli.verbose);

    let cfg = Config::from_env();
    info!(
        endpoint = %cfg.endpoint,
        auth_server = %cfg.auth_server,
        callback_port = cfg.callback_port,
        profile_path = %cfg.profile_path.display(),
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .build()
        .context("Failed to initialize HTTP client")?;

    let mut app = App::new(cfg, client);
    debug!(host = %app.host, profile_path = %app.store.path().display(), "opened profile store");
    commands::dispatch(&mut app, cli.command).await
}
