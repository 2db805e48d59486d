//! Command handlers behind the CLI.

pub mod account;
pub mod chat;
pub mod console;
pub mod projects;
pub mod upload;

use anyhow::Result;
use reqwest::Client;

use crate::api::ApiClient;
use crate::cli::{Command, ProjectsCommand};
use crate::config::Config;
use crate::profile::{Profile, ProfileError, ProfileStore};
use console::Console;

/// State shared by every command for one process run.
pub struct App {
    pub cfg: Config,
    pub client: Client,
    pub store: ProfileStore,
    pub host: String,
    pub console: Console,
}

impl App {
    pub fn new(cfg: Config, client: Client) -> Self {
        let store = ProfileStore::new(cfg.profile_path.clone());
        let host = cfg.endpoint_host();
        Self {
            cfg,
            client,
            store,
            host,
            console: Console::new(),
        }
    }

    pub fn profile(&self) -> Result<Profile, ProfileError> {
        self.store.current(&self.host)
    }

    /// Client authenticated with the stored token for this endpoint.
    pub fn api(&self) -> Result<ApiClient, ProfileError> {
        let profile = self.profile()?;
        let token = profile.token().unwrap_or_default();
        Ok(ApiClient::new(self.client.clone(), &self.cfg, token))
    }
}

pub async fn dispatch(app: &mut App, command: Command) -> Result<()> {
    match command {
        Command::Login {
            port,
            timeout,
            token,
        } => account::login(app, port, timeout, token).await,
        Command::Whoami => account::whoami(app).await,
        Command::Run => chat::run(app).await,
        Command::Upload { path } => {
            let project = app.profile()?.selected_project()?.clone();
            upload::upload(app, &project, &path).await
        }
        Command::Projects(command) => match command {
            ProjectsCommand::List => projects::list(app).await,
            ProjectsCommand::Select => projects::select(app).await.map(|_| ()),
            ProjectsCommand::Create { name } => projects::create(app, &name).await,
            ProjectsCommand::Get { id } => projects::get(app, &id).await,
            ProjectsCommand::Set { id, temp, memory } => {
                projects::set(app, &id, temp, memory).await
            }
            ProjectsCommand::Delete { name, id } => {
                projects::delete(app, name.as_deref(), id.as_deref()).await
            }
            ProjectsCommand::Upload { id, path } => projects::upload(app, &id, &path).await,
        },
        Command::Version => {
            account::version();
            Ok(())
        }
    }
}
