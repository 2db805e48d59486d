//! Interactive chat with the selected project.
//!
//! Each prompt is posted as a message with a fresh uid; the answer is found
//! by polling the outgoing messages for that uid.

use anyhow::{Context, Result};
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use super::console::failure;
use super::{App, account, projects};
use crate::api::{ApiClient, Project, ReplyDirection};
use crate::profile::ProfileError;

const REPLY_POLL_INTERVAL: Duration = Duration::from_secs(1);
const REPLY_TIMEOUT: Duration = Duration::from_secs(300);
const TYPING_DELAY: Duration = Duration::from_millis(10);

/// Logs in and selects a project first when either is missing.
pub async fn run(app: &mut App) -> Result<()> {
    let profile = match app.profile() {
        Ok(profile) => profile,
        Err(ProfileError::NotLoggedIn { .. }) => {
            account::login(app, None, None, None).await?;
            app.profile()?
        }
        Err(err) => return Err(err.into()),
    };

    let project = match profile.project {
        Some(project) => project,
        None => projects::select(app).await?,
    };

    chat(app, &project).await
}

async fn chat(app: &mut App, project: &Project) -> Result<()> {
    let api = app.api()?;
    let header = format!("Current project: {}", project.display_name());
    println!("{header}");
    println!("{}", "-".repeat(header.chars().count()));
    println!("type a prompt, or 'exit' to quit (Ctrl-C also exits)");

    loop {
        let Some(input) = app.console.read_line("> ").await? else {
            break;
        };

        let prompt = input.trim();
        if prompt.is_empty() {
            continue;
        }
        if prompt.eq_ignore_ascii_case("exit") || prompt.eq_ignore_ascii_case("quit") {
            break;
        }

        let uid = Uuid::new_v4().to_string();
        let posted = match api.send_message(&project.id, &uid, prompt).await {
            Ok(posted) => posted,
            Err(err) => {
                failure(&format!("{err:#}"));
                continue;
            }
        };

        let waited = tokio::select! {
            reply = await_reply(&api, &project.id, &posted.uid, REPLY_TIMEOUT, REPLY_POLL_INTERVAL) => {
                reply
            }
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        match waited {
            Some(text) => type_out(text.trim(), TYPING_DELAY).await?,
            None => failure("No answer received in time; please try again."),
        }
    }

    Ok(())
}

/// Text of the first outgoing reply for `uid`, or `None` once `timeout`
/// passes. Poll failures are logged and retried.
pub async fn await_reply(
    api: &ApiClient,
    project_id: &str,
    uid: &str,
    timeout: Duration,
    interval: Duration,
) -> Option<String> {
    let deadline = Instant::now() + timeout;
    loop {
        match api.replies(project_id, uid).await {
            Ok(replies) => {
                if let Some(reply) = replies
                    .into_iter()
                    .find(|reply| reply.direction == ReplyDirection::Out && reply.uid == uid)
                {
                    return Some(reply.text);
                }
                debug!(uid = %uid, "reply not ready yet");
            }
            Err(err) => warn!(uid = %uid, error = %err, "failed to poll for reply"),
        }

        if Instant::now() + interval > deadline {
            return None;
        }
        tokio::time::sleep(interval).await;
    }
}

async fn type_out(text: &str, delay: Duration) -> Result<()> {
    let mut stdout = io::stdout();
    for ch in text.chars() {
        write!(stdout, "{ch}").context("Failed to write to stdout")?;
        stdout.flush().context("Failed to flush stdout")?;
        tokio::time::sleep(delay).await;
    }
    writeln!(stdout, "\n").context("Failed to write to stdout")?;
    Ok(())
}
