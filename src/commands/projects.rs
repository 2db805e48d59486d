use anyhow::{Result, bail};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::path::Path;
use tabled::{Table, Tabled, settings::Style as TableStyle};

use super::App;
use super::console::{failure, success};
use super::upload;
use crate::api::{Project, ProjectConfig};

#[derive(Debug, Tabled)]
struct ProjectRow {
    #[tabled(rename = "Current")]
    current: &'static str,
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "Title")]
    title: String,
}

#[derive(Debug, Tabled)]
struct PropertyRow {
    #[tabled(rename = "Property")]
    property: String,
    #[tabled(rename = "Value")]
    value: String,
}

fn project_rows(projects: &[Project], current_id: Option<&str>) -> Vec<ProjectRow> {
    projects
        .iter()
        .map(|project| ProjectRow {
            current: if Some(project.id.as_str()) == current_id {
                "[*]"
            } else {
                "[ ]"
            },
            id: project.id.clone(),
            title: project.title.clone(),
        })
        .collect()
}

/// RFC 3339 timestamps in local time; anything else is shown as received.
fn format_created_at(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

fn config_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn property_rows(project: &Project) -> Vec<PropertyRow> {
    let mut rows = vec![
        PropertyRow {
            property: "id".to_string(),
            value: project.id.clone(),
        },
        PropertyRow {
            property: "title".to_string(),
            value: project.title.clone(),
        },
        PropertyRow {
            property: "name".to_string(),
            value: project.name.clone(),
        },
    ];
    if let Some(created_at) = &project.created_at {
        rows.push(PropertyRow {
            property: "created_at".to_string(),
            value: format_created_at(created_at),
        });
    }
    if let Some(config) = &project.config {
        rows.extend(config.iter().map(|(key, value)| PropertyRow {
            property: key.clone(),
            value: config_value(value),
        }));
    }
    rows
}

/// 1-based menu choice, `None` when out of range or not a number.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    input
        .trim()
        .parse::<usize>()
        .ok()
        .filter(|choice| (1..=count).contains(choice))
        .map(|choice| choice - 1)
}

/// Matches by title when one is given, by id otherwise.
fn find_target<'a>(
    projects: &'a [Project],
    title: Option<&str>,
    id: Option<&str>,
) -> Option<&'a Project> {
    match (title, id) {
        (Some(title), _) => projects.iter().find(|project| project.title == title),
        (None, Some(id)) => projects.iter().find(|project| project.id == id),
        (None, None) => None,
    }
}

pub async fn list(app: &App) -> Result<()> {
    let profile = app.profile()?;
    let projects = app.api()?.projects().await?;
    if projects.is_empty() {
        println!("No projects yet. Create one with `smartloop projects create --name <NAME>`.");
        return Ok(());
    }

    let current_id = profile.project.as_ref().map(|project| project.id.as_str());
    let table = Table::new(project_rows(&projects, current_id))
        .with(TableStyle::rounded())
        .to_string();
    println!("{table}");
    Ok(())
}

/// Prompts for one of the account's projects and stores it as the default.
pub async fn select(app: &mut App) -> Result<Project> {
    let projects = app.api()?.projects().await?;
    if projects.is_empty() {
        bail!("No project has been created; run `smartloop projects create --name <NAME>` first");
    }

    println!("Select a project:");
    for (idx, project) in projects.iter().enumerate() {
        println!("  {}) {}", idx + 1, project.display_name());
    }

    let prompt = format!("Project [1-{}]: ", projects.len());
    let project = loop {
        let Some(input) = app.console.read_line(&prompt).await? else {
            bail!("No project selected");
        };
        match parse_choice(&input, projects.len()) {
            Some(idx) => break projects[idx].clone(),
            None => failure(&format!(
                "Please enter a number between 1 and {}",
                projects.len()
            )),
        }
    };

    app.store.set_project(&app.host, project.clone())?;
    success(&format!("Default project set to: {}", project.display_name()));
    Ok(project)
}

pub async fn create(app: &App, title: &str) -> Result<()> {
    let project = app.api()?.create_project(title).await?;
    app.store.set_project(&app.host, project.clone())?;
    success("Project created successfully");
    println!("Default project set to: {}", project.display_name());
    Ok(())
}

pub async fn get(app: &App, id: &str) -> Result<()> {
    match app.api()?.project_by_id(id).await? {
        Some(project) => {
            let table = Table::new(property_rows(&project))
                .with(TableStyle::rounded())
                .to_string();
            println!("{table}");
        }
        None => failure("No project found"),
    }
    Ok(())
}

pub async fn set(app: &App, id: &str, temperature: f32, memory: bool) -> Result<()> {
    let api = app.api()?;
    if api.project_by_id(id).await?.is_none() {
        failure("No project found");
        return Ok(());
    }

    api.set_project_config(
        id,
        ProjectConfig {
            temperature,
            memory,
        },
    )
    .await?;
    success("Project configuration updated");
    Ok(())
}

pub async fn delete(app: &App, title: Option<&str>, id: Option<&str>) -> Result<()> {
    let api = app.api()?;
    let projects = api.projects().await?;
    let Some(project) = find_target(&projects, title, id) else {
        failure("No project found");
        return Ok(());
    };

    api.delete_project(&project.id).await?;

    let selected = app.profile()?.project.map(|selected| selected.id);
    if selected.as_deref() == Some(project.id.as_str()) {
        app.store.clear_project(&app.host)?;
    }

    success(&format!("Project {} deleted", project.display_name()));
    Ok(())
}

pub async fn upload(app: &App, id: &str, path: &Path) -> Result<()> {
    match app.api()?.project_by_id(id).await? {
        Some(project) => upload::upload(app, &project, path).await,
        None => {
            failure("No project found");
            Ok(())
        }
    }
}
