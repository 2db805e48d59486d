use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use super::ApiClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Project {
    /// `title(name)`, the form shown in pickers and headers.
    pub fn display_name(&self) -> String {
        format!("{}({})", self.title, self.name)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectConfig {
    pub temperature: f32,
    pub memory: bool,
}

#[derive(Debug, Serialize)]
struct CreateProjectRequest<'a> {
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateProjectResponse {
    id: String,
}

impl ApiClient {
    pub async fn projects(&self) -> Result<Vec<Project>> {
        Ok(self.me().await?.projects)
    }

    pub async fn project_by_id(&self, id: &str) -> Result<Option<Project>> {
        Ok(self
            .projects()
            .await?
            .into_iter()
            .find(|project| project.id == id))
    }

    /// Creates a project and returns its full record as listed by `/users/me`.
    pub async fn create_project(&self, title: &str) -> Result<Project> {
        let api_url = self.url(&["projects"]);
        let created: CreateProjectResponse = self
            .send_json(
                self.client
                    .post(&api_url)
                    .json(&CreateProjectRequest { title }),
                &api_url,
            )
            .await?;
        info!(project_id = %created.id, "created project");

        self.project_by_id(&created.id)
            .await?
            .ok_or_else(|| anyhow!("Project '{}' was created but is not listed", created.id))
    }

    pub async fn set_project_config(&self, project_id: &str, config: ProjectConfig) -> Result<()> {
        let api_url = self.url(&["projects", project_id, "config"]);
        self.send(self.client.post(&api_url).json(&config), &api_url)
            .await?;
        Ok(())
    }

    pub async fn delete_project(&self, project_id: &str) -> Result<()> {
        let api_url = self.url(&["projects", project_id]);
        self.send(self.client.delete(&api_url), &api_url).await?;
        info!(project_id = %project_id, "deleted project");
        Ok(())
    }
}
