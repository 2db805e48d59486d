use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use super::ApiClient;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadedDocument {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentStatus {
    #[serde(default)]
    pub is_pending: bool,
}

pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        _ => "application/octet-stream",
    }
}

impl ApiClient {
    /// `PUT /projects/{id}/documents` with the file as multipart field `file`.
    pub async fn upload_document(&self, project_id: &str, path: &Path) -> Result<UploadedDocument> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read '{}'", path.display()))?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        debug!(
            file = %path.display(),
            bytes = bytes.len(),
            project_id = %project_id,
            "uploading document"
        );

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type_for(path))
            .context("Invalid document content type")?;
        let form = Form::new().part("file", part);

        let api_url = self.url(&["projects", project_id, "documents"]);
        self.send_json(self.client.put(&api_url).multipart(form), &api_url)
            .await
    }

    /// A `null` body means the document is no longer tracked as pending.
    pub async fn document_status(&self, project_id: &str, document_id: &str) -> Result<DocumentStatus> {
        let api_url = self.url(&["projects", project_id, "documents", document_id]);
        let status: Option<DocumentStatus> =
            self.send_json(self.client.get(&api_url), &api_url).await?;
        Ok(status.unwrap_or_default())
    }
}
