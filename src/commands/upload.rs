use anyhow::{Context, Result, bail};
use directories::BaseDirs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use super::App;
use super::console::{failure, success};
use crate::api::{ApiClient, Project};

/// Extensions picked up when a directory is uploaded, in upload order.
const DOCUMENT_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// How document status is polled after an upload.
#[derive(Debug, Clone, Copy)]
pub struct Polling {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Polling {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(600),
        }
    }
}

fn expand_home(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };
    match BaseDirs::new() {
        Some(dirs) => dirs.home_dir().join(rest),
        None => path.to_path_buf(),
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

/// A directory yields its top-level documents grouped by extension; a file
/// yields itself.
pub fn collect_documents(path: &Path) -> Result<Vec<PathBuf>> {
    let path = expand_home(path);
    if path.is_file() {
        return Ok(vec![path]);
    }
    if !path.is_dir() {
        bail!("'{}' is neither a file nor a directory", path.display());
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(&path)
        .with_context(|| format!("Failed to read directory '{}'", path.display()))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|entry| entry.is_file())
        .collect();
    entries.sort();

    Ok(DOCUMENT_EXTENSIONS
        .iter()
        .flat_map(|ext| entries.iter().filter(move |entry| has_extension(entry, ext)))
        .cloned()
        .collect())
}

/// Polls the document until the service no longer reports it as pending.
/// `Ok(false)` means it was still pending when `timeout` ran out.
pub async fn wait_until_processed(
    api: &ApiClient,
    project_id: &str,
    document_id: &str,
    interval: Duration,
    timeout: Duration,
) -> Result<bool> {
    let deadline = Instant::now() + timeout;
    loop {
        if !api.document_status(project_id, document_id).await?.is_pending {
            return Ok(true);
        }
        if Instant::now() + interval > deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

/// Uploads each document in turn. A failed upload or status check is
/// reported and the rest of the batch still runs.
pub async fn upload_documents(
    api: &ApiClient,
    project_id: &str,
    documents: &[PathBuf],
    poll: Polling,
) -> Result<()> {
    let mut failed = 0usize;
    for document in documents {
        println!("Uploading {}", document.display());
        let uploaded = match api.upload_document(project_id, document).await {
            Ok(uploaded) => uploaded,
            Err(err) => {
                warn!(file = %document.display(), error = %err, "document upload failed");
                failure(&format!("{err:#}"));
                failed += 1;
                continue;
            }
        };
        success("Uploaded.");

        if let Some(document_id) = uploaded.id.as_deref() {
            println!("Processing document...");
            match wait_until_processed(api, project_id, document_id, poll.interval, poll.timeout)
                .await
            {
                Ok(true) => success("Completed."),
                Ok(false) => println!(
                    "Still processing after {}s; it will finish in the background.",
                    poll.timeout.as_secs()
                ),
                Err(err) => {
                    warn!(file = %document.display(), error = %err, "document status check failed");
                    failure(&format!("{err:#}"));
                    failed += 1;
                    continue;
                }
            }
        }
        info!(file = %document.display(), project_id = %project_id, "document uploaded");
    }

    if failed > 0 {
        bail!("{failed} of {} uploads failed", documents.len());
    }
    Ok(())
}

pub async fn upload(app: &App, project: &Project, path: &Path) -> Result<()> {
    let api = app.api()?;
    let documents = collect_documents(path)?;
    if documents.is_empty() {
        println!("No documents (.pdf, .docx, .txt) found in '{}'", path.display());
        return Ok(());
    }

    upload_documents(&api, &project.id, &documents, Polling::default()).await
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, put};
    use reqwest::Client;
    use serde_json::json;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::{Polling, collect_documents, upload_documents, wait_until_processed};
    use crate::api::ApiClient;
    use crate::api::test_support::{config_for, serve};

    #[test]
    fn collect_documents_filters_directory_by_extension() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.txt", "a.pdf", "c.docx", "image.png", "z.PDF"] {
            fs::write(dir.path().join(name), "x").expect("write");
        }
        fs::create_dir(dir.path().join("nested.pdf")).expect("mkdir");

        let names: Vec<String> = collect_documents(dir.path())
            .expect("collect")
            .iter()
            .map(|path| path.file_name().expect("name").to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.pdf", "z.PDF", "c.docx", "b.txt"]);
    }

    #[test]
    fn collect_documents_accepts_a_single_file_of_any_type() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("slides.pptx");
        fs::write(&file, "x").expect("write");
        assert_eq!(collect_documents(&file).expect("collect"), vec![file]);
    }

    #[test]
    fn collect_documents_rejects_missing_paths() {
        assert!(collect_documents(Path::new("/definitely/not/here")).is_err());
    }

    #[tokio::test]
    async fn wait_until_processed_polls_until_not_pending() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let router = Router::new().route(
            "/v1/projects/p1/documents/d1",
            get(move || {
                let counter = counter.clone();
                async move {
                    let seen = counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(json!({"is_pending": seen < 2}))
                }
            }),
        );
        let addr = serve(router).await;
        let api = ApiClient::new(Client::new(), &config_for(addr), "t");

        let done = wait_until_processed(
            &api,
            "p1",
            "d1",
            Duration::from_millis(10),
            Duration::from_secs(5),
        )
        .await
        .expect("wait");
        assert!(done);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn wait_until_processed_stops_at_timeout() {
        let router = Router::new().route(
            "/v1/projects/p1/documents/d1",
            get(|| async { axum::Json(json!({"is_pending": true})) }),
        );
        let addr = serve(router).await;
        let api = ApiClient::new(Client::new(), &config_for(addr), "t");

        let done = wait_until_processed(
            &api,
            "p1",
            "d1",
            Duration::from_millis(20),
            Duration::from_millis(100),
        )
        .await
        .expect("wait");
        assert!(!done);
    }

    #[tokio::test]
    async fn failing_status_checks_do_not_stop_the_batch() {
        let puts = Arc::new(AtomicUsize::new(0));
        let counter = puts.clone();
        let router = Router::new()
            .route(
                "/v1/projects/p1/documents",
                put(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        axum::Json(json!({"id": "d1"}))
                    }
                }),
            )
            .route(
                "/v1/projects/p1/documents/d1",
                get(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        axum::Json(json!({"detail": "status unavailable"})),
                    )
                }),
            );
        let addr = serve(router).await;
        let api = ApiClient::new(Client::new(), &config_for(addr), "t");

        let dir = tempfile::tempdir().expect("tempdir");
        let documents: Vec<_> = ["a.pdf", "b.docx", "c.txt"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, "x").expect("write");
                path
            })
            .collect();
        let poll = Polling {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(1),
        };

        let err = upload_documents(&api, "p1", &documents, poll)
            .await
            .expect_err("batch should report failures");
        assert!(err.to_string().contains("3 of 3"), "unexpected error: {err}");
        assert_eq!(puts.load(Ordering::SeqCst), 3);
    }
}
