//! HTTP client for the annotation tool's REST API.
//!
//! Only the calls needed to pull an export are implemented: session login,
//! project lookup by name, and the asynchronous export task
//! (start, poll, download).

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::{ExportSource, SyncError};

const CSRF_COOKIE: &str = "csrftoken";
const CSRF_HEADER: &str = "X-CSRFToken";
const EXPORT_FORMAT: &str = "JSONL";
const PROJECT_PAGE_SIZE: usize = 100;

/// Connection settings for the annotation tool.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Like `http://doccano:8000` (trailing slash is trimmed).
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Delay between export-task status checks.
    pub poll_interval: Duration,
    /// Give up on an export task that is not ready after this long.
    pub export_timeout: Duration,
    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://doccano:8000".into(),
            username: "admin".into(),
            password: "password".into(),
            poll_interval: Duration::from_secs(2),
            export_timeout: Duration::from_secs(300),
            accept_invalid_certs: false,
        }
    }
}

/// An annotation project as listed by the tool.
#[derive(Debug, Clone, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
}

#[derive(Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    results: Vec<T>,
}

#[derive(Deserialize)]
struct ExportTask {
    task_id: String,
}

#[derive(Deserialize)]
struct TaskStatus {
    ready: bool,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

/// Session-authenticated client for the annotation tool.
pub struct AnnotationClient {
    client: reqwest::Client,
    base_url: String,
    config: AnnotationConfig,
    csrf_token: Option<String>,
}

impl AnnotationClient {
    /// Build a client without logging in.
    pub fn new(config: AnnotationConfig) -> Result<Self, SyncError> {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            config,
            csrf_token: None,
        })
    }

    /// Build a client and log in with the configured credentials.
    pub async fn connect(config: AnnotationConfig) -> Result<Self, SyncError> {
        let mut client = Self::new(config)?;
        client.login().await?;
        Ok(client)
    }

    /// Open a session. The session cookie is kept by the client; the CSRF
    /// token is sent back on every subsequent POST.
    pub async fn login(&mut self) -> Result<(), SyncError> {
        let url = self.url("/v1/auth/login/");
        info!(url = %url, user = %self.config.username, "logging in to annotation tool");
        let resp = self
            .client
            .post(&url)
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await?;
        let resp = check(resp).await?;
        self.csrf_token = resp
            .cookies()
            .find(|c| c.name() == CSRF_COOKIE)
            .map(|c| c.value().to_string());
        debug!(csrf = self.csrf_token.is_some(), "login complete");
        Ok(())
    }

    /// Find a project by exact name, walking every page of the listing.
    pub async fn find_project(&self, name: &str) -> Result<Project, SyncError> {
        let mut next = Some(format!(
            "{}?limit={PROJECT_PAGE_SIZE}",
            self.url("/v1/projects")
        ));
        while let Some(url) = next {
            debug!(url = %url, "listing projects");
            let resp = check(self.client.get(&url).send().await?).await?;
            let page: Page<Project> = serde_json::from_slice(&resp.bytes().await?)?;
            if let Some(project) = page.results.into_iter().find(|p| p.name == name) {
                return Ok(project);
            }
            next = page.next;
        }
        Err(SyncError::ProjectNotFound(name.to_string()))
    }

    /// Ask the tool to prepare a JSONL export of every document, approved or not.
    async fn start_export(&self, project_id: u64) -> Result<String, SyncError> {
        let url = self.url(&format!("/v1/projects/{project_id}/download"));
        let resp = self
            .post(&url)
            .json(&json!({"format": EXPORT_FORMAT, "exportApproved": false}))
            .send()
            .await?;
        let resp = check(resp).await?;
        let task: ExportTask = serde_json::from_slice(&resp.bytes().await?)?;
        info!(project_id, task_id = %task.task_id, "export task started");
        Ok(task.task_id)
    }

    /// Poll the export task until it is ready, fails, or times out.
    async fn wait_for_export(&self, task_id: &str) -> Result<(), SyncError> {
        let url = self.url(&format!("/v1/tasks/status/{task_id}"));
        let started = Instant::now();
        loop {
            let resp = check(self.client.get(&url).send().await?).await?;
            let status: TaskStatus = serde_json::from_slice(&resp.bytes().await?)?;
            if let Some(detail) = status.failure() {
                return Err(SyncError::ExportFailed {
                    task_id: task_id.to_string(),
                    detail,
                });
            }
            if status.ready {
                return Ok(());
            }
            let waited = started.elapsed();
            if waited >= self.config.export_timeout {
                return Err(SyncError::ExportTimeout {
                    task_id: task_id.to_string(),
                    waited,
                });
            }
            debug!(task_id, ?waited, "export not ready yet");
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Download a finished export into `dest_dir`.
    async fn download_export(
        &self,
        project_id: u64,
        task_id: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, SyncError> {
        let url = format!(
            "{}?taskId={task_id}",
            self.url(&format!("/v1/projects/{project_id}/download"))
        );
        let resp = check(self.client.get(&url).send().await?).await?;
        let bytes = resp.bytes().await?;
        let path = dest_dir.join(format!("project-{project_id}-export"));
        tokio::fs::write(&path, &bytes).await?;
        info!(path = %path.display(), bytes = bytes.len(), "export downloaded");
        Ok(path)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.csrf_token {
            Some(token) => builder.header(CSRF_HEADER, token),
            None => builder,
        }
    }
}

#[async_trait]
impl ExportSource for AnnotationClient {
    async fn fetch_export(
        &self,
        project_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, SyncError> {
        let project = self.find_project(project_name).await?;
        info!(project = %project.name, id = project.id, "exporting project");
        let task_id = self.start_export(project.id).await?;
        self.wait_for_export(&task_id).await?;
        self.download_export(project.id, &task_id, dest_dir).await
    }
}

impl TaskStatus {
    /// Error detail reported by the tool, if any.
    fn failure(&self) -> Option<String> {
        match &self.error {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }
}

/// Turn a non-success response into [`SyncError::Server`].
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, SyncError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(SyncError::Server {
        status: status.as_u16(),
        body,
    })
}
