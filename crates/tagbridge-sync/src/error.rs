use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[cfg(feature = "http")]
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("project {0:?} not found; run bootstrap first")]
    ProjectNotFound(String),

    #[error("export task {task_id} failed: {detail}")]
    ExportFailed { task_id: String, detail: String },

    #[error("export task {task_id} not ready after {waited:?}")]
    ExportTimeout { task_id: String, waited: Duration },

    #[error("I/O error writing export: {0}")]
    Io(#[from] std::io::Error),
}
