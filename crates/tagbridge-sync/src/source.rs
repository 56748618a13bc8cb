use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::SyncError;

/// Something that can produce a downloaded export file for a project.
///
/// The returned file may be plain JSONL or wrapped in any container the
/// decoder understands. Retry and timeout policy belong to the implementor.
#[async_trait]
pub trait ExportSource {
    /// Download every document of `project_name` into `dest_dir` and return
    /// the path of the written file.
    async fn fetch_export(
        &self,
        project_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, SyncError>;
}
