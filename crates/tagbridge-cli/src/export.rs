//! Export pipeline: fetch a project export → decode → normalise → write back to DuckDB.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use tagbridge_core::{
    ExportTarget, Normalizer, Outcome, ReconciliationUpdate, SkipReason, open_export,
};
use tagbridge_store::ReviewStore;
use tagbridge_sync::ExportSource;
use tracing::{debug, info};

pub const TAG_TABLE: &str = "tag_qa_candidates";
pub const TAG_ID_COLUMN: &str = "candidate_id";
pub const ALIAS_TABLE: &str = "alias_qa_pairs";
pub const ALIAS_ID_COLUMN: &str = "pair_id";

/// The tag and alias review projects, in the order they are exported.
pub fn default_targets(tag_project: &str, alias_project: &str) -> Vec<ExportTarget> {
    vec![
        ExportTarget::new(tag_project, TAG_TABLE, TAG_ID_COLUMN),
        ExportTarget::new(alias_project, ALIAS_TABLE, ALIAS_ID_COLUMN),
    ]
}

/// What one export run read, skipped, and wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportReport {
    pub table: String,
    pub lines_read: usize,
    pub blank_lines: usize,
    pub skipped_not_object: usize,
    pub skipped_no_identifier: usize,
    pub skipped_no_label: usize,
    /// Updates applied; the number reported to the operator.
    pub updates_written: usize,
    /// Rows in the table carrying a reviewer label after the write.
    pub reviewed_total: usize,
    pub elapsed_secs: f64,
}

impl ExportReport {
    fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            ..Self::default()
        }
    }

    fn count_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::NotAnObject => self.skipped_not_object += 1,
            SkipReason::NoIdentifier => self.skipped_no_identifier += 1,
            SkipReason::NoLabel => self.skipped_no_label += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_not_object + self.skipped_no_identifier + self.skipped_no_label
    }
}

/// Fetch `target`'s export from `source` into `work_dir` and write it back.
pub async fn run_export<S>(
    source: &S,
    store: &mut ReviewStore,
    target: &ExportTarget,
    work_dir: &Path,
) -> anyhow::Result<ExportReport>
where
    S: ExportSource + ?Sized,
{
    let start = Instant::now();
    let path = source
        .fetch_export(&target.project_name, work_dir)
        .await
        .with_context(|| format!("fetching export for project {:?}", target.project_name))?;
    let mut report = reconcile_file(store, target, &path)?;
    report.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(report)
}

/// Write the decisions in an already downloaded export file back to `target.table`.
///
/// The whole file is read before anything is written, so a malformed line
/// aborts the run with the table untouched.
pub fn reconcile_file(
    store: &mut ReviewStore,
    target: &ExportTarget,
    path: &Path,
) -> anyhow::Result<ExportReport> {
    let start = Instant::now();
    let mut report = ExportReport::new(&target.table);

    // 1. Decode and normalise every line.
    let normalizer = Normalizer::for_target(target);
    let updates = collect_updates(path, &normalizer, &mut report)?;
    info!(
        table = %target.table,
        lines = report.lines_read,
        updates = updates.len(),
        skipped = report.skipped(),
        "export decoded"
    );

    // 2. Apply in one transaction.
    report.updates_written = store
        .apply_updates(target, &updates)
        .with_context(|| format!("writing reviewer decisions to {}", target.table))?;
    report.reviewed_total = store
        .reviewed_count(&target.table)
        .with_context(|| format!("counting reviewed rows in {}", target.table))?;

    report.elapsed_secs = start.elapsed().as_secs_f64();
    Ok(report)
}

fn collect_updates(
    path: &Path,
    normalizer: &Normalizer,
    report: &mut ExportReport,
) -> anyhow::Result<Vec<ReconciliationUpdate>> {
    let lines = open_export(path).with_context(|| format!("opening export {}", path.display()))?;
    debug!(format = lines.format().as_str(), "decoding export");

    let mut updates = Vec::new();
    for (idx, line) in lines.enumerate() {
        let line = line.with_context(|| format!("reading export {}", path.display()))?;
        report.lines_read += 1;
        if line.trim().is_empty() {
            report.blank_lines += 1;
            continue;
        }
        match normalizer.normalize_line(&line, idx + 1)? {
            Outcome::Update(update) => updates.push(update),
            Outcome::Skip(reason) => {
                debug!(line = idx + 1, ?reason, "skipping record");
                report.count_skip(reason);
            }
        }
    }
    Ok(updates)
}
