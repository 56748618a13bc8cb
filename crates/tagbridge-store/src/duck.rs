//! DuckDB write-back of reviewer decisions.

use std::path::Path;

use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use tagbridge_core::{ExportTarget, ReconciliationUpdate};
use tracing::{debug, info};

use crate::StoreError;

/// Columns every reconciliation target table carries, in write order:
/// label, comment, review timestamp.
pub const REVIEW_COLUMNS: [&str; 3] = ["reviewer_label", "reviewer_comment", "reviewed_at"];

/// DuckDB store holding the source-of-truth tables reviewed in the annotation tool.
///
/// Each target table is keyed by an identifier column and carries the
/// [`REVIEW_COLUMNS`]. Supports both in-memory (ephemeral) and persistent
/// (file-backed) modes.
pub struct ReviewStore {
    conn: Connection,
}

impl ReviewStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Ok(Self { conn })
    }

    // ── Write-back ──

    /// Apply `updates` to `target.table`, stamping every row with the current time.
    ///
    /// See [`apply_updates_at`](Self::apply_updates_at).
    pub fn apply_updates(
        &mut self,
        target: &ExportTarget,
        updates: &[ReconciliationUpdate],
    ) -> Result<usize, StoreError> {
        self.apply_updates_at(target, updates, Utc::now())
    }

    /// Apply `updates` to `target.table` in a single transaction.
    ///
    /// Each update sets `reviewer_label` and `reviewed_at`, and replaces
    /// `reviewer_comment` only when the update carries one. Rows are matched
    /// on the text form of `target.id_column`; an id with no matching row is
    /// a no-op. Later updates to the same id overwrite earlier ones.
    ///
    /// Returns the number of updates attempted. Any error rolls back the
    /// whole batch.
    pub fn apply_updates_at(
        &mut self,
        target: &ExportTarget,
        updates: &[ReconciliationUpdate],
        reviewed_at: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let table = quote_identifier(&target.table)?;
        let id_column = quote_identifier(&target.id_column)?;
        let [label_col, comment_col, reviewed_col] = REVIEW_COLUMNS;
        let sql = format!(
            "UPDATE {table}
             SET {label_col} = ?,
                 {comment_col} = COALESCE(?, {comment_col}),
                 {reviewed_col} = CAST(? AS TIMESTAMP)
             WHERE CAST({id_column} AS VARCHAR) = ?"
        );
        let stamp = reviewed_at.format("%Y-%m-%d %H:%M:%S%.6f").to_string();

        let tx = self.conn.transaction()?;
        let mut matched = 0usize;
        {
            let mut stmt = tx.prepare(&sql)?;
            for update in updates {
                matched += stmt.execute(params![
                    update.label,
                    update.comment,
                    stamp,
                    update.row_id
                ])?;
            }
        }
        tx.commit()?;

        debug!(table = %target.table, matched, "rows matched by write-back");
        info!(table = %target.table, count = updates.len(), "applied reviewer decisions");
        Ok(updates.len())
    }

    // ── Counts ──

    /// Number of rows in `table` that carry a reviewer label.
    pub fn reviewed_count(&self, table: &str) -> Result<usize, StoreError> {
        let table = quote_identifier(table)?;
        let [label_col, ..] = REVIEW_COLUMNS;
        self.count(&format!(
            "SELECT count(*)::BIGINT AS cnt FROM {table} WHERE {label_col} IS NOT NULL"
        ))
    }

    /// Number of rows in `table`.
    pub fn row_count(&self, table: &str) -> Result<usize, StoreError> {
        let table = quote_identifier(table)?;
        self.count(&format!("SELECT count(*)::BIGINT AS cnt FROM {table}"))
    }

    fn count(&self, sql: &str) -> Result<usize, StoreError> {
        let batches = self.query_arrow(sql)?;
        let batch = batches.first().ok_or(StoreError::NoResults)?;
        let col = batch
            .column(0)
            .as_any()
            .downcast_ref::<arrow::array::Int64Array>()
            .ok_or_else(|| StoreError::Other("count column not i64".into()))?;
        Ok(col.value(0) as usize)
    }

    // ── Escape hatch ──

    /// Execute arbitrary SQL and return Arrow RecordBatches.
    pub fn query_arrow(&self, sql: &str) -> Result<Vec<RecordBatch>, StoreError> {
        let mut stmt = self.conn.prepare(sql)?;
        let batches: Vec<RecordBatch> = stmt.query_arrow([])?.collect();
        Ok(batches)
    }

    /// Access the underlying DuckDB connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

/// Validate and double-quote a possibly schema-qualified SQL identifier.
///
/// Each dot-separated part must match `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn quote_identifier(name: &str) -> Result<String, StoreError> {
    let valid_part = |part: &str| {
        let mut chars = part.chars();
        chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    };
    if !name.split('.').all(valid_part) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(name
        .split('.')
        .map(|part| format!("\"{part}\""))
        .collect::<Vec<_>>()
        .join("."))
}
