//! Turns decoded export lines into reconciliation updates.
//!
//! Records without a resolvable row identifier or without a label are
//! skipped, not rejected: partial review coverage must not block writing
//! back the rows that were reviewed. Only a line that is not JSON at all
//! is an error.

use serde_json::Value;
use thiserror::Error;

use crate::record::{ExportRecord, ReconciliationUpdate};
use crate::resolve::IdentifierResolver;
use crate::target::ExportTarget;

/// Separator placed between comments given as a list.
pub const COMMENT_SEPARATOR: &str = " | ";

/// `meta` keys consulted for a comment when the record has none of its own.
const META_COMMENT_KEYS: &[&str] = &["comment", "reviewer_comment"];

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("line {line}: invalid JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Why a record produced no update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Valid JSON, but not an object.
    NotAnObject,
    NoIdentifier,
    NoLabel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Update(ReconciliationUpdate),
    Skip(SkipReason),
}

pub struct Normalizer {
    resolver: IdentifierResolver,
}

impl Normalizer {
    pub fn new(resolver: IdentifierResolver) -> Self {
        Self { resolver }
    }

    /// Normalizer using the standard identifier chain for `target`.
    pub fn for_target(target: &ExportTarget) -> Self {
        Self::new(IdentifierResolver::standard(target.meta_key()))
    }

    /// Parse and normalise one non-blank export line.
    ///
    /// `line_no` is 1-based and only used for error reporting.
    pub fn normalize_line(&self, line: &str, line_no: usize) -> Result<Outcome, NormalizeError> {
        let value: Value = serde_json::from_str(line).map_err(|source| NormalizeError::Json {
            line: line_no,
            source,
        })?;
        let Value::Object(obj) = value else {
            return Ok(Outcome::Skip(SkipReason::NotAnObject));
        };
        Ok(self.normalize_record(&ExportRecord::from_object(&obj)))
    }

    pub fn normalize_record(&self, record: &ExportRecord) -> Outcome {
        let Some(row_id) = self.resolver.resolve(record) else {
            return Outcome::Skip(SkipReason::NoIdentifier);
        };
        let Some(label) = record.label.first() else {
            return Outcome::Skip(SkipReason::NoLabel);
        };
        Outcome::Update(ReconciliationUpdate::new(
            row_id,
            label,
            select_comment(record),
        ))
    }
}

/// The reviewer comment, taken from the first non-empty of `comment`,
/// `comments`, `meta.comment`, `meta.reviewer_comment`.
pub fn select_comment(record: &ExportRecord) -> Option<String> {
    let own = [&record.comment, &record.comments]
        .into_iter()
        .find_map(|field| field.joined(COMMENT_SEPARATOR));
    own.or_else(|| {
        META_COMMENT_KEYS
            .iter()
            .find_map(|key| record.meta_field(key).joined(COMMENT_SEPARATOR))
    })
}
