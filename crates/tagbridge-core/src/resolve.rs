//! Row identifier resolution for exported records.
//!
//! Strategies are tried in order and the first one that yields a non-empty
//! identifier wins. The standard chain looks in structured metadata first
//! and only then scans the document body for a legacy `ID: <value>` marker.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::record::ExportRecord;

static LEGACY_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ID:\s*([^\n\r]+)").expect("valid legacy id regex"));

/// One way of recovering a row identifier from a record.
pub trait IdentifierStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    fn resolve(&self, record: &ExportRecord) -> Option<String>;
}

/// Looks the identifier up under a fixed key of the record's `meta` mapping.
#[derive(Debug, Clone)]
pub struct MetaField {
    key: String,
}

impl MetaField {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }
}

impl IdentifierStrategy for MetaField {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn resolve(&self, record: &ExportRecord) -> Option<String> {
        match record.meta.get(&self.key)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Scans the document body for the legacy embedded `ID: <value>` marker.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextMarker;

impl IdentifierStrategy for TextMarker {
    fn name(&self) -> &'static str {
        "text-marker"
    }

    fn resolve(&self, record: &ExportRecord) -> Option<String> {
        find_legacy_id(&record.text)
    }
}

/// First `ID: <value>` marker in `text`, value trimmed to the end of its line.
pub fn find_legacy_id(text: &str) -> Option<String> {
    let caps = LEGACY_ID_RE.captures(text)?;
    let value = caps.get(1)?.as_str().trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Ordered chain of identifier strategies.
pub struct IdentifierResolver {
    strategies: Vec<Box<dyn IdentifierStrategy>>,
}

impl IdentifierResolver {
    pub fn new(strategies: Vec<Box<dyn IdentifierStrategy>>) -> Self {
        Self { strategies }
    }

    /// Metadata lookup under `meta_key`, then the legacy text marker.
    pub fn standard(meta_key: &str) -> Self {
        Self::new(vec![Box::new(MetaField::new(meta_key)), Box::new(TextMarker)])
    }

    pub fn resolve(&self, record: &ExportRecord) -> Option<String> {
        self.strategies.iter().find_map(|strategy| {
            let id = strategy.resolve(record)?;
            tracing::trace!(strategy = strategy.name(), id = %id, "resolved row identifier");
            Some(id)
        })
    }
}
