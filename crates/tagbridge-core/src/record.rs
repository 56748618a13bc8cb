//! Exported annotation records and the updates derived from them.

use serde_json::{Map, Value};

/// A field the annotation tool may emit as nothing, a single value, or a list.
///
/// Falsy JSON values (`null`, `false`, zero, `""`, and empty lists or objects)
/// carry no decision. As a whole field they are `Absent`; inside a list they
/// keep their position as `None`, so a falsy head still shadows later items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FieldValue {
    #[default]
    Absent,
    Scalar(String),
    Sequence(Vec<Option<String>>),
}

impl FieldValue {
    /// The significant value of a single-choice field: the scalar itself, or
    /// the first element of a sequence.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Absent => None,
            Self::Scalar(s) => Some(s.as_str()),
            Self::Sequence(items) => items.first()?.as_deref(),
        }
    }

    /// The field rendered as one string, non-empty sequence elements joined
    /// by `sep`.
    ///
    /// Returns `None` when the result would be empty.
    pub fn joined(&self, sep: &str) -> Option<String> {
        let value = match self {
            Self::Absent => return None,
            Self::Scalar(s) => s.clone(),
            Self::Sequence(items) => items
                .iter()
                .flatten()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(sep),
        };
        (!value.is_empty()).then_some(value)
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<&Value> for FieldValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Array(items) if !items.is_empty() => {
                Self::Sequence(items.iter().map(display_value).collect())
            }
            Value::Array(_) | Value::Object(_) => Self::Absent,
            scalar => display_value(scalar).map_or(Self::Absent, Self::Scalar),
        }
    }
}

impl From<Option<&Value>> for FieldValue {
    fn from(value: Option<&Value>) -> Self {
        value.map(Self::from).unwrap_or_default()
    }
}

/// Render a JSON value the way a reviewer would read it: strings bare,
/// everything else as JSON text. Falsy values render as `None`.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

/// One annotated document as it appears in a JSONL export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExportRecord {
    /// Rendered document body shown to the reviewer.
    pub text: String,
    /// Metadata attached when the document was created.
    pub meta: Map<String, Value>,
    pub label: FieldValue,
    pub comment: FieldValue,
    pub comments: FieldValue,
}

impl ExportRecord {
    /// Build a record from a decoded JSON object. Missing or mistyped fields
    /// fall back to their empty forms.
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        let text = match obj.get("text") {
            Some(Value::String(s)) => s.clone(),
            _ => String::new(),
        };
        let meta = match obj.get("meta") {
            Some(Value::Object(m)) => m.clone(),
            _ => Map::new(),
        };
        Self {
            text,
            meta,
            label: obj.get("label").into(),
            comment: obj.get("comment").into(),
            comments: obj.get("comments").into(),
        }
    }

    /// A metadata entry as a field value.
    pub fn meta_field(&self, key: &str) -> FieldValue {
        self.meta.get(key).into()
    }
}

/// A reviewer decision ready to be written back to the source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciliationUpdate {
    pub row_id: String,
    pub label: String,
    /// `None` leaves the stored comment untouched.
    pub comment: Option<String>,
}

impl ReconciliationUpdate {
    pub fn new(row_id: impl Into<String>, label: impl Into<String>, comment: Option<String>) -> Self {
        Self {
            row_id: row_id.into(),
            label: label.into(),
            comment,
        }
    }
}
