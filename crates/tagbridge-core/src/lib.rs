//! Core types and pure pipeline logic for syncing reviewer decisions back
//! from annotation-tool exports.

pub mod decode;
pub mod normalize;
pub mod record;
pub mod resolve;
pub mod target;

pub use decode::{ContainerFormat, DecodeError, ExportLines, open_export};
pub use normalize::{NormalizeError, Normalizer, Outcome, SkipReason};
pub use record::{ExportRecord, FieldValue, ReconciliationUpdate};
pub use resolve::{IdentifierResolver, IdentifierStrategy, MetaField, TextMarker};
pub use target::ExportTarget;
