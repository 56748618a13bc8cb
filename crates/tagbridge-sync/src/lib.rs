//! Sync layer: fetching project exports from the annotation tool.

mod error;
mod source;

pub use error::SyncError;
pub use source::ExportSource;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{AnnotationClient, AnnotationConfig};
