//! Storage layer: DuckDB source-of-truth tables that reviewer decisions are written back to.

mod error;
pub use error::StoreError;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{REVIEW_COLUMNS, ReviewStore};
