use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("no results for query")]
    NoResults,

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("{0}")]
    Other(String),
}
