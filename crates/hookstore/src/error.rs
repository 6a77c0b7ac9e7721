//! Store error types

use thiserror::Error;

/// Errors surfaced by the store registry and its configuration
///
/// Reducers and projections are not wrapped: a panicking reducer unwinds
/// straight out of `dispatch`, a panicking projection out of `tick`.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No store has been created under this name
    #[error("Unknown store: {0}")]
    UnknownStore(String),

    /// Store options could not be parsed
    #[error("Invalid store configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;
