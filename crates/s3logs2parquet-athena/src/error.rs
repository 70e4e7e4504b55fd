//! Error types for query execution

use s3logs2parquet_writer::WriterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query engine configuration is invalid: {0}")]
    InvalidConfig(String),

    #[error("failed to start query: {0}")]
    Start(String),

    #[error("query service request failed: {0}")]
    Service(String),

    #[error("query {execution_id} reached state {state}: {reason}")]
    Failed {
        execution_id: String,
        state: String,
        reason: String,
    },

    #[error("query {execution_id} did not finish within {timeout_secs}s")]
    Timeout {
        execution_id: String,
        timeout_secs: u64,
    },

    #[error("failed to read query results: {0}")]
    Storage(#[from] WriterError),

    #[error("failed to decode result file '{uri}': {reason}")]
    Decode { uri: String, reason: String },
}

pub type Result<T> = std::result::Result<T, QueryError>;
