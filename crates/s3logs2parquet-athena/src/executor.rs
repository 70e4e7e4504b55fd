use async_trait::async_trait;
use s3logs2parquet_core::{DateRange, ResultSet};

use crate::error::Result;

/// What to fetch from the access-log table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryRequest {
    pub range: DateRange,
    /// Every column instead of the summary projection
    pub select_all: bool,
}

/// Runs the access-log query for a date range and returns its rows.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, request: &QueryRequest) -> Result<ResultSet>;
}
