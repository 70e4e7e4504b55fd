//! Pipeline-level errors with stable codes.

use s3logs2parquet_athena::QueryError;
use s3logs2parquet_core::{DateRangeError, MergeError};
use s3logs2parquet_writer::WriterError;
use thiserror::Error;

use crate::notify::NotifyError;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// E001: Arguments or configuration missing, conflicting or invalid
    E001Configuration,
    /// E002: The query failed, was cancelled or timed out
    E002QueryExecution,
    /// E003: The stored dataset is unreadable or incompatible
    E003Merge,
    /// E004: Reading or writing an artifact failed
    E004Publish,
    /// E005: The report could not be delivered
    E005Notification,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001Configuration => "E001",
            Self::E002QueryExecution => "E002",
            Self::E003Merge => "E003",
            Self::E004Publish => "E004",
            Self::E005Notification => "E005",
        }
    }

    pub fn docs_url(&self) -> String {
        format!("docs/troubleshooting.md#{}", self.as_str().to_lowercase())
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("[E001] Configuration error: {message}\n\nHow to fix:\n  • Pass either --frequency or --date_range START END (YYYY-MM-DD)\n  • Check ATHENA_DATABASE, ATHENA_TABLE, RESULT_PATH and S3_LOGS_LOCATION\n\nSee: docs/troubleshooting.md#e001")]
    Configuration { message: String },

    #[error("[E002] Query execution failed: {0}\n\nHow to fix:\n  • Look up the execution in the Athena console\n  • Raise S3LOGS2PARQUET_QUERY_TIMEOUT_SECS for long periods\n\nSee: docs/troubleshooting.md#e002")]
    QueryExecution(#[source] QueryError),

    #[error("[E003] Merge failed: {0}\n\nHow to fix:\n  • Rerun with the projection the stored dataset was built with (--select_all or not)\n  • Or move the stored combined dataset aside to start a new one\n\nSee: docs/troubleshooting.md#e003")]
    Merge(#[source] MergeError),

    #[error("[E004] Storage access failed: {0}")]
    Publish(#[source] WriterError),

    #[error("[E005] Notification failed: {0}\n\nHow to fix:\n  • Check SMTP_HOST, SMTP_PORT, SMTP_USERNAME and SMTP_PASSWORD\n  • Check FROM_EMAIL, REPLY_TO_EMAIL and TARGET_EMAIL_ADDRESS\n\nSee: docs/troubleshooting.md#e005")]
    Notification(#[source] NotifyError),
}

impl PipelineError {
    pub fn configuration(message: impl ToString) -> Self {
        Self::Configuration {
            message: message.to_string(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Configuration { .. } => ErrorCode::E001Configuration,
            Self::QueryExecution(_) => ErrorCode::E002QueryExecution,
            Self::Merge(_) => ErrorCode::E003Merge,
            Self::Publish(_) => ErrorCode::E004Publish,
            Self::Notification(_) => ErrorCode::E005Notification,
        }
    }
}

impl From<DateRangeError> for PipelineError {
    fn from(e: DateRangeError) -> Self {
        Self::configuration(e)
    }
}

impl From<QueryError> for PipelineError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::InvalidConfig(message) => Self::Configuration { message },
            other => Self::QueryExecution(other),
        }
    }
}

impl From<MergeError> for PipelineError {
    fn from(e: MergeError) -> Self {
        Self::Merge(e)
    }
}

impl From<WriterError> for PipelineError {
    fn from(e: WriterError) -> Self {
        Self::Publish(e)
    }
}

impl From<NotifyError> for PipelineError {
    fn from(e: NotifyError) -> Self {
        Self::Notification(e)
    }
}
