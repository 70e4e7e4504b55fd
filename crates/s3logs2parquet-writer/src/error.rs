//! Error types for the artifact storage crate

use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// S001: Storage operator could not be built from the configuration
    S001StorageInit,
    /// S002: Reading an object failed
    S002ReadFailure,
    /// S003: Writing an object failed
    S003WriteFailure,
    /// S004: Encoding an artifact failed
    S004EncodeFailure,
    /// S005: Deleting a prefix failed
    S005DeleteFailure,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S001StorageInit => "S001",
            Self::S002ReadFailure => "S002",
            Self::S003WriteFailure => "S003",
            Self::S004EncodeFailure => "S004",
            Self::S005DeleteFailure => "S005",
        }
    }

    pub fn docs_url(&self) -> String {
        format!("docs/troubleshooting.md#{}", self.as_str().to_lowercase())
    }
}

/// Errors raised while reading, writing or deleting artifacts
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("[{code}] Storage initialization failed for '{location}': {reason}\n\nTroubleshooting:\n  • Check RESULT_PATH / S3_LOGS_LOCATION\n  • Verify AWS credentials and region\n\nSee: {docs_url}")]
    StorageInit {
        code: &'static str,
        location: String,
        reason: String,
        docs_url: String,
    },

    #[error("[{code}] Read of '{path}' failed: {reason}\n\nSee: {docs_url}")]
    ReadFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },

    #[error("[{code}] Write of '{path}' failed: {reason}\n\nSee: {docs_url}")]
    WriteFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },

    #[error("[{code}] Encoding {artifact} failed: {reason}\n\nSee: {docs_url}")]
    EncodeFailure {
        code: &'static str,
        artifact: &'static str,
        reason: String,
        docs_url: String,
    },

    #[error("[{code}] Deleting '{path}' failed: {reason}\n\nSee: {docs_url}")]
    DeleteFailure {
        code: &'static str,
        path: String,
        reason: String,
        docs_url: String,
    },
}

impl WriterError {
    pub fn storage_init(location: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::S001StorageInit;
        Self::StorageInit {
            code: code_enum.as_str(),
            location: location.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    pub fn read_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::S002ReadFailure;
        Self::ReadFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    pub fn write_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::S003WriteFailure;
        Self::WriteFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    pub fn encode_failure(artifact: &'static str, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::S004EncodeFailure;
        Self::EncodeFailure {
            code: code_enum.as_str(),
            artifact,
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    pub fn delete_failure(path: impl Into<String>, reason: impl ToString) -> Self {
        let code_enum = ErrorCode::S005DeleteFailure;
        Self::DeleteFailure {
            code: code_enum.as_str(),
            path: path.into(),
            reason: reason.to_string(),
            docs_url: code_enum.docs_url(),
        }
    }

    /// The stable code carried by this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageInit { code, .. }
            | Self::ReadFailure { code, .. }
            | Self::WriteFailure { code, .. }
            | Self::EncodeFailure { code, .. }
            | Self::DeleteFailure { code, .. } => code,
        }
    }
}

/// Result type alias for WriterError
pub type Result<T> = std::result::Result<T, WriterError>;
