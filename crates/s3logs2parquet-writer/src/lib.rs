//! Artifact storage for s3logs2parquet
//!
//! Reads the stored combined dataset, publishes the merged result as
//! Parquet and gzip CSV, stores per-period metrics and removes query-engine
//! output, all through OpenDAL so the same code drives S3 and a local
//! directory.

// Rich diagnostic messages on the error path outweigh a smaller error type.
#![allow(clippy::result_large_err)]

mod error;
mod layout;
mod publish;
mod storage;

pub use error::{ErrorCode, Result, WriterError};
pub use layout::ArtifactLayout;
pub use publish::{PublishedArtifacts, Publisher};
pub use storage::ArtifactStore;
