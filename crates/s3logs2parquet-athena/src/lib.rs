//! Query execution against the access-log table
//!
//! [`QueryExecutor`] is the seam the pipeline depends on. [`AthenaExecutor`]
//! implements it on Amazon Athena: it submits an `UNLOAD` of the access-log
//! query, polls the execution until it settles, then reads the Parquet
//! files Athena produced through the result [`ArtifactStore`].
//!
//! [`ArtifactStore`]: s3logs2parquet_writer::ArtifactStore

mod athena;
mod error;
mod executor;
pub mod sql;

pub use athena::{AthenaApi, AthenaExecutor, ExecutionStatus, SdkAthenaApi};
pub use error::{QueryError, Result};
pub use executor::{QueryExecutor, QueryRequest};
