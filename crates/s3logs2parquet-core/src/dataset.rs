//! In-memory datasets flowing through the pipeline.
//!
//! Each dataset holds its rows as a single concatenated `RecordBatch`; the
//! volumes involved (one reporting period of access-log summaries) fit in
//! memory comfortably and a single batch keeps row addressing trivial for
//! the deduplicating merge.

use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use bytes::Bytes;

use crate::date_range::DateRange;
use crate::merge::MergeError;
use crate::parquet::decode_parquet;

/// Rows returned by the query engine for one date range.
#[derive(Debug, Clone)]
pub struct ResultSet {
    range: DateRange,
    batch: RecordBatch,
}

impl ResultSet {
    /// Concatenate the batches read from the engine's output files.
    pub fn new(
        range: DateRange,
        schema: SchemaRef,
        batches: &[RecordBatch],
    ) -> Result<Self, ArrowError> {
        let batch = concat_batches(&schema, batches)?;
        Ok(Self { range, batch })
    }

    pub fn from_batch(range: DateRange, batch: RecordBatch) -> Self {
        Self { range, batch }
    }

    pub fn range(&self) -> DateRange {
        self.range
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }
}

/// Deduplicated union of every result set merged so far.
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedDataset {
    batch: RecordBatch,
}

impl CombinedDataset {
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }
}

/// Result of reading the stored combined artifact at the start of a run.
#[derive(Debug, Clone, PartialEq)]
pub enum PriorDataset {
    Present(CombinedDataset),
    Absent,
}

impl PriorDataset {
    /// Decode the stored Parquet artifact. `None` means the object does not
    /// exist yet (first run).
    pub fn decode(bytes: Option<Bytes>) -> Result<Self, MergeError> {
        match bytes {
            None => Ok(PriorDataset::Absent),
            Some(bytes) => {
                let batch = decode_parquet(bytes)
                    .map_err(|e| MergeError::CorruptArtifact(format!("{:#}", e)))?;
                Ok(PriorDataset::Present(CombinedDataset::new(batch)))
            }
        }
    }

    pub fn num_rows(&self) -> usize {
        match self {
            PriorDataset::Present(dataset) => dataset.num_rows(),
            PriorDataset::Absent => 0,
        }
    }

    pub fn is_present(&self) -> bool {
        matches!(self, PriorDataset::Present(_))
    }
}
