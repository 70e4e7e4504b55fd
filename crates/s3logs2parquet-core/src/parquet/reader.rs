use anyhow::{Context, Result};
use arrow::array::RecordBatch;
use arrow::compute::concat_batches;
use bytes::Bytes;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

/// Decode a complete Parquet file into a single record batch.
pub fn decode_parquet(bytes: Bytes) -> Result<RecordBatch> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(bytes)
        .context("failed to read parquet footer")?;
    let schema = builder.schema().clone();
    let reader = builder.build().context("failed to build parquet reader")?;

    let batches = reader
        .collect::<Result<Vec<_>, _>>()
        .context("failed to decode parquet row group")?;

    concat_batches(&schema, &batches).context("failed to concatenate parquet batches")
}
