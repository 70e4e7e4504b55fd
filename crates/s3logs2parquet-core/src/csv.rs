//! Gzip-compressed CSV export of the combined dataset, for recipients who
//! want the raw rows in a spreadsheet.

use anyhow::{Context, Result};
use arrow::array::RecordBatch;
use arrow::csv::WriterBuilder;
use flate2::write::GzEncoder;
use flate2::Compression;

/// Encode `batch` as CSV with a header row, gzip-compressed.
pub fn encode_csv_gz(batch: &RecordBatch) -> Result<Vec<u8>> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut writer = WriterBuilder::new().with_header(true).build(encoder);

    writer.write(batch).context("failed to write CSV rows")?;

    writer
        .into_inner()
        .finish()
        .context("failed to finish gzip stream")
}
