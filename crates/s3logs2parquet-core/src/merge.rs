//! Merge of freshly queried rows into the accumulated dataset.
//!
//! Log records have no natural key, so two rows are duplicates only when
//! every field matches. Rows are compared through the Arrow row format,
//! which encodes the full field tuple into comparable bytes.

use std::collections::HashSet;

use arrow::array::{RecordBatch, UInt32Array};
use arrow::compute::{concat_batches, take};
use arrow::datatypes::SchemaRef;
use arrow::error::ArrowError;
use arrow::row::{RowConverter, SortField};
use thiserror::Error;
use tracing::debug;

use crate::dataset::{CombinedDataset, PriorDataset, ResultSet};

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("stored dataset schema is incompatible with the new results: {detail}")]
    SchemaMismatch { detail: String },

    #[error("stored dataset could not be decoded: {0}")]
    CorruptArtifact(String),

    #[error("arrow error while merging: {0}")]
    Arrow(#[from] ArrowError),
}

impl MergeError {
    fn mismatch(detail: impl Into<String>) -> Self {
        MergeError::SchemaMismatch {
            detail: detail.into(),
        }
    }
}

/// Merge `new` into `prior`.
///
/// Existing rows come first, then new rows; exact duplicates are dropped
/// keeping the first occurrence. With no prior dataset the new rows are
/// returned unchanged.
pub fn merge(prior: PriorDataset, new: &ResultSet) -> Result<CombinedDataset, MergeError> {
    let existing = match prior {
        PriorDataset::Absent => return Ok(CombinedDataset::new(new.batch().clone())),
        PriorDataset::Present(existing) => existing,
    };

    if new.is_empty() {
        return Ok(existing);
    }

    let schema = existing.schema();
    let incoming = align_to(&schema, new.batch())?;
    let combined = concat_batches(&schema, [existing.batch(), &incoming])?;
    let before = combined.num_rows();
    let deduplicated = deduplicate(combined)?;

    debug!(
        existing_rows = existing.num_rows(),
        new_rows = new.num_rows(),
        duplicates_removed = before - deduplicated.num_rows(),
        "merged result set into combined dataset"
    );

    Ok(CombinedDataset::new(deduplicated))
}

/// Rebuild `batch` under the stored schema. Column names, order and data
/// types must match; nullability follows the stored schema as long as the
/// new columns satisfy it.
fn align_to(schema: &SchemaRef, batch: &RecordBatch) -> Result<RecordBatch, MergeError> {
    let incoming = batch.schema();
    if incoming.fields().len() != schema.fields().len() {
        return Err(MergeError::mismatch(format!(
            "expected {} columns, found {}",
            schema.fields().len(),
            incoming.fields().len()
        )));
    }

    for (idx, (expected, actual)) in schema
        .fields()
        .iter()
        .zip(incoming.fields().iter())
        .enumerate()
    {
        if expected.name() != actual.name() {
            return Err(MergeError::mismatch(format!(
                "column {} is '{}' in the stored dataset but '{}' in the new results",
                idx,
                expected.name(),
                actual.name()
            )));
        }
        if expected.data_type() != actual.data_type() {
            return Err(MergeError::mismatch(format!(
                "column '{}' has type {} in the stored dataset but {} in the new results",
                expected.name(),
                expected.data_type(),
                actual.data_type()
            )));
        }
    }

    RecordBatch::try_new(schema.clone(), batch.columns().to_vec())
        .map_err(|e| MergeError::mismatch(e.to_string()))
}

/// Drop rows identical to an earlier row, preserving order.
fn deduplicate(batch: RecordBatch) -> Result<RecordBatch, MergeError> {
    if batch.num_columns() == 0 || batch.num_rows() < 2 {
        return Ok(batch);
    }

    let fields = batch
        .schema()
        .fields()
        .iter()
        .map(|field| SortField::new(field.data_type().clone()))
        .collect();
    let converter = RowConverter::new(fields)?;
    let rows = converter.convert_columns(batch.columns())?;

    let mut seen = HashSet::with_capacity(rows.num_rows());
    let mut keep: Vec<u32> = Vec::with_capacity(rows.num_rows());
    for (idx, row) in rows.iter().enumerate() {
        if seen.insert(row) {
            keep.push(idx as u32);
        }
    }

    if keep.len() == batch.num_rows() {
        return Ok(batch);
    }

    let indices = UInt32Array::from(keep);
    let columns = batch
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::DateRange;
    use arrow::array::{Array, Int64Array, StringArray};
    use arrow::datatypes::{DataType, Field, Schema};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
        )
        .unwrap()
    }

    fn schema(nullable: bool) -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("requestid", DataType::Utf8, nullable),
            Field::new("objectsize", DataType::Int64, true),
        ]))
    }

    fn batch(ids: &[&str], sizes: &[Option<i64>]) -> RecordBatch {
        RecordBatch::try_new(
            schema(true),
            vec![
                Arc::new(StringArray::from(ids.to_vec())),
                Arc::new(Int64Array::from(sizes.to_vec())),
            ],
        )
        .unwrap()
    }

    fn ids(dataset: &CombinedDataset) -> Vec<String> {
        let col = dataset
            .batch()
            .column(0)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        (0..col.len()).map(|i| col.value(i).to_string()).collect()
    }

    #[test]
    fn absent_prior_returns_new_rows_unchanged() {
        let new = ResultSet::from_batch(range(), batch(&["a", "a"], &[Some(1), Some(1)]));
        let merged = merge(PriorDataset::Absent, &new).unwrap();
        assert_eq!(merged.batch(), new.batch());
    }

    #[test]
    fn duplicates_keep_first_occurrence_in_order() {
        let prior = PriorDataset::Present(CombinedDataset::new(batch(
            &["a", "b"],
            &[Some(1), Some(2)],
        )));
        let new = ResultSet::from_batch(
            range(),
            batch(&["c", "b", "a", "c"], &[Some(3), Some(2), Some(9), Some(3)]),
        );
        let merged = merge(prior, &new).unwrap();
        // ("a", 9) differs from ("a", 1) in one field, so both survive
        assert_eq!(ids(&merged), vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn nulls_compare_equal_to_nulls() {
        let prior = PriorDataset::Present(CombinedDataset::new(batch(&["a"], &[None])));
        let new = ResultSet::from_batch(range(), batch(&["a", "a"], &[None, Some(0)]));
        let merged = merge(prior, &new).unwrap();
        assert_eq!(merged.num_rows(), 2);
    }

    #[test]
    fn empty_new_set_returns_prior() {
        let existing = CombinedDataset::new(batch(&["a", "b"], &[Some(1), Some(2)]));
        let new = ResultSet::from_batch(range(), RecordBatch::new_empty(schema(true)));
        let merged = merge(PriorDataset::Present(existing.clone()), &new).unwrap();
        assert_eq!(merged, existing);

        let merged = merge(PriorDataset::Absent, &new).unwrap();
        assert_eq!(merged.num_rows(), 0);
        assert_eq!(merged.schema(), schema(true));
    }

    #[test]
    fn merging_twice_is_idempotent() {
        let prior = PriorDataset::Present(CombinedDataset::new(batch(
            &["a", "b", "c"],
            &[Some(1), Some(2), Some(3)],
        )));
        let new = ResultSet::from_batch(range(), batch(&["c", "d"], &[Some(3), Some(4)]));

        let once = merge(prior, &new).unwrap();
        let twice = merge(PriorDataset::Present(once.clone()), &new).unwrap();
        assert_eq!(once, twice);
        assert_eq!(ids(&once), vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn duplicates_from_a_first_run_collapse_on_the_next_merge() {
        let new = ResultSet::from_batch(
            range(),
            batch(&["a", "a", "b"], &[Some(1), Some(1), Some(2)]),
        );

        let first = merge(PriorDataset::Absent, &new).unwrap();
        assert_eq!(first.num_rows(), 3);

        let second = merge(PriorDataset::Present(first), &new).unwrap();
        assert_eq!(ids(&second), vec!["a", "b"]);

        let third = merge(PriorDataset::Present(second.clone()), &new).unwrap();
        assert_eq!(third, second);
    }

    #[test]
    fn renamed_column_is_a_schema_mismatch() {
        let prior = PriorDataset::Present(CombinedDataset::new(batch(&["a"], &[Some(1)])));
        let other = Arc::new(Schema::new(vec![
            Field::new("request_id", DataType::Utf8, true),
            Field::new("objectsize", DataType::Int64, true),
        ]));
        let new_batch = RecordBatch::try_new(
            other,
            vec![
                Arc::new(StringArray::from(vec!["b"])),
                Arc::new(Int64Array::from(vec![2])),
            ],
        )
        .unwrap();
        let err = merge(prior, &ResultSet::from_batch(range(), new_batch)).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
    }

    #[test]
    fn retyped_or_extra_column_is_a_schema_mismatch() {
        let prior = PriorDataset::Present(CombinedDataset::new(batch(&["a"], &[Some(1)])));
        let retyped = Arc::new(Schema::new(vec![
            Field::new("requestid", DataType::Utf8, true),
            Field::new("objectsize", DataType::Utf8, true),
        ]));
        let new_batch = RecordBatch::try_new(
            retyped,
            vec![
                Arc::new(StringArray::from(vec!["b"])),
                Arc::new(StringArray::from(vec!["2"])),
            ],
        )
        .unwrap();
        let err = merge(prior.clone(), &ResultSet::from_batch(range(), new_batch)).unwrap_err();
        assert!(err.to_string().contains("objectsize"));

        let single = Arc::new(Schema::new(vec![Field::new(
            "requestid",
            DataType::Utf8,
            true,
        )]));
        let new_batch =
            RecordBatch::try_new(single, vec![Arc::new(StringArray::from(vec!["b"]))]).unwrap();
        assert!(matches!(
            merge(prior, &ResultSet::from_batch(range(), new_batch)),
            Err(MergeError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn stored_non_nullable_schema_is_adopted() {
        let strict = RecordBatch::try_new(
            schema(false),
            vec![
                Arc::new(StringArray::from(vec!["a"])),
                Arc::new(Int64Array::from(vec![1])),
            ],
        )
        .unwrap();
        let prior = PriorDataset::Present(CombinedDataset::new(strict));

        let new = ResultSet::from_batch(range(), batch(&["b"], &[Some(2)]));
        let merged = merge(prior.clone(), &new).unwrap();
        assert_eq!(merged.schema(), schema(false));
        assert_eq!(merged.num_rows(), 2);

        let with_null = RecordBatch::try_new(
            schema(true),
            vec![
                Arc::new(StringArray::from(vec![None::<&str>])),
                Arc::new(Int64Array::from(vec![Some(3)])),
            ],
        )
        .unwrap();
        let err = merge(prior, &ResultSet::from_batch(range(), with_null)).unwrap_err();
        assert!(matches!(err, MergeError::SchemaMismatch { .. }));
    }
}
