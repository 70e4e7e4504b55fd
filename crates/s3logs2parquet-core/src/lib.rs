// s3logs2parquet-core - Pure logic for the access-log summary pipeline
//
// Date range resolution, the merge of new query results into the
// accumulated dataset, Parquet/CSV encoding and report metrics.
// No I/O, no async, no runtime dependencies.

pub mod csv;
pub mod dataset;
pub mod date_range;
pub mod merge;
pub mod parquet;
pub mod report;
pub mod types;

pub use self::csv::encode_csv_gz;
pub use self::dataset::{CombinedDataset, PriorDataset, ResultSet};
pub use self::date_range::{resolve, DateRange, DateRangeError, Frequency};
pub use self::merge::{merge, MergeError};
pub use self::parquet::{decode_parquet, encode_parquet, EncodedParquet};
pub use self::report::{render_html, render_text, PeriodMetrics, ReportContext, UsageReport};
pub use self::types::Blake3Hash;
