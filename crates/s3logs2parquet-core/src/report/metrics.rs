//! Usage metrics computed from one period of access-log rows.

use std::collections::{HashMap, HashSet};

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Int64Type};
use arrow::error::ArrowError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::date_range::DateRange;

/// Timestamp format of the `requestdatetime` column (`06/Feb/2019:00:00:38 +0000`).
const REQUEST_TIME_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";
const NO_REFERRER: &str = "Direct or N/A";
const NOT_AVAILABLE: &str = "NA";

const TOP_FILES: usize = 10;
const TOP_ENTRIES: usize = 5;

/// Top-level prefixes that carry no project/feature structure.
const UNSTRUCTURED_SECTIONS: &[&str] = &["default", "athena", "FAVICON.ICO", "TEST-OBJECT"];

/// A value and how often it occurred, most frequent first in every list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedCount {
    pub value: String,
    pub count: u64,
}

/// Metrics for the whole period or for one top-level key prefix.
///
/// Field names are kept stable: stored JSON files are read back to build
/// the trend of later reports.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodMetrics {
    pub total_overall_interactions_count: u64,
    pub total_files_downloads_count: u64,
    pub total_unique_files_downloaded: u64,
    pub total_dataset_uploaded_count: u64,
    /// Bytes
    pub total_dataset_downloaded_size: u64,
    /// Bytes
    pub total_dataset_uploaded_size: u64,
    pub unique_users_overall: u64,
    pub unique_users_by_download: u64,
    pub popular_files_by_download: Vec<RankedCount>,
    pub top_referrers_by_download: Vec<RankedCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub popular_projects_by_download: Vec<RankedCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub popular_features_by_download: Vec<RankedCount>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub popular_fileformats_by_download: Vec<RankedCount>,
}

/// The subset of a stored metrics file needed for the trend.
///
/// Unknown fields are ignored, so files written by earlier releases (which
/// stored sizes as formatted strings) still load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct HistoricalMetrics {
    #[serde(default)]
    pub total_files_downloads_count: u64,
    #[serde(default)]
    pub unique_users_overall: u64,
}

/// One access-log row reduced to the fields the metrics use.
#[derive(Debug, Clone)]
struct AccessRecord {
    method: String,
    key: String,
    section: String,
    bytes_sent: i64,
    object_size: i64,
    remote_ip: Option<String>,
    referrer: String,
    request_time: Option<DateTime<FixedOffset>>,
}

impl AccessRecord {
    fn is_download(&self) -> bool {
        self.method == "GET"
    }

    fn is_upload(&self) -> bool {
        self.method == "PUT" || self.method == "POST"
    }

    fn is_interaction(&self) -> bool {
        !matches!(self.method.as_str(), "POST" | "PUT" | "DELETE")
    }
}

/// Rows of one result set, decoded once for every metric computation.
#[derive(Debug, Clone)]
pub struct AccessLog {
    records: Vec<AccessRecord>,
}

impl AccessLog {
    /// Extract the metric columns from `batch`.
    ///
    /// Missing columns are treated as empty; numeric columns are cast from
    /// whatever type the engine produced, unparseable values count as 0.
    /// `bytessent` is absent from the summary projection, in which case
    /// download volume falls back to `objectsize`.
    pub fn from_batch(batch: &RecordBatch) -> Result<Self, ArrowError> {
        let operation = string_column(batch, "operation")?;
        let key = string_column(batch, "key")?;
        let remote_ip = string_column(batch, "remoteip")?;
        let referrer = string_column(batch, "referrer")?;
        let request_time = string_column(batch, "requestdatetime")?;
        let object_size = int_column(batch, "objectsize")?;
        let bytes_sent = match int_column(batch, "bytessent")? {
            Some(column) => Some(column),
            None => object_size.clone(),
        };

        let records = (0..batch.num_rows())
            .map(|row| {
                let key = string_at(&key, row).unwrap_or_default();
                let method = string_at(&operation, row)
                    .map(|op| method_of(&op))
                    .unwrap_or_default();
                AccessRecord {
                    section: key.split('/').next().unwrap_or_default().to_string(),
                    key,
                    method,
                    bytes_sent: int_at(&bytes_sent, row),
                    object_size: int_at(&object_size, row),
                    remote_ip: string_at(&remote_ip, row).filter(|ip| !ip.is_empty()),
                    referrer: referrer_host(string_at(&referrer, row).as_deref()),
                    request_time: string_at(&request_time, row)
                        .and_then(|t| DateTime::parse_from_str(&t, REQUEST_TIME_FORMAT).ok()),
                }
            })
            .collect();

        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest and latest request dates seen in the log.
    pub fn timeframe(&self) -> Option<(NaiveDate, NaiveDate)> {
        let mut times = self.records.iter().filter_map(|r| r.request_time);
        let first = times.next()?;
        let (min, max) = times.fold((first, first), |(min, max), t| (min.min(t), max.max(t)));
        Some((min.date_naive(), max.date_naive()))
    }

    /// Top-level key prefixes in order of first appearance, excluding log
    /// deliveries, query-engine output and test objects.
    pub fn sections(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .map(|r| r.section.as_str())
            .filter(|s| !(s.starts_with("log") || *s == "athena" || *s == "TEST-OBJECT"))
            .filter(|s| seen.insert(*s))
            .map(str::to_string)
            .collect()
    }

    pub fn overall(&self) -> PeriodMetrics {
        analyze(self.records.iter(), false)
    }

    pub fn section(&self, name: &str) -> PeriodMetrics {
        let structured = !UNSTRUCTURED_SECTIONS.contains(&name);
        analyze(self.records.iter().filter(|r| r.section == name), structured)
    }
}

/// Overall and per-section metrics of one reporting period.
#[derive(Debug, Clone)]
pub struct UsageReport {
    pub range: DateRange,
    /// Actual first/last request dates, or the range bounds when no row
    /// carried a parseable timestamp.
    pub timeframe: (NaiveDate, NaiveDate),
    pub overall: PeriodMetrics,
    pub sections: Vec<(String, PeriodMetrics)>,
}

impl UsageReport {
    pub fn from_batch(range: DateRange, batch: &RecordBatch) -> Result<Self, ArrowError> {
        let log = AccessLog::from_batch(batch)?;
        let sections = log
            .sections()
            .into_iter()
            .map(|name| {
                let metrics = log.section(&name);
                (name, metrics)
            })
            .collect();

        Ok(Self {
            range,
            timeframe: log.timeframe().unwrap_or((range.start(), range.end())),
            overall: log.overall(),
            sections,
        })
    }
}

fn analyze<'a>(records: impl Iterator<Item = &'a AccessRecord>, structured: bool) -> PeriodMetrics {
    let rows: Vec<&AccessRecord> = records.filter(|r| !r.key.contains("meta.json")).collect();
    let downloads: Vec<&AccessRecord> = rows.iter().copied().filter(|r| r.is_download()).collect();
    let uploads: Vec<&AccessRecord> = rows.iter().copied().filter(|r| r.is_upload()).collect();

    let mut metrics = PeriodMetrics {
        total_overall_interactions_count: rows.iter().filter(|r| r.is_interaction()).count() as u64,
        total_files_downloads_count: downloads.len() as u64,
        total_unique_files_downloaded: distinct(downloads.iter().map(|r| r.key.as_str())),
        total_dataset_uploaded_count: distinct(uploads.iter().map(|r| r.key.as_str())),
        total_dataset_downloaded_size: sum_bytes(downloads.iter().map(|r| r.bytes_sent)),
        total_dataset_uploaded_size: sum_bytes(uploads.iter().map(|r| r.object_size)),
        unique_users_overall: distinct(rows.iter().filter_map(|r| r.remote_ip.as_deref())),
        unique_users_by_download: distinct(downloads.iter().filter_map(|r| r.remote_ip.as_deref())),
        popular_files_by_download: top(downloads.iter().map(|r| r.key.as_str()), TOP_FILES),
        top_referrers_by_download: top(downloads.iter().map(|r| r.referrer.as_str()), TOP_ENTRIES),
        ..PeriodMetrics::default()
    };

    if structured {
        metrics.popular_projects_by_download = top(
            downloads.iter().map(|r| key_segment(&r.key, 1)),
            TOP_ENTRIES,
        );
        metrics.popular_features_by_download = top(
            downloads.iter().map(|r| key_segment(&r.key, 2)),
            TOP_ENTRIES,
        );
        metrics.popular_fileformats_by_download =
            top(downloads.iter().map(|r| file_format(&r.key)), TOP_ENTRIES);
    }

    metrics
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> u64 {
    values.collect::<HashSet<_>>().len() as u64
}

fn sum_bytes(values: impl Iterator<Item = i64>) -> u64 {
    values.map(|v| v.max(0) as u64).sum()
}

/// Most frequent values, ties broken alphabetically.
fn top<'a>(values: impl Iterator<Item = &'a str>, limit: usize) -> Vec<RankedCount> {
    let mut counts: HashMap<&str, u64> = HashMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }

    let mut ranked: Vec<(&str, u64)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(value, count)| RankedCount {
            value: value.to_string(),
            count,
        })
        .collect()
}

/// `REST.GET.OBJECT` -> `GET`
fn method_of(operation: &str) -> String {
    operation
        .split('.')
        .nth(1)
        .unwrap_or(operation)
        .to_string()
}

fn key_segment(key: &str, index: usize) -> &str {
    key.split('/').nth(index).unwrap_or(NOT_AVAILABLE)
}

/// Export format encoded as the last `_`-separated token before the
/// extension: `TM/p1/roads_lines_shp.zip` -> `shp`.
fn file_format(key: &str) -> &str {
    if !key.contains('_') {
        return NOT_AVAILABLE;
    }
    let last = key.rsplit('_').next().unwrap_or(key);
    let stem = last.split('.').next().unwrap_or(last);
    if stem.contains('/') {
        "Other"
    } else {
        stem
    }
}

/// Host (and port) of the referrer URL, or a placeholder when the request
/// carried none.
fn referrer_host(raw: Option<&str>) -> String {
    raw.map(|r| r.trim_matches('"'))
        .and_then(|r| Url::parse(r).ok())
        .and_then(|url| {
            url.host_str().filter(|h| !h.is_empty()).map(|host| match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        })
        .unwrap_or_else(|| NO_REFERRER.to_string())
}

type StringColumn = Option<arrow::array::StringArray>;
type IntColumn = Option<arrow::array::Int64Array>;

fn string_column(batch: &RecordBatch, name: &str) -> Result<StringColumn, ArrowError> {
    batch
        .column_by_name(name)
        .map(|column| -> Result<_, ArrowError> {
            Ok(cast(column.as_ref(), &DataType::Utf8)?
                .as_string::<i32>()
                .clone())
        })
        .transpose()
}

fn int_column(batch: &RecordBatch, name: &str) -> Result<IntColumn, ArrowError> {
    batch
        .column_by_name(name)
        .map(|column| -> Result<_, ArrowError> {
            Ok(cast(column.as_ref(), &DataType::Int64)?
                .as_primitive::<Int64Type>()
                .clone())
        })
        .transpose()
}

fn string_at(column: &StringColumn, row: usize) -> Option<String> {
    column
        .as_ref()
        .filter(|c| c.is_valid(row))
        .map(|c| c.value(row).to_string())
}

fn int_at(column: &IntColumn, row: usize) -> i64 {
    column
        .as_ref()
        .filter(|c| c.is_valid(row))
        .map(|c| c.value(row))
        .unwrap_or(0)
}
