//! Relative paths of every artifact under the result location.
//!
//! ```text
//! {results}/{dataset}.parquet
//! {results}/{dataset}.csv.gz
//! {results}/{year}/{YYYY_MM_DD-YYYY_MM_DD}.json
//! {results}/meta/dataset/{uuid}/...        query engine UNLOAD output
//! {results}/meta/metadata/{id}-manifest.csv
//! ```

use chrono::Datelike;
use s3logs2parquet_config::PublishConfig;
use s3logs2parquet_core::DateRange;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    results: String,
    dataset: String,
}

impl ArtifactLayout {
    pub fn new(results_prefix: &str, dataset_name: &str) -> Self {
        Self {
            results: results_prefix.trim_matches('/').to_string(),
            dataset: dataset_name.to_string(),
        }
    }

    pub fn from_config(config: &PublishConfig) -> Self {
        Self::new(&config.results_prefix, &config.dataset_name)
    }

    fn join(&self, tail: &str) -> String {
        if self.results.is_empty() {
            tail.to_string()
        } else {
            format!("{}/{}", self.results, tail)
        }
    }

    pub fn combined_parquet(&self) -> String {
        self.join(&format!("{}.parquet", self.dataset))
    }

    pub fn combined_csv(&self) -> String {
        self.join(&format!("{}.csv.gz", self.dataset))
    }

    /// Metrics JSON of a period, filed under the year the period starts in.
    pub fn metrics(&self, range: &DateRange) -> String {
        self.join(&format!("{}/{}.json", range.start().year(), range.file_stem()))
    }

    /// Directory holding query engine output; removed by `--remove_meta`.
    pub fn meta_dir(&self) -> String {
        self.join("meta/")
    }

    pub fn unload_dir(&self, run_id: &str) -> String {
        self.join(&format!("meta/dataset/{}/", run_id))
    }

    pub fn metadata_dir(&self) -> String {
        self.join("meta/metadata/")
    }

    pub fn manifest(&self, execution_id: &str) -> String {
        self.join(&format!("meta/metadata/{}-manifest.csv", execution_id))
    }
}
