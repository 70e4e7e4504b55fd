//! Publishing of the combined dataset and per-period metrics.

use std::time::Duration;

use bytes::Bytes;
use s3logs2parquet_config::PublishConfig;
use s3logs2parquet_core::report::{HistoricalMetrics, TrendPoint};
use s3logs2parquet_core::{encode_csv_gz, encode_parquet, Blake3Hash, CombinedDataset, DateRange, PeriodMetrics};
use tracing::{debug, info, warn};

use crate::layout::ArtifactLayout;
use crate::storage::ArtifactStore;
use crate::{Result, WriterError};

/// What a successful publish wrote.
#[derive(Debug, Clone)]
pub struct PublishedArtifacts {
    pub parquet_uri: String,
    pub csv_uri: String,
    pub parquet_hash: Blake3Hash,
    pub row_count: i64,
    /// Presigned download link for the CSV, when the backend supports it
    pub csv_link: Option<String>,
}

pub struct Publisher<'a> {
    store: &'a ArtifactStore,
    layout: ArtifactLayout,
    presign_expiry: Duration,
}

impl<'a> Publisher<'a> {
    pub fn new(store: &'a ArtifactStore, config: &PublishConfig) -> Self {
        Self {
            store,
            layout: ArtifactLayout::from_config(config),
            presign_expiry: Duration::from_secs(config.presign_expiry_secs),
        }
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    /// Raw bytes of the stored combined dataset, `None` on the first run.
    pub async fn load_prior(&self) -> Result<Option<Bytes>> {
        let path = self.layout.combined_parquet();
        let bytes = self.store.read_optional(&path).await?;
        match &bytes {
            Some(b) => debug!(path = %path, size = b.len(), "stored dataset found"),
            None => info!(path = %path, "no stored dataset; starting a new one"),
        }
        Ok(bytes)
    }

    /// Overwrite the combined Parquet and CSV artifacts.
    ///
    /// Both encodings are produced before anything is written, so an
    /// encoding failure leaves the stored artifacts untouched.
    pub async fn publish(&self, dataset: &CombinedDataset) -> Result<PublishedArtifacts> {
        let parquet = encode_parquet(dataset.batch())
            .map_err(|e| WriterError::encode_failure("parquet", format!("{:#}", e)))?;
        let csv = encode_csv_gz(dataset.batch())
            .map_err(|e| WriterError::encode_failure("csv", format!("{:#}", e)))?;

        let parquet_path = self.layout.combined_parquet();
        let csv_path = self.layout.combined_csv();
        let parquet_size = parquet.bytes.len();
        let csv_size = csv.len();

        self.store.write(&parquet_path, parquet.bytes).await?;
        self.store.write(&csv_path, csv).await?;

        info!(
            parquet = %self.store.uri(&parquet_path),
            csv = %self.store.uri(&csv_path),
            rows = parquet.row_count,
            parquet_size,
            csv_size,
            hash = %parquet.hash,
            "published combined dataset"
        );

        let csv_link = self
            .store
            .presign_read(&csv_path, self.presign_expiry)
            .await?;

        Ok(PublishedArtifacts {
            parquet_uri: self.store.uri(&parquet_path),
            csv_uri: self.store.uri(&csv_path),
            parquet_hash: parquet.hash,
            row_count: parquet.row_count,
            csv_link,
        })
    }

    /// Store the overall metrics of `range`.
    pub async fn store_metrics(&self, range: &DateRange, metrics: &PeriodMetrics) -> Result<String> {
        let path = self.layout.metrics(range);
        let json = serde_json::to_vec(metrics)
            .map_err(|e| WriterError::encode_failure("metrics", e))?;
        self.store.write(&path, json).await?;
        let uri = self.store.uri(&path);
        info!(uri = %uri, "stored period metrics");
        Ok(uri)
    }

    /// Downloads/users trend over the `periods` months preceding `range`,
    /// oldest first, ending with `current`. Months whose metrics file is
    /// missing, fails to load or does not parse are skipped.
    pub async fn load_trend(
        &self,
        range: &DateRange,
        current: &PeriodMetrics,
        periods: usize,
    ) -> Result<Vec<TrendPoint>> {
        let mut points = Vec::with_capacity(periods + 1);

        for month in range.preceding_months(periods).into_iter().rev() {
            let path = self.layout.metrics(&month);
            let bytes = match self.store.read_optional(&path).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => {
                    debug!(path = %path, "no metrics for period");
                    continue;
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping metrics file that failed to load");
                    continue;
                }
            };

            match serde_json::from_slice::<HistoricalMetrics>(&bytes) {
                Ok(history) => points.push(TrendPoint {
                    label: month.file_stem(),
                    downloads: history.total_files_downloads_count,
                    unique_users: history.unique_users_overall,
                }),
                Err(e) => warn!(path = %path, error = %e, "skipping unreadable metrics file"),
            }
        }

        points.push(TrendPoint {
            label: range.file_stem(),
            downloads: current.total_files_downloads_count,
            unique_users: current.unique_users_overall,
        });

        Ok(points)
    }
}
