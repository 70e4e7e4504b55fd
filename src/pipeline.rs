//! One summarization run: resolve the period, query it, merge the rows into
//! the stored dataset, republish, report, notify and clean up.

use std::path::PathBuf;

use chrono::NaiveDate;
use s3logs2parquet_athena::{QueryError, QueryExecutor, QueryRequest};
use s3logs2parquet_config::RuntimeConfig;
use s3logs2parquet_core::{
    merge, render_html, render_text, resolve, DateRange, Frequency, PriorDataset, ReportContext,
    UsageReport,
};
use s3logs2parquet_writer::{ArtifactStore, PublishedArtifacts, Publisher};
use tracing::{debug, error, info, warn};

use crate::error::PipelineError;
use crate::notify::{EmailReport, Notifier};

/// Per-run switches, usually built from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub frequency: Option<Frequency>,
    pub date_range: Option<(String, String)>,
    pub select_all: bool,
    pub remove_meta: bool,
    pub remove_original_logs: bool,
    pub email: bool,
    pub verbose: bool,
}

impl RunOptions {
    /// Reporting period selected by these options.
    pub fn resolve_range(&self, today: NaiveDate) -> Result<DateRange, PipelineError> {
        let explicit = self
            .date_range
            .as_ref()
            .map(|(start, end)| (start.as_str(), end.as_str()));
        Ok(resolve(self.frequency, explicit, today)?)
    }
}

/// What a run did.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub range: DateRange,
    pub new_rows: usize,
    pub total_rows: usize,
    /// `None` when there was nothing to publish (no stored dataset and the
    /// query returned no files)
    pub published: Option<PublishedArtifacts>,
    pub metrics_uri: String,
    pub notified: bool,
}

pub struct Pipeline<'a> {
    config: &'a RuntimeConfig,
    store: &'a ArtifactStore,
    executor: &'a dyn QueryExecutor,
    logs: Option<&'a ArtifactStore>,
    notifier: Option<&'a dyn Notifier>,
    report_file: Option<PathBuf>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a RuntimeConfig,
        store: &'a ArtifactStore,
        executor: &'a dyn QueryExecutor,
    ) -> Self {
        Self {
            config,
            store,
            executor,
            logs: None,
            notifier: None,
            report_file: None,
        }
    }

    /// Store holding the raw access logs, needed for `remove_original_logs`.
    pub fn with_logs(mut self, logs: &'a ArtifactStore) -> Self {
        self.logs = Some(logs);
        self
    }

    pub fn with_notifier(mut self, notifier: &'a dyn Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Where verbose runs write the rendered report.
    pub fn with_report_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.report_file = Some(path.into());
        self
    }

    pub async fn run(&self, opts: &RunOptions, today: NaiveDate) -> Result<RunSummary, PipelineError> {
        let range = opts.resolve_range(today)?;

        if opts.email && self.notifier.is_none() {
            return Err(PipelineError::configuration(
                "--email was given but no email transport is configured",
            ));
        }
        if opts.remove_original_logs && self.logs.is_none() {
            return Err(PipelineError::configuration(
                "--remove_original_logs was given but no logs location is configured",
            ));
        }

        info!(
            start = %range.start(),
            end = %range.end(),
            days = range.num_days(),
            "resolved reporting period"
        );

        let publisher = Publisher::new(self.store, &self.config.publish);
        let prior = PriorDataset::decode(publisher.load_prior().await?)?;
        debug!(rows = prior.num_rows(), present = prior.is_present(), "stored dataset loaded");

        let result = self
            .executor
            .execute(&QueryRequest {
                range,
                select_all: opts.select_all,
            })
            .await?;
        info!(rows = result.num_rows(), "query returned");

        let combined = merge(prior, &result)?;

        let published = if combined.schema().fields().is_empty() {
            warn!("query returned no files and no dataset is stored; nothing to publish");
            None
        } else {
            Some(publisher.publish(&combined).await?)
        };

        let report = UsageReport::from_batch(range, result.batch()).map_err(|e| {
            PipelineError::QueryExecution(QueryError::Decode {
                uri: "query result".to_string(),
                reason: e.to_string(),
            })
        })?;
        let metrics_uri = publisher.store_metrics(&range, &report.overall).await?;
        let trend = publisher
            .load_trend(&range, &report.overall, self.config.publish.history_periods)
            .await?;

        let context = ReportContext {
            service_name: self.config.query.database.to_uppercase(),
            artifact_name: range.file_stem(),
            csv_link: published.as_ref().and_then(|p| p.csv_link.clone()),
            trend,
        };
        let html = render_html(&report, &context);

        if opts.verbose {
            if let Some(path) = &self.report_file {
                match std::fs::write(path, &html) {
                    Ok(()) => info!(path = %path.display(), "report written"),
                    Err(e) => warn!(path = %path.display(), error = %e, "failed to write report"),
                }
            }
        }

        let mut notified = false;
        if opts.email {
            if let Some(notifier) = self.notifier {
                let email = EmailReport {
                    subject: EmailReport::subject_for(&self.config.query.database),
                    text: render_text(&report, &context),
                    html,
                };
                match notifier.send(&email).await {
                    Ok(()) => notified = true,
                    Err(e) => {
                        let err = PipelineError::from(e);
                        error!(code = err.code().as_str(), error = %err, "report was not delivered");
                    }
                }
            }
        }

        self.cleanup(opts, &publisher).await;

        let summary = RunSummary {
            range,
            new_rows: result.num_rows(),
            total_rows: combined.num_rows(),
            published,
            metrics_uri,
            notified,
        };
        info!(
            new_rows = summary.new_rows,
            total_rows = summary.total_rows,
            notified = summary.notified,
            "run complete"
        );
        Ok(summary)
    }

    /// Remove query engine output and raw logs when asked. Failures are
    /// logged; the published artifacts are already in place.
    async fn cleanup(&self, opts: &RunOptions, publisher: &Publisher<'_>) {
        if opts.remove_meta {
            let meta = publisher.layout().meta_dir();
            match self.store.remove_all(&meta).await {
                Ok(()) => info!(uri = %self.store.uri(&meta), "query engine output removed"),
                Err(e) => warn!(error = %e, "failed to remove query engine output"),
            }
        }

        if opts.remove_original_logs {
            if let Some(logs) = self.logs {
                match logs.remove_all("").await {
                    Ok(()) => info!(uri = %logs.uri(""), "original logs removed"),
                    Err(e) => warn!(error = %e, "failed to remove original logs"),
                }
            }
        }
    }
}
