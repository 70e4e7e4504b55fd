//! Athena-backed query execution
//!
//! The query is wrapped in an `UNLOAD` so Athena writes its rows as Parquet
//! into a fresh directory under the result prefix. When the execution
//! succeeds, the data manifest Athena writes next to its metadata lists
//! every produced file. Each file is read through the result store and
//! decoded, and the batches are concatenated into a single result set.

use std::sync::Arc;
use std::time::{Duration, Instant};

use arrow::datatypes::Schema;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_athena::error::DisplayErrorContext;
use aws_sdk_athena::types::{QueryExecutionContext, QueryExecutionState, ResultConfiguration};
use s3logs2parquet_config::RuntimeConfig;
use s3logs2parquet_core::{decode_parquet, ResultSet};
use s3logs2parquet_writer::{ArtifactLayout, ArtifactStore};
use tracing::{debug, info, instrument, warn};

use crate::error::{QueryError, Result};
use crate::executor::{QueryExecutor, QueryRequest};
use crate::sql::{fetch_query, unload_query};

/// State of a submitted query execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionStatus {
    Queued,
    Running,
    Succeeded,
    Failed(String),
    Cancelled(String),
}

/// The two Athena calls the executor needs.
#[async_trait]
pub trait AthenaApi: Send + Sync {
    /// Submit `sql` and return the execution id.
    async fn start(
        &self,
        sql: &str,
        database: &str,
        workgroup: Option<&str>,
        output_location: &str,
    ) -> Result<String>;

    async fn status(&self, execution_id: &str) -> Result<ExecutionStatus>;
}

/// [`AthenaApi`] over the AWS SDK client.
pub struct SdkAthenaApi {
    client: aws_sdk_athena::Client,
}

impl SdkAthenaApi {
    /// Load credentials from the environment, optionally pinning the region.
    pub async fn from_env(region: Option<&str>) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(Region::new(region.to_string()));
        }
        let config = loader.load().await;
        Self {
            client: aws_sdk_athena::Client::new(&config),
        }
    }
}

#[async_trait]
impl AthenaApi for SdkAthenaApi {
    async fn start(
        &self,
        sql: &str,
        database: &str,
        workgroup: Option<&str>,
        output_location: &str,
    ) -> Result<String> {
        let output = self
            .client
            .start_query_execution()
            .query_string(sql)
            .query_execution_context(QueryExecutionContext::builder().database(database).build())
            .result_configuration(
                ResultConfiguration::builder()
                    .output_location(output_location)
                    .build(),
            )
            .set_work_group(workgroup.map(str::to_string))
            .send()
            .await
            .map_err(|e| QueryError::Start(DisplayErrorContext(&e).to_string()))?;

        output
            .query_execution_id()
            .map(str::to_string)
            .ok_or_else(|| QueryError::Start("response carried no execution id".to_string()))
    }

    async fn status(&self, execution_id: &str) -> Result<ExecutionStatus> {
        let output = self
            .client
            .get_query_execution()
            .query_execution_id(execution_id)
            .send()
            .await
            .map_err(|e| QueryError::Service(DisplayErrorContext(&e).to_string()))?;

        let status = output.query_execution().and_then(|q| q.status());
        let reason = status
            .and_then(|s| s.state_change_reason())
            .unwrap_or("no reason given")
            .to_string();

        Ok(match status.and_then(|s| s.state()) {
            Some(QueryExecutionState::Succeeded) => ExecutionStatus::Succeeded,
            Some(QueryExecutionState::Failed) => ExecutionStatus::Failed(reason),
            Some(QueryExecutionState::Cancelled) => ExecutionStatus::Cancelled(reason),
            Some(QueryExecutionState::Running) => ExecutionStatus::Running,
            // queued, or a state this SDK version does not know yet
            _ => ExecutionStatus::Queued,
        })
    }
}

/// Runs the access-log query on Athena and collects its unloaded rows.
pub struct AthenaExecutor<A> {
    api: A,
    store: ArtifactStore,
    layout: ArtifactLayout,
    database: String,
    table: String,
    workgroup: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl AthenaExecutor<SdkAthenaApi> {
    /// Executor using the AWS SDK with credentials from the environment.
    pub async fn from_env(config: &RuntimeConfig, store: ArtifactStore) -> Result<Self> {
        let region = config.query.region.as_deref().or(config.storage.region());
        let api = SdkAthenaApi::from_env(region).await;
        Self::from_config(api, config, store)
    }
}

impl<A: AthenaApi> AthenaExecutor<A> {
    /// The store must be S3-backed: Athena can only unload into a bucket.
    pub fn from_config(api: A, config: &RuntimeConfig, store: ArtifactStore) -> Result<Self> {
        if store.bucket().is_none() {
            return Err(QueryError::InvalidConfig(
                "Athena results need an S3 result store; set storage.backend = \"s3\"".to_string(),
            ));
        }

        Ok(Self {
            api,
            store,
            layout: ArtifactLayout::from_config(&config.publish),
            database: config.query.database.clone(),
            table: config.query.table.clone(),
            workgroup: config.query.workgroup.clone(),
            poll_interval: Duration::from_millis(config.query.poll_interval_ms),
            timeout: Duration::from_secs(config.query.timeout_secs),
        })
    }

    /// Override polling, mostly useful to keep tests fast.
    pub fn with_polling(mut self, interval: Duration, timeout: Duration) -> Self {
        self.poll_interval = interval;
        self.timeout = timeout;
        self
    }

    async fn wait_for(&self, execution_id: &str) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.api.status(execution_id).await? {
                ExecutionStatus::Succeeded => {
                    info!(
                        execution_id,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "query succeeded"
                    );
                    return Ok(());
                }
                ExecutionStatus::Failed(reason) => {
                    return Err(QueryError::Failed {
                        execution_id: execution_id.to_string(),
                        state: "FAILED".to_string(),
                        reason,
                    })
                }
                ExecutionStatus::Cancelled(reason) => {
                    return Err(QueryError::Failed {
                        execution_id: execution_id.to_string(),
                        state: "CANCELLED".to_string(),
                        reason,
                    })
                }
                state @ (ExecutionStatus::Queued | ExecutionStatus::Running) => {
                    debug!(execution_id, ?state, "query still in progress");
                }
            }

            if started.elapsed() >= self.timeout {
                return Err(QueryError::Timeout {
                    execution_id: execution_id.to_string(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Read the data manifest of `execution_id` and decode every file it lists.
    async fn collect(&self, execution_id: &str, request: &QueryRequest) -> Result<ResultSet> {
        let manifest = self.store.read(&self.layout.manifest(execution_id)).await?;
        let manifest = String::from_utf8_lossy(&manifest);

        let mut batches = Vec::new();
        for uri in manifest.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let bytes = self.store.read_uri(uri).await?;
            let batch = decode_parquet(bytes).map_err(|e| QueryError::Decode {
                uri: uri.to_string(),
                reason: format!("{:#}", e),
            })?;
            debug!(uri, rows = batch.num_rows(), "result file decoded");
            batches.push(batch);
        }

        let schema = batches
            .first()
            .map(|b| b.schema())
            .unwrap_or_else(|| Arc::new(Schema::empty()));
        if batches.is_empty() {
            warn!(execution_id, "query produced no result files");
        }

        ResultSet::new(request.range, schema, &batches).map_err(|e| QueryError::Decode {
            uri: self.store.uri(&self.layout.manifest(execution_id)),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl<A: AthenaApi> QueryExecutor for AthenaExecutor<A> {
    #[instrument(skip(self), fields(database = %self.database, table = %self.table))]
    async fn execute(&self, request: &QueryRequest) -> Result<ResultSet> {
        let run_id = uuid::Uuid::new_v4().simple().to_string();
        let destination = self.store.uri(&self.layout.unload_dir(&run_id));
        let output_location = self.store.uri(&self.layout.metadata_dir());

        let sql = unload_query(
            &fetch_query(&self.database, &self.table, &request.range, request.select_all),
            &destination,
        );
        debug!(sql = %sql, "submitting query");

        let execution_id = self
            .api
            .start(&sql, &self.database, self.workgroup.as_deref(), &output_location)
            .await?;
        info!(execution_id = %execution_id, destination = %destination, "query started");

        self.wait_for(&execution_id).await?;

        let result = self.collect(&execution_id, request).await?;
        info!(
            execution_id = %execution_id,
            rows = result.num_rows(),
            columns = result.schema().fields().len(),
            "query results collected"
        );
        Ok(result)
    }
}
