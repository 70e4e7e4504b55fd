// s3logs2parquet-config - Unified configuration for the log summary pipeline
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from S3LOGS2PARQUET_CONFIG env var
// 3. Config file contents from S3LOGS2PARQUET_CONFIG_CONTENT env var
// 4. Default config file locations (./config.toml, ./.s3logs2parquet.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

mod env_overrides;
mod location;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use location::ObjectLocation;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub source: SourceConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub publish: PublishConfig,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailConfig>,

    #[serde(default)]
    pub log: LogConfig,
}

/// Query engine (Athena) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    pub database: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workgroup: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub poll_interval_ms: u64,
    pub timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            database: String::new(),
            table: String::new(),
            workgroup: None,
            region: None,
            poll_interval_ms: 1_000,
            timeout_secs: 300,
        }
    }
}

/// Location of the raw S3 server access logs the table is built on
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    pub logs_location: String,
}

/// Storage backend configuration for published results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<FsConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3: Option<S3Config>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            fs: None,
            s3: None,
        }
    }
}

impl StorageConfig {
    /// Apply a `RESULT_PATH` style location (`s3://bucket/prefix` or a local directory).
    pub fn apply_location(&mut self, location: ObjectLocation) {
        match location {
            ObjectLocation::S3 { bucket, prefix } => {
                self.backend = StorageBackend::S3;
                let s3 = self.s3.get_or_insert_with(S3Config::default);
                s3.bucket = bucket;
                s3.prefix = prefix;
            }
            ObjectLocation::Local(path) => {
                self.backend = StorageBackend::Fs;
                self.fs = Some(FsConfig { path });
            }
        }
    }

    /// Region shared by every S3 operator built from this config.
    pub fn region(&self) -> Option<&str> {
        self.s3.as_ref().map(|s3| s3.region.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Fs,
    S3,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::Fs => write!(f, "fs"),
            StorageBackend::S3 => write!(f, "s3"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            "s3" | "aws" => Ok(StorageBackend::S3),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: fs, s3", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsConfig {
    pub path: String,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            path: "./data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Optional path prefix for all stored files (e.g., "reports/")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            prefix: None,
        }
    }
}

/// Layout of the published artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Directory (relative to the storage root) holding every artifact
    pub results_prefix: String,
    /// File stem of the combined dataset (`<stem>.parquet`, `<stem>.csv.gz`)
    pub dataset_name: String,
    /// Lifetime of the presigned CSV link included in the report
    pub presign_expiry_secs: u64,
    /// Number of previous monthly periods shown in the report trend
    pub history_periods: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            results_prefix: "athena/results".to_string(),
            dataset_name: "combined".to_string(),
            presign_expiry_secs: 7 * 24 * 3600,
            history_periods: 5,
        }
    }
}

/// SMTP settings, required only when the email report is requested
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from: String,
    pub reply_to: String,
    pub recipients: Vec<String>,
}

fn default_smtp_port() -> u16 {
    587
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            smtp_username: String::new(),
            smtp_password: String::new(),
            from: String::new(),
            reply_to: String::new(),
            recipients: Vec::new(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            query: QueryConfig::default(),
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            publish: PublishConfig::default(),
            email: None,
            log: LogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.query = other.query;
        self.source = other.source;
        self.storage = other.storage;
        self.publish = other.publish;
        self.log = other.log;

        if other.email.is_some() {
            self.email = other.email;
        }
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration using inline config content plus overrides
    /// supplied by an `EnvSource`. Used by tests and embedders that do not
    /// want the host environment to leak in.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = RuntimeConfig::default();

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }

    /// Validate the email section; only called when the report is requested.
    pub fn validate_email(&self) -> Result<&EmailConfig> {
        validation::validate_email_config(self.email.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_backend_from_str() {
        assert_eq!("fs".parse::<StorageBackend>().unwrap(), StorageBackend::Fs);
        assert_eq!("s3".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert_eq!(
            "filesystem".parse::<StorageBackend>().unwrap(),
            StorageBackend::Fs
        );
        assert_eq!("aws".parse::<StorageBackend>().unwrap(), StorageBackend::S3);
        assert!("r2".parse::<StorageBackend>().is_err());
    }

    #[test]
    fn test_default_configs() {
        let publish = PublishConfig::default();
        assert_eq!(publish.results_prefix, "athena/results");
        assert_eq!(publish.presign_expiry_secs, 604_800);

        let query = QueryConfig::default();
        assert_eq!(query.poll_interval_ms, 1_000);

        assert_eq!(LogConfig::default().format, LogFormat::Text);
        assert_eq!(default_smtp_port(), 587);
    }

    #[test]
    fn apply_location_switches_backend() {
        let mut storage = StorageConfig::default();
        storage.apply_location(ObjectLocation::Local("/tmp/out".to_string()));
        assert_eq!(storage.backend, StorageBackend::Fs);
        assert_eq!(storage.fs.as_ref().unwrap().path, "/tmp/out");

        storage.apply_location(ObjectLocation::S3 {
            bucket: "logs".to_string(),
            prefix: Some("reports/".to_string()),
        });
        assert_eq!(storage.backend, StorageBackend::S3);
        let s3 = storage.s3.as_ref().unwrap();
        assert_eq!(s3.bucket, "logs");
        assert_eq!(s3.prefix.as_deref(), Some("reports/"));
        assert_eq!(s3.region, "us-east-1");
    }

    #[test]
    fn toml_round_trip_keeps_sections() {
        let content = r#"
            [query]
            database = "logs_db"
            table = "access_logs"
            poll_interval_ms = 500
            timeout_secs = 60

            [source]
            logs_location = "s3://raw-logs/access/"

            [storage]
            backend = "s3"

            [storage.s3]
            bucket = "results"
            region = "eu-west-1"
        "#;

        let config: RuntimeConfig = toml::from_str(content).unwrap();
        assert_eq!(config.query.database, "logs_db");
        assert_eq!(config.query.timeout_secs, 60);
        assert_eq!(config.storage.region(), Some("eu-west-1"));
        assert_eq!(config.publish.dataset_name, "combined");
        assert!(config.email.is_none());
    }
}
