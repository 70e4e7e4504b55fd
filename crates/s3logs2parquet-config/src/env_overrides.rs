use super::{EmailConfig, FsConfig, LogFormat, ObjectLocation, RuntimeConfig, StorageBackend};
use anyhow::{anyhow, Context, Result};

pub const ENV_PREFIX: &str = "S3LOGS2PARQUET_";

/// Abstraction over environment-variable lookups so tests can supply their
/// own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the S3LOGS2PARQUET_ prefix.
    /// Used for the established deployment variables (ATHENA_DATABASE,
    /// RESULT_PATH, SMTP_HOST, ...) and AWS standard variables.
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Query engine
    if let Some(database) = get_raw_env_string(env, "ATHENA_DATABASE")? {
        config.query.database = database;
    }
    if let Some(table) = get_raw_env_string(env, "ATHENA_TABLE")? {
        config.query.table = table;
    }
    if let Some(workgroup) = get_env_string(env, "ATHENA_WORKGROUP")? {
        config.query.workgroup = Some(workgroup);
    }
    if let Some(region) = get_raw_env_string(env, "AWS_REGION")? {
        config.query.region = Some(region.clone());
        if let Some(s3) = config.storage.s3.as_mut() {
            s3.region = region;
        }
    }
    if let Some(val) = get_env_u64(env, "QUERY_POLL_INTERVAL_MS")? {
        config.query.poll_interval_ms = val;
    }
    if let Some(val) = get_env_u64(env, "QUERY_TIMEOUT_SECS")? {
        config.query.timeout_secs = val;
    }

    // Source logs
    if let Some(location) = get_raw_env_string(env, "S3_LOGS_LOCATION")? {
        config.source.logs_location = location;
    }

    // Result storage
    if let Some(backend) = get_env_string(env, "STORAGE_BACKEND")? {
        config.storage.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid S3LOGS2PARQUET_STORAGE_BACKEND value")?;
    }
    if let Some(path) = get_env_string(env, "STORAGE_PATH")? {
        config.storage.fs.get_or_insert_with(FsConfig::default).path = path;
    }
    if let Some(result_path) = get_raw_env_string(env, "RESULT_PATH")? {
        let location = ObjectLocation::parse(&result_path).context("Invalid RESULT_PATH value")?;
        config.storage.apply_location(location);
        if let (Some(region), Some(s3)) = (
            config.query.region.clone(),
            config.storage.s3.as_mut(),
        ) {
            s3.region = region;
        }
    }
    if let Some(endpoint) = get_raw_env_string(env, "AWS_ENDPOINT_URL")? {
        if let Some(s3) = config.storage.s3.as_mut() {
            s3.endpoint = Some(endpoint);
        }
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        config.log.format = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
    }

    // Email
    if let Some(recipients) = get_raw_env_string(env, "TARGET_EMAIL_ADDRESS")? {
        ensure_email(config).recipients = split_recipients(&recipients);
    }
    if let Some(host) = get_raw_env_string(env, "SMTP_HOST")? {
        ensure_email(config).smtp_host = host;
    }
    if let Some(port) = get_raw_env_string(env, "SMTP_PORT")? {
        ensure_email(config).smtp_port = port
            .parse::<u16>()
            .map_err(|e| anyhow!("Failed to parse SMTP_PORT: {}", e))?;
    }
    if let Some(username) = get_raw_env_string(env, "SMTP_USERNAME")? {
        ensure_email(config).smtp_username = username;
    }
    if let Some(password) = get_raw_env_string(env, "SMTP_PASSWORD")? {
        ensure_email(config).smtp_password = password;
    }
    if let Some(from) = get_raw_env_string(env, "FROM_EMAIL")? {
        ensure_email(config).from = from;
    }
    if let Some(reply_to) = get_raw_env_string(env, "REPLY_TO_EMAIL")? {
        ensure_email(config).reply_to = reply_to;
    }

    Ok(())
}

fn ensure_email(config: &mut RuntimeConfig) -> &mut EmailConfig {
    config.email.get_or_insert_with(EmailConfig::default)
}

fn split_recipients(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the S3LOGS2PARQUET_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<String, String>);

    impl MapEnv {
        fn new(pairs: &[(&str, &str)]) -> Self {
            Self(
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            )
        }
    }

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(&format!("{}{}", ENV_PREFIX, key)).cloned()
        }

        fn get_raw(&self, key: &str) -> Option<String> {
            self.0.get(key).cloned()
        }
    }

    #[test]
    fn deployment_variables_populate_config() {
        let env = MapEnv::new(&[
            ("ATHENA_DATABASE", "s3_access_logs_db"),
            ("ATHENA_TABLE", "raw_data_api_logs"),
            ("S3_LOGS_LOCATION", "s3://raw-logs/logs/"),
            ("RESULT_PATH", "s3://results-bucket/usage"),
            ("AWS_REGION", "us-west-2"),
        ]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.query.database, "s3_access_logs_db");
        assert_eq!(config.query.table, "raw_data_api_logs");
        assert_eq!(config.source.logs_location, "s3://raw-logs/logs/");
        assert_eq!(config.storage.backend, StorageBackend::S3);
        let s3 = config.storage.s3.as_ref().unwrap();
        assert_eq!(s3.bucket, "results-bucket");
        assert_eq!(s3.prefix.as_deref(), Some("usage/"));
        assert_eq!(s3.region, "us-west-2");
        assert!(config.email.is_none());
    }

    #[test]
    fn email_variables_build_email_section() {
        let env = MapEnv::new(&[
            ("TARGET_EMAIL_ADDRESS", "a@example.org, b@example.org,"),
            ("SMTP_HOST", "smtp.example.org"),
            ("SMTP_PORT", "2525"),
            ("FROM_EMAIL", "reports@example.org"),
        ]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        let email = config.email.unwrap();
        assert_eq!(email.recipients, vec!["a@example.org", "b@example.org"]);
        assert_eq!(email.smtp_host, "smtp.example.org");
        assert_eq!(email.smtp_port, 2525);
        assert_eq!(email.from, "reports@example.org");
    }

    #[test]
    fn prefixed_knobs_are_parsed() {
        let env = MapEnv::new(&[
            ("S3LOGS2PARQUET_LOG_LEVEL", "debug"),
            ("S3LOGS2PARQUET_LOG_FORMAT", "JSON"),
            ("S3LOGS2PARQUET_QUERY_TIMEOUT_SECS", "42"),
            ("S3LOGS2PARQUET_ATHENA_WORKGROUP", "analytics"),
        ]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.query.timeout_secs, 42);
        assert_eq!(config.query.workgroup.as_deref(), Some("analytics"));
    }

    #[test]
    fn invalid_numbers_fail() {
        let env = MapEnv::new(&[("S3LOGS2PARQUET_QUERY_TIMEOUT_SECS", "soon")]);
        let mut config = RuntimeConfig::default();
        assert!(apply_env_overrides(&mut config, &env).is_err());

        let env = MapEnv::new(&[("SMTP_PORT", "smtp")]);
        assert!(apply_env_overrides(&mut config, &env).is_err());
    }

    #[test]
    fn local_result_path_uses_fs_backend() {
        let env = MapEnv::new(&[("RESULT_PATH", "./reports")]);
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.fs.unwrap().path, "./reports");
    }
}
