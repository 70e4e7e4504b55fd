// Configuration source loading.
//
// Priority order:
// 1. Environment variables (deployment names + S3LOGS2PARQUET_* prefix)
// 2. Config file path from S3LOGS2PARQUET_CONFIG
// 3. Inline config content from S3LOGS2PARQUET_CONFIG_CONTENT
// 4. Default config files (./config.toml, ./.s3logs2parquet.toml)
// 5. Built-in defaults

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::default();

    if let Some(file_config) = load_from_file()? {
        config.merge(file_config);
    }

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_toml(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from S3LOGS2PARQUET_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in &["./config.toml", "./.s3logs2parquet.toml"] {
        let path = Path::new(path);
        if path.exists() {
            return read_toml(path).map(Some);
        }
    }

    Ok(None)
}

/// Load configuration from a specific file path (for the CLI --config flag).
/// Returns error if the file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let file_config = read_toml(path.as_ref())?;

    let mut config = RuntimeConfig::default();
    config.merge(file_config);

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn read_toml(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_explicit_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [query]
            database = "db"
            table = "logs"
            poll_interval_ms = 250
            timeout_secs = 30

            [storage]
            backend = "fs"

            [storage.fs]
            path = "/tmp/s3logs2parquet"
            "#
        )
        .unwrap();

        let config = read_toml(file.path()).unwrap();
        assert_eq!(config.query.table, "logs");
        assert_eq!(config.storage.fs.unwrap().path, "/tmp/s3logs2parquet");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_toml(Path::new("/nonexistent/s3logs2parquet.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
