// Configuration validation
//
// Validates that required fields are present and values are sensible

use super::*;
use anyhow::{anyhow, bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_query_config(&config.query)?;
    validate_source_config(&config.source)?;
    validate_storage_config(&config.storage)?;
    validate_publish_config(&config.publish)?;
    Ok(())
}

fn validate_query_config(config: &QueryConfig) -> Result<()> {
    if config.database.is_empty() {
        bail!(
            "Athena database is required\n\n\
            How to fix:\n\
              • Environment: export ATHENA_DATABASE=s3_access_logs_db\n\
              • TOML: [query]\n              database = \"s3_access_logs_db\"\n"
        );
    }

    if config.table.is_empty() {
        bail!(
            "Athena table is required\n\n\
            How to fix:\n\
              • Environment: export ATHENA_TABLE=access_logs\n\
              • TOML: [query]\n              table = \"access_logs\"\n"
        );
    }

    if config.poll_interval_ms == 0 {
        bail!("query.poll_interval_ms must be greater than 0");
    }

    if config.timeout_secs == 0 {
        bail!("query.timeout_secs must be greater than 0");
    }

    if config.timeout_secs > 3600 {
        warn!(
            timeout_secs = config.timeout_secs,
            "query.timeout_secs is very large; a stuck query will block the run"
        );
    }

    Ok(())
}

fn validate_source_config(config: &SourceConfig) -> Result<()> {
    if config.logs_location.is_empty() {
        bail!(
            "Source logs location is required\n\n\
            How to fix:\n\
              • Environment: export S3_LOGS_LOCATION=s3://my-log-bucket/logs/\n\
              • TOML: [source]\n              logs_location = \"s3://my-log-bucket/logs/\"\n"
        );
    }

    ObjectLocation::parse(&config.logs_location)
        .map_err(|e| anyhow!("source.logs_location is invalid: {}", e))?;

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    match config.backend {
        StorageBackend::Fs => {
            let fs = config
                .fs
                .as_ref()
                .ok_or_else(|| anyhow!("fs storage backend requires 'fs' configuration"))?;

            if fs.path.is_empty() {
                bail!(
                    "Filesystem path is required\n\n\
                    How to fix:\n\
                      • Environment: export RESULT_PATH=/data/reports\n\
                      • TOML: [storage.fs]\n              path = \"/data/reports\"\n"
                );
            }
        }
        StorageBackend::S3 => {
            let s3 = config.s3.as_ref().ok_or_else(|| {
                anyhow!(
                    "Result location is required\n\n\
                    How to fix:\n\
                      • Environment: export RESULT_PATH=s3://my-bucket/reports\n\
                      • TOML: [storage.s3]\n              bucket = \"my-bucket\"\n"
                )
            })?;

            if s3.bucket.is_empty() {
                bail!(
                    "S3 bucket name is required\n\n\
                    How to fix:\n\
                      • Environment: export RESULT_PATH=s3://my-bucket/reports\n\
                      • TOML: [storage.s3]\n              bucket = \"my-bucket\"\n"
                );
            }

            if s3.region.is_empty() {
                bail!(
                    "S3 region is required\n\n\
                    How to fix:\n\
                      • Environment: export AWS_REGION=us-west-2\n\
                      • TOML: [storage.s3]\n              region = \"us-west-2\"\n"
                );
            }
        }
    }

    Ok(())
}

fn validate_publish_config(config: &PublishConfig) -> Result<()> {
    if config.dataset_name.is_empty() || config.dataset_name.contains('/') {
        bail!("publish.dataset_name must be a non-empty file stem without '/'");
    }

    // S3 SigV4 presigned URLs are capped at 7 days
    if config.presign_expiry_secs > 7 * 24 * 3600 {
        bail!("publish.presign_expiry_secs must not exceed 604800 (7 days)");
    }

    Ok(())
}

pub fn validate_email_config(config: Option<&EmailConfig>) -> Result<&EmailConfig> {
    let email = config.ok_or_else(|| {
        anyhow!(
            "Email report requested but no email configuration found\n\n\
            How to fix:\n\
              • Environment: export TARGET_EMAIL_ADDRESS, SMTP_HOST, SMTP_USERNAME,\n\
                SMTP_PASSWORD, FROM_EMAIL and REPLY_TO_EMAIL\n\
              • TOML: add an [email] section\n"
        )
    })?;

    let mut missing = Vec::new();
    if email.recipients.is_empty() {
        missing.push("TARGET_EMAIL_ADDRESS");
    }
    if email.smtp_host.is_empty() {
        missing.push("SMTP_HOST");
    }
    if email.smtp_username.is_empty() {
        missing.push("SMTP_USERNAME");
    }
    if email.smtp_password.is_empty() {
        missing.push("SMTP_PASSWORD");
    }
    if email.from.is_empty() {
        missing.push("FROM_EMAIL");
    }
    if email.reply_to.is_empty() {
        missing.push("REPLY_TO_EMAIL");
    }

    if !missing.is_empty() {
        bail!("Missing email settings: {}", missing.join(", "));
    }

    Ok(email)
}
