// s3logs2parquet - periodic summary of S3 server access logs
//
// Resolves a reporting period, queries the access-log table through Athena,
// merges the rows into the consolidated dataset stored next to the results,
// republishes it as Parquet and gzip CSV and optionally emails a usage report.

pub mod cli;
mod error;
mod init;
pub mod notify;
mod pipeline;

use anyhow::{Context, Result};
use s3logs2parquet_athena::AthenaExecutor;
use s3logs2parquet_config::{ObjectLocation, RuntimeConfig};
use s3logs2parquet_writer::ArtifactStore;
use tracing::info;

pub use cli::Cli;
pub use error::{ErrorCode, PipelineError};
pub use init::init_tracing;
pub use notify::{EmailReport, Notifier, NotifyError, SmtpNotifier};
pub use pipeline::{Pipeline, RunOptions, RunSummary};

/// Report written by `--verbose` runs, relative to the working directory
pub const REPORT_FILE: &str = "email_response.html";

/// Load configuration, build the production collaborators and run once.
pub async fn run(cli: Cli) -> Result<RunSummary> {
    let config = match &cli.config {
        Some(path) => RuntimeConfig::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => RuntimeConfig::load().context("Failed to load configuration"),
    }
    .map_err(|e| PipelineError::configuration(format!("{:#}", e)))?;

    init_tracing(&config.log, cli.verbose);
    let opts = cli.run_options();
    let today = chrono::Local::now().date_naive();

    // Reject bad period arguments before any AWS client is built
    opts.resolve_range(today)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        database = %config.query.database,
        table = %config.query.table,
        "s3logs2parquet starting"
    );

    let store = ArtifactStore::from_config(&config.storage).map_err(PipelineError::from)?;

    let logs = if opts.remove_original_logs {
        let location = ObjectLocation::parse(&config.source.logs_location)
            .map_err(|e| PipelineError::configuration(format!("{:#}", e)))?;
        Some(ArtifactStore::for_location(&location, &config.storage).map_err(PipelineError::from)?)
    } else {
        None
    };

    let notifier = if opts.email {
        Some(email_notifier(&config)?)
    } else {
        None
    };

    let executor = AthenaExecutor::from_env(&config, store.clone())
        .await
        .map_err(PipelineError::from)?;

    let mut pipeline = Pipeline::new(&config, &store, &executor).with_report_file(REPORT_FILE);
    if let Some(logs) = &logs {
        pipeline = pipeline.with_logs(logs);
    }
    if let Some(notifier) = &notifier {
        pipeline = pipeline.with_notifier(notifier);
    }

    Ok(pipeline.run(&opts, today).await?)
}

/// SMTP notifier for `--email` runs. Missing settings, malformed addresses
/// and an unusable relay host are configuration errors.
pub fn email_notifier(config: &RuntimeConfig) -> Result<SmtpNotifier, PipelineError> {
    let email = config
        .validate_email()
        .map_err(|e| PipelineError::configuration(format!("{:#}", e)))?;
    SmtpNotifier::from_config(email).map_err(PipelineError::configuration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use s3logs2parquet_config::EmailConfig;

    fn config_with(email: EmailConfig) -> RuntimeConfig {
        RuntimeConfig {
            email: Some(email),
            ..RuntimeConfig::default()
        }
    }

    fn email() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.org".to_string(),
            smtp_username: "mailer".to_string(),
            smtp_password: "secret".to_string(),
            from: "bot@example.org".to_string(),
            reply_to: "team@example.org".to_string(),
            recipients: vec!["a@example.org".to_string()],
            ..EmailConfig::default()
        }
    }

    #[tokio::test]
    async fn email_notifier_builds_from_valid_settings() {
        assert!(email_notifier(&config_with(email())).is_ok());
    }

    #[tokio::test]
    async fn bad_recipient_is_a_configuration_error() {
        let mut email = email();
        email.recipients = vec!["not an address".to_string()];
        let err = email_notifier(&config_with(email)).err().unwrap();
        assert_eq!(err.code(), ErrorCode::E001Configuration);
        assert!(err.to_string().contains("not an address"));
    }

    #[tokio::test]
    async fn bad_sender_is_a_configuration_error() {
        let mut email = email();
        email.from = "bot at example".to_string();
        let err = email_notifier(&config_with(email)).err().unwrap();
        assert_eq!(err.code(), ErrorCode::E001Configuration);
    }

    #[tokio::test]
    async fn missing_email_section_is_a_configuration_error() {
        let err = email_notifier(&RuntimeConfig::default()).err().unwrap();
        assert_eq!(err.code(), ErrorCode::E001Configuration);
    }
}
