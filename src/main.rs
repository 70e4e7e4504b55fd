use anyhow::{Context, Result};
use clap::Parser;
use s3logs2parquet::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // One run, one request at a time; a current-thread runtime is enough
    let summary = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(s3logs2parquet::run(cli))?;

    if let Some(published) = &summary.published {
        println!("{}", published.parquet_uri);
        println!("{}", published.csv_uri);
    }
    Ok(())
}
