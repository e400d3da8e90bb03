use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use stock_metadata_gen::{
    config::AppConfig,
    services::{
        batch::BatchRun,
        credentials::CredentialPool,
        dispatcher::{DispatchError, Dispatcher},
        export::{write_csv, EXPORT_FILE_NAME},
        gemini::GeminiClientFactory,
        upload::item_from_path,
    },
};
use tracing_subscriber::EnvFilter;

const OUTPUT_ENV: &str = "OUTPUT_CSV";

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = AppConfig::from_env().expect("Failed to load configuration");

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("Usage: batch <file>... (keys in GEMINI_API_KEYS, output in {})", OUTPUT_ENV);
        return ExitCode::from(2);
    }

    let mut items = Vec::with_capacity(paths.len());
    for (index, path) in paths.iter().enumerate() {
        match item_from_path(index, path) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Skipping file");
            }
        }
    }

    let run = match BatchRun::new(items) {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(error = %e, "Failed to build batch");
            return ExitCode::FAILURE;
        }
    };

    let clients = Arc::new(GeminiClientFactory::new(
        &config.gemini_base_url,
        &config.gemini_model,
    ));
    let pool = Arc::new(CredentialPool::new(config.api_keys(), clients));
    let dispatcher = Dispatcher::with_max_concurrency(config.max_concurrency);
    let settings = match config.validated_settings() {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!(error = %e, "Invalid generation settings");
            return ExitCode::FAILURE;
        }
    };

    let item_count = run.store.len().await;
    tracing::info!(
        batch_id = %run.id,
        items = item_count,
        keys = pool.len(),
        max_rounds = config.max_rounds,
        "Starting batch"
    );

    // Each round retries whatever the previous one left failed.
    for round in 1..=config.max_rounds.max(1) {
        match dispatcher.dispatch(run.store.clone(), pool.clone(), &settings).await {
            Ok(report) => {
                tracing::info!(
                    round,
                    launched = report.launched,
                    succeeded = report.succeeded,
                    failed = report.failed,
                    progress = report.summary.progress_percent(),
                    "Round finished"
                );
                if report.all_succeeded() {
                    break;
                }
            }
            Err(DispatchError::NothingToProcess) => break,
            Err(e @ DispatchError::NoCredentials) => {
                tracing::error!(error = %e, "Cannot start batch");
                return ExitCode::FAILURE;
            }
        }
    }

    for (credential, count) in pool.issue_counts().await {
        tracing::debug!(credential = %credential, issued = count, "Key usage");
    }

    if !run.store.is_complete().await {
        for record in run.store.list().await {
            if let Some(error) = record.state.error() {
                tracing::warn!(item_id = %record.item.id, error = %error, "Item still failed");
            }
        }
        tracing::error!("Batch incomplete; export skipped");
        return ExitCode::FAILURE;
    }

    let output = std::env::var_os(OUTPUT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(EXPORT_FILE_NAME));

    match write_csv(&run.store, &output).await {
        Ok(bytes) => {
            tracing::info!(path = %output.display(), bytes, "All metadata generated successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(path = %output.display(), error = %e, "Export failed");
            ExitCode::FAILURE
        }
    }
}
