//! DocChat index builder
//!
//! One-shot batch job:
//! 1. Downloads the configured PDF (or takes a local path / URL argument)
//! 2. Extracts and chunks its text into a hierarchy
//! 3. Embeds the leaves and persists the index directory

use anyhow::Context;
use docchat_common::{config::AppConfig, embeddings::create_embedder, metrics, telemetry, VERSION};
use docchat_ingestion::IngestionProcessor;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    config.validate()?;

    telemetry::init_tracing(&config.observability);
    metrics::register_metrics();

    info!("Starting DocChat index builder v{}", VERSION);

    let config = Arc::new(config);
    let embedder = create_embedder(&config.embedding)?;
    let processor = IngestionProcessor::new(config.clone(), embedder)?;

    // Optional argument: a local PDF or a URL overriding source.url
    let summary = match std::env::args().nth(1) {
        Some(arg) if PathBuf::from(&arg).is_file() => processor.process_local_pdf(&PathBuf::from(arg)).await,
        Some(locator) => processor.process_source(&locator).await,
        None => processor.process_source(&config.source.url).await,
    }
    .map_err(|e| {
        tracing::error!(error = %e, code = e.code().as_code(), "Index build failed");
        e
    })?;

    info!(
        dir = %summary.persist_dir.display(),
        nodes = summary.node_count,
        leaves = summary.leaf_count,
        "Index ready"
    );
    println!(
        "Indexed {} chunks ({} leaves) into {}",
        summary.node_count,
        summary.leaf_count,
        summary.persist_dir.display()
    );

    Ok(())
}
