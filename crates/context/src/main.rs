//! DocChat terminal chat
//!
//! Loads the persisted index and answers one question per stdin line:
//! 1. Auto-merging retrieval over the leaf vectors
//! 2. Reranking of the merged context
//! 3. LLM synthesis, printed as `role> text`
//!
//! With arguments, the arguments are asked as a single question instead.

use anyhow::Context;
use docchat_common::{
    config::AppConfig, embeddings::create_embedder, llm::create_language_model, llm::GenerationParams,
    metrics, rerank::create_reranker, telemetry, StorageContext, VERSION,
};
use docchat_context::{ChatSession, Synthesizer};
use docchat_search::QueryEngine;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
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

    info!("Starting DocChat v{}", VERSION);

    let storage = StorageContext::load(&config.index.persist_dir).with_context(|| {
        format!(
            "No usable index at {} (run build-index first)",
            config.index.persist_dir.display()
        )
    })?;
    info!(
        nodes = storage.docstore.len(),
        leaves = storage.vector_store.len(),
        model = %storage.metadata.embedding_model,
        "Index loaded"
    );

    let embedder = create_embedder(&config.embedding)?;
    let reranker = create_reranker(&config.rerank)?;
    let llm = create_language_model(&config.llm)?;

    let engine = QueryEngine::from_config(&config, Arc::new(storage), embedder, reranker)?;
    let synthesizer = Synthesizer::new(llm, GenerationParams::from(&config.llm));
    info!(
        llm = synthesizer.model_name(),
        top_k = config.retrieval.similarity_top_k,
        top_n = config.rerank.top_n,
        "Chat ready"
    );

    let mut session = ChatSession::new();
    for turn in session.transcript().turns() {
        println!("{}", turn.render());
    }

    let question: Vec<String> = std::env::args().skip(1).collect();
    if !question.is_empty() {
        for turn in session.handle_turn(&question.join(" "), &engine, &synthesizer).await? {
            println!("{}", turn.render());
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        for turn in session.handle_turn(&line, &engine, &synthesizer).await? {
            println!("{}", turn.render());
        }
    }

    info!(
        session = %session.id(),
        turns = session.transcript().len(),
        "Session ended"
    );
    Ok(())
}
