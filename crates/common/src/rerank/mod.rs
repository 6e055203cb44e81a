//! Rerank model clients
//!
//! A reranker scores (query, passage) pairs with a cross-encoder style model.
//! The scores are returned in input order; sorting and truncation happen in the
//! search crate's postprocessor.

use crate::config::RerankConfig;
use crate::errors::{AppError, Result};
use crate::metrics;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Relevance scorer for (query, passage) pairs
#[async_trait]
pub trait Reranker: Send + Sync {
    /// One score per passage, in input order
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>>;

    fn model_name(&self) -> &str;
}

/// Client for a text-embeddings-inference style `/rerank` endpoint
pub struct HttpReranker {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    texts: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Deserialize)]
struct RerankHit {
    index: usize,
    score: f32,
}

impl HttpReranker {
    pub fn new(endpoint: String, model: String, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            endpoint,
            model,
            api_key,
        })
    }

    async fn call(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let request = RerankRequest {
            query,
            texts: passages,
            model: Some(&self.model),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AppError::rerank(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::rerank(format!("API error {}: {}", status, body)));
        }

        let hits: Vec<RerankHit> = response
            .json()
            .await
            .map_err(|e| AppError::rerank(format!("Failed to parse response: {}", e)))?;

        scores_from_hits(hits, passages.len())
    }
}

/// Map index/score pairs back onto input order; every passage must be scored exactly once
fn scores_from_hits(hits: Vec<RerankHit>, expected: usize) -> Result<Vec<f32>> {
    if hits.len() != expected {
        return Err(AppError::rerank(format!(
            "expected {} scores, received {}",
            expected,
            hits.len()
        )));
    }

    let mut scores = vec![None; expected];
    for hit in hits {
        let slot = scores
            .get_mut(hit.index)
            .ok_or_else(|| AppError::rerank(format!("score index {} out of range", hit.index)))?;
        if slot.is_some() {
            return Err(AppError::rerank(format!("duplicate score for index {}", hit.index)));
        }
        *slot = Some(hit.score);
    }

    Ok(scores.into_iter().flatten().collect())
}

#[async_trait]
impl Reranker for HttpReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        if passages.is_empty() {
            return Ok(Vec::new());
        }
        let started = Instant::now();
        let result = self.call(query, passages).await;
        metrics::record_rerank_call(started.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Offline scorer: fraction of distinct query terms present in the passage
pub struct LexicalReranker;

impl LexicalReranker {
    pub const MODEL_NAME: &'static str = "lexical-overlap";

    fn terms(text: &str) -> HashSet<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() > 1)
            .map(str::to_lowercase)
            .collect()
    }

    fn overlap(query_terms: &HashSet<String>, passage: &str) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let passage_terms = Self::terms(passage);
        let hits = query_terms.iter().filter(|t| passage_terms.contains(*t)).count();
        hits as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl Reranker for LexicalReranker {
    async fn score(&self, query: &str, passages: &[String]) -> Result<Vec<f32>> {
        let query_terms = Self::terms(query);
        Ok(passages.iter().map(|p| Self::overlap(&query_terms, p)).collect())
    }

    fn model_name(&self) -> &str {
        Self::MODEL_NAME
    }
}

/// Create a reranker based on configuration
pub fn create_reranker(config: &RerankConfig) -> Result<Arc<dyn Reranker>> {
    match config.provider.as_str() {
        "http" => Ok(Arc::new(HttpReranker::new(
            config.endpoint.clone(),
            config.model.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )?)),
        "lexical" => Ok(Arc::new(LexicalReranker)),
        other => Err(AppError::config(format!("Unknown rerank provider: {}", other))),
    }
}
