//! Metrics and observability utilities
//!
//! Counters and histograms go through the `metrics` facade; without an
//! installed recorder they are no-ops.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all DocChat metrics
pub const METRICS_PREFIX: &str = "docchat";

/// Buckets for model call latency (embedding, rerank, generation)
pub const MODEL_CALL_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding request latency in seconds"
    );

    // Indexing metrics
    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks created by the hierarchical chunker"
    );

    describe_histogram!(
        format!("{}_index_build_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Index build latency in seconds"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Auto-merging retrieval latency in seconds"
    );

    describe_counter!(
        format!("{}_merges_total", METRICS_PREFIX),
        Unit::Count,
        "Total parent merges performed during retrieval"
    );

    // Rerank metrics
    describe_counter!(
        format!("{}_rerank_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total rerank model requests"
    );

    describe_counter!(
        format!("{}_rerank_fallbacks_total", METRICS_PREFIX),
        Unit::Count,
        "Rerank failures that fell back to retrieval order"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total language model requests"
    );

    describe_histogram!(
        format!("{}_llm_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Language model latency in seconds"
    );

    // Session metrics
    describe_counter!(
        format!("{}_turns_total", METRICS_PREFIX),
        Unit::Count,
        "Chat turns processed"
    );

    tracing::debug!("Metrics registered");
}

fn status(success: bool) -> &'static str {
    if success {
        "success"
    } else {
        "error"
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);

        counter!(
            format!("{}_embedded_texts_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record a finished index build
pub fn record_index_build(duration_secs: f64, chunks_created: usize, leaves_embedded: usize) {
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks_created as u64);
    counter!(format!("{}_leaves_embedded_total", METRICS_PREFIX)).increment(leaves_embedded as u64);
    histogram!(format!("{}_index_build_duration_seconds", METRICS_PREFIX)).record(duration_secs);
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, merges: usize, result_count: usize) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);
    counter!(format!("{}_merges_total", METRICS_PREFIX)).increment(merges as u64);
    histogram!(format!("{}_retrieval_results", METRICS_PREFIX)).record(result_count as f64);
}

/// Helper to record a rerank model call
pub fn record_rerank_call(duration_secs: f64, model: &str, success: bool) {
    counter!(
        format!("{}_rerank_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status(success)
    )
    .increment(1);

    histogram!(
        format!("{}_rerank_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to record a rerank fallback
pub fn record_rerank_fallback() {
    counter!(format!("{}_rerank_fallbacks_total", METRICS_PREFIX)).increment(1);
}

/// Helper to record a language model call
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    counter!(
        format!("{}_llm_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status(success)
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_llm_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    }
}

/// Helper to record a processed chat turn
pub fn record_turn(outcome: &'static str) {
    counter!(
        format!("{}_turns_total", METRICS_PREFIX),
        "outcome" => outcome
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_call_buckets_sorted() {
        let mut prev = 0.0;
        for &bucket in MODEL_CALL_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }
    }

    #[test]
    fn test_recording_without_recorder() {
        register_metrics();
        record_embedding(0.1, "hash-embedding", 4, true);
        record_retrieval(0.02, 1, 6);
        record_rerank_fallback();
        record_turn("answered");
        // Just verify it runs without panic
    }
}
