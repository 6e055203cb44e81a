//! LLM synthesis over the retrieved context

use crate::prompt::build_prompt;
use docchat_common::errors::{AppError, Result};
use docchat_common::llm::{GenerationParams, LanguageModel};
use docchat_search::RerankedContext;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Builds the prompt and calls the language model
pub struct Synthesizer {
    llm: Arc<dyn LanguageModel>,
    params: GenerationParams,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>, params: GenerationParams) -> Self {
        Self { llm, params }
    }

    pub fn model_name(&self) -> &str {
        self.llm.model_name()
    }

    #[instrument(skip_all, fields(model = self.llm.model_name(), chunks = context.chunks.len()))]
    pub async fn synthesize(&self, query: &str, context: &RerankedContext) -> Result<String> {
        let prompt = build_prompt(query, &context.chunks);
        debug!(prompt_len = prompt.len(), "Prompt assembled");

        let answer = self
            .llm
            .complete(&prompt, &self.params)
            .await
            .map_err(|e| match e {
                AppError::Generation { .. } => e,
                other => AppError::generation(other.to_string()),
            })?;

        Ok(answer.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_common::config::LlmConfig;
    use docchat_common::hierarchy::Chunk;
    use docchat_common::llm::EchoModel;
    use docchat_search::ScoredChunk;

    #[test]
    fn test_echo_synthesis_sees_context() {
        let synth = Synthesizer::new(Arc::new(EchoModel), GenerationParams::from(&LlmConfig::default()));
        let context = RerankedContext {
            chunks: vec![ScoredChunk {
                chunk: Chunk::new(0, 0, "Parents replace their retrieved children.", None),
                score: 1.0,
                rank: 0,
            }],
            fallback: None,
        };

        let answer = tokio_test::block_on(synth.synthesize("What replaces children?", &context)).unwrap();
        assert!(answer.contains("What replaces children?"));
        assert!(answer.contains("Parents replace their retrieved children."));
    }
}
