//! Prompt assembly

use docchat_search::ScoredChunk;

/// Separator line around the context block
pub const CONTEXT_FENCE: &str = "---------------------";

/// Context-grounded QA prompt; chunks are joined with blank lines
pub fn build_prompt(query: &str, chunks: &[ScoredChunk]) -> String {
    let context = chunks
        .iter()
        .map(|c| c.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Context information is below.\n\
         {fence}\n\
         {context}\n\
         {fence}\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\n\
         Answer: ",
        fence = CONTEXT_FENCE,
        context = context,
        query = query.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use docchat_common::hierarchy::Chunk;

    fn scored(text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk::new(2, 0, text, None),
            score: 0.5,
            rank: 0,
        }
    }

    #[test]
    fn test_prompt_layout() {
        let prompt = build_prompt(" What merges? ", &[scored("First chunk."), scored("Second chunk.")]);
        assert!(prompt.starts_with("Context information is below.\n---------------------\nFirst chunk.\n\nSecond chunk.\n"));
        assert!(prompt.contains("answer the query.\nQuery: What merges?\nAnswer: "));
        assert!(prompt.ends_with("Answer: "));
    }

    #[test]
    fn test_prompt_without_context() {
        let prompt = build_prompt("anything", &[]);
        assert!(prompt.contains(&format!("{}\n\n{}", CONTEXT_FENCE, CONTEXT_FENCE)));
    }
}
