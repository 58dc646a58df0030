//! Answer generation: format retrieved chunks into a source-numbered
//! context block and ask the model, with costs measured from usage.

use std::sync::Arc;

use tracing::info;

use crate::config::CostConfig;
use crate::error::Result;
use crate::llm::{prompts, CompletionOptions, LlmApiClient};
use crate::models::{QueryComplexity, SearchResult};
use crate::security::harden_prompt;

/// Characters of chunk text included per source in the context block.
const CONTEXT_TEXT_CHARS: usize = 1000;
const ANSWER_TEMPERATURE: f32 = 0.3;
const DEFAULT_MAX_TOKENS: u32 = 1000;

#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub cost_usd: f64,
}

pub struct AnswerGenerator {
    llm: Arc<LlmApiClient>,
    cost: CostConfig,
    max_tokens: u32,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<LlmApiClient>, cost: CostConfig) -> Self {
        Self {
            llm,
            cost,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    /// Cap the generated answer at `max_tokens` instead of the default.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Answer `query` from the retrieved chunks. With no chunks, a canned
    /// answer goes back without calling the model, at zero cost.
    pub async fn generate(
        &self,
        query: &str,
        chunks: &[SearchResult],
        complexity: &QueryComplexity,
    ) -> Result<GeneratedAnswer> {
        if chunks.is_empty() {
            return Ok(GeneratedAnswer {
                answer: prompts::NO_CONTEXT_ANSWER.to_string(),
                cost_usd: 0.0,
            });
        }

        let context = build_context(chunks);
        let base_system = prompts::system_prompt_for(complexity);
        let hardened = harden_prompt(query, &context, &base_system);

        info!(chunks = chunks.len(), "Generating answer");

        let options = self.completion_options();
        let completion = self
            .llm
            .complete(&hardened.user, Some(&hardened.system), Some(&options))
            .await?;

        let cost_usd = self.completion_cost(completion.prompt_tokens, completion.completion_tokens);

        Ok(GeneratedAnswer {
            answer: completion.content.trim().to_string(),
            cost_usd,
        })
    }

    fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            temperature: Some(ANSWER_TEMPERATURE),
            max_tokens: Some(self.max_tokens),
        }
    }

    pub fn completion_cost(&self, prompt_tokens: u32, completion_tokens: u32) -> f64 {
        f64::from(prompt_tokens) / 1000.0 * self.cost.llm_input_per_1k_tokens
            + f64::from(completion_tokens) / 1000.0 * self.cost.llm_output_per_1k_tokens
    }
}

/// Numbered source blocks, one per chunk, in retrieval order.
pub fn build_context(chunks: &[SearchResult]) -> String {
    let parts: Vec<String> = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let text: String = chunk.metadata.text.chars().take(CONTEXT_TEXT_CHARS).collect();
            format!(
                "[Source {}] Document: {}, Page: {}\n{}\n",
                i + 1,
                chunk.metadata.document_name,
                chunk.metadata.page_number,
                text
            )
        })
        .collect();
    parts.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OpenAiConfig;
    use crate::models::{RecordMetadata, SearchMethod};

    fn generator() -> AnswerGenerator {
        let openai = OpenAiConfig {
            api_key: Some("test-key".to_string()),
            model: "gpt-4-turbo-preview".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            base_url: None,
            timeout_secs: 10,
            max_attempts: 1,
        };
        let cost = CostConfig {
            daily_limit_usd: 20.0,
            embedding_per_1k_tokens: 0.00013,
            llm_input_per_1k_tokens: 0.01,
            llm_output_per_1k_tokens: 0.03,
            index_per_result: 0.0001,
        };
        AnswerGenerator::new(Arc::new(LlmApiClient::new(&openai).unwrap()), cost)
    }

    fn chunk(name: &str, page: u32, text: &str) -> SearchResult {
        SearchResult::new(
            format!("{name}::chunk_0"),
            0.8,
            RecordMetadata {
                document_name: name.to_string(),
                page_number: page,
                chunk_index: 0,
                total_pages: 10,
                text: text.to_string(),
            },
            SearchMethod::Semantic,
        )
    }

    #[test]
    fn test_build_context_numbers_sources_from_one() {
        let chunks = vec![
            chunk("10k.pdf", 12, "Revenue was $394B."),
            chunk("q3.pdf", 4, "Margins improved."),
        ];
        let context = build_context(&chunks);
        assert!(context.contains("[Source 1] Document: 10k.pdf, Page: 12\nRevenue was $394B."));
        assert!(context.contains("[Source 2] Document: q3.pdf, Page: 4\nMargins improved."));
    }

    #[test]
    fn test_completion_options_default_cap() {
        let options = generator().completion_options();
        assert_eq!(options.max_tokens, Some(1000));
        assert_eq!(options.temperature, Some(0.3));
    }

    #[test]
    fn test_with_max_tokens_overrides_default() {
        let options = generator().with_max_tokens(256).completion_options();
        assert_eq!(options.max_tokens, Some(256));
    }

    #[test]
    fn test_build_context_caps_chunk_text() {
        let long_text = "x".repeat(5000);
        let context = build_context(&[chunk("a.pdf", 1, &long_text)]);
        // header + capped text + trailing newline
        assert!(context.len() < CONTEXT_TEXT_CHARS + 200);
    }
}
