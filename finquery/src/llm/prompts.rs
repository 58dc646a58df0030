//! Prompt fragments for answer generation. Kept as constants so tests can
//! assert on the exact text sent upstream.

use crate::models::QueryComplexity;

pub const FINANCIAL_SYSTEM_PROMPT: &str = "You are an expert financial research assistant. \
Answer questions based ONLY on the provided document context.\n\
Be precise and cite specific sources. If the context doesn't contain enough information, \
say so clearly.\n\n\
Format your response professionally and include references to the source documents when \
making claims.";

pub const MULTI_PART_INSTRUCTION: &str = "The question has multiple parts. Address every \
part explicitly, in order, and label each part of your answer.";

pub const COMPARISON_INSTRUCTION: &str = "The question asks for a comparison. Present the \
compared items side by side and state the differences directly.";

/// Returned without calling the model when retrieval produced nothing.
pub const NO_CONTEXT_ANSWER: &str =
    "I couldn't find any relevant information in the documents to answer your question.";

/// System prompt adjusted for what complexity analysis detected. The base
/// prompt always leads; instructions are appended, comparison last.
pub fn system_prompt_for(complexity: &QueryComplexity) -> String {
    let mut prompt = FINANCIAL_SYSTEM_PROMPT.to_string();
    if complexity.is_multi_part {
        prompt.push_str("\n\n");
        prompt.push_str(MULTI_PART_INSTRUCTION);
    }
    if complexity.is_comparison {
        prompt.push_str("\n\n");
        prompt.push_str(COMPARISON_INSTRUCTION);
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_query_gets_base_prompt_only() {
        let complexity = QueryComplexity::default();
        let prompt = system_prompt_for(&complexity);
        assert_eq!(prompt, FINANCIAL_SYSTEM_PROMPT);
    }

    #[test]
    fn test_multi_part_and_comparison_append_instructions() {
        let complexity = QueryComplexity {
            is_multi_part: true,
            is_comparison: true,
            question_count: 2,
            detected_parts: vec![],
            complexity_score: 0.5,
        };
        let prompt = system_prompt_for(&complexity);
        assert!(prompt.starts_with(FINANCIAL_SYSTEM_PROMPT));
        assert!(prompt.contains(MULTI_PART_INSTRUCTION));
        assert!(prompt.ends_with(COMPARISON_INSTRUCTION));
    }
}
