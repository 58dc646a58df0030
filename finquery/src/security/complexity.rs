use std::sync::OnceLock;

use regex::Regex;

use crate::models::QueryComplexity;

const MAX_DETECTED_PARTS: usize = 5;

/// Connectors that join independent sub-questions.
const MULTI_PART_CONNECTORS: &[&str] = &[
    " and ",
    " or ",
    " as well as ",
    " along with ",
    " plus ",
];

/// Connectors that signal a comparison between entities.
const COMPARISON_CONNECTORS: &[&str] = &[
    " vs ",
    " vs. ",
    " versus ",
    "compare",
    "comparison",
    "difference between",
    "differences between",
];

fn part_splitter() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\band\b|\bor\b|\bversus\b|\bvs\.?\b|[,;?]").expect("part splitter pattern")
    })
}

fn what_is_x_and_y() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bwhat\s+(is|are|was|were)\b.+\band\b.+\bwhat\s+(is|are|was|were)\b")
            .expect("what-is pattern")
    })
}

fn interrogative_lead() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(what|how|why|when|where|which|who)\s+(is|are|was|were|did|does|do|much|many)\b")
            .expect("interrogative pattern")
    })
}

/// Advisory analysis of whether a query bundles several sub-questions.
/// Informs prompt construction; never blocks a query.
pub fn analyze_query_complexity(query: &str) -> QueryComplexity {
    let lower = query.to_lowercase();

    // A query like "what is X and what is Y?" carries one question mark
    // but two questions; count interrogative clauses as well.
    let question_marks = query.matches('?').count();
    let interrogatives = interrogative_lead().find_iter(query).count();
    let question_count = question_marks.max(interrogatives).max(1);

    let connector_hits = MULTI_PART_CONNECTORS
        .iter()
        .filter(|c| lower.contains(*c))
        .count();
    let comparison_hits = COMPARISON_CONNECTORS
        .iter()
        .filter(|c| lower.contains(*c))
        .count();

    let detected_parts: Vec<String> = part_splitter()
        .split(query)
        .map(str::trim)
        .filter(|part| part.chars().count() > 10)
        .take(MAX_DETECTED_PARTS)
        .map(str::to_string)
        .collect();

    let repeated_question_form = what_is_x_and_y().is_match(query);

    let is_multi_part = question_count >= 2
        || repeated_question_form
        || ((connector_hits + comparison_hits) > 0 && detected_parts.len() >= 2);

    let complexity_score = (0.2 * (connector_hits + comparison_hits) as f32
        + 0.3 * question_count.saturating_sub(1) as f32
        + 0.1 * detected_parts.len().saturating_sub(1) as f32)
        .min(1.0);

    QueryComplexity {
        is_multi_part,
        is_comparison: comparison_hits > 0,
        question_count,
        detected_parts,
        complexity_score,
    }
}
