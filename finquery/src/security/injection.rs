use std::sync::OnceLock;

use regex::Regex;

/// Pattern families covering instruction-override, role-reassignment,
/// secret-extraction, and system-prompt-leak phrasing.
const INJECTION_PATTERNS: &[&str] = &[
    // Direct prompt injection attempts
    r"(?i)(ignore|forget|disregard).*?(previous|prior|above|instructions|prompt)",
    r"(?i)(you are|act as|pretend to be|roleplay).*?(now|instead|different)",
    r"(?i)(system|assistant|ai).*?(override|bypass|hack)",
    // Instruction manipulation
    r"(?i)(new instruction|override|ignore).*?(instruction|command|directive)",
    r"(?i)(forget|skip|bypass).*?(rules|guidelines|constraints)",
    // Extraction attempts
    r"(?i)(show|reveal|display|output|print).*?(api.?key|secret|password|token|credential)",
    r"(?i)(what is|tell me|give me).*?(your|the).*?(api.?key|secret|password)",
    // Context manipulation
    r"(?i)(based on|using|from).*?(context|documents|excerpts).*?(answer|reply|respond)",
    // System prompt leaks
    r"(?i)(what are|show me|list).*?(system|prompt|instructions|rules)",
];

const SUSPICIOUS_KEYWORDS: &[&str] = &[
    "ignore previous",
    "forget all",
    "new instructions",
    "override",
    "system prompt",
    "api key",
    "secret",
    "password",
    "token",
    "bypass",
    "hack",
    "exploit",
    "vulnerability",
    "injection",
];

fn injection_patterns() -> &'static Vec<Regex> {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        INJECTION_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("injection pattern must compile"))
            .collect()
    })
}

fn instruction_verbs() -> &'static Regex {
    static VERBS: OnceLock<Regex> = OnceLock::new();
    VERBS.get_or_init(|| {
        Regex::new(r"(?i)(ignore|forget|override|new instruction)")
            .expect("instruction verb pattern must compile")
    })
}

#[derive(Debug, Clone, Default)]
pub struct InjectionReport {
    pub is_injection: bool,
    /// 0.0 to 1.0, higher = more suspicious.
    pub threat_score: f32,
    pub warnings: Vec<String>,
    pub pattern_matches: usize,
}

/// Heuristic prompt-injection detection. Pure function of the input;
/// each matched pattern family adds 0.2 to the threat score.
pub fn detect_injection(query: &str) -> InjectionReport {
    if query.is_empty() {
        return InjectionReport::default();
    }

    let query_lower = query.to_lowercase();
    let mut threat_score = 0.0f32;
    let mut warnings = Vec::new();

    let pattern_matches = injection_patterns()
        .iter()
        .filter(|p| p.is_match(query))
        .count();
    threat_score += pattern_matches as f32 * 0.2;
    if pattern_matches > 0 {
        warnings.push(format!(
            "Detected {pattern_matches} potential injection pattern(s)"
        ));
    }

    let keyword_matches = SUSPICIOUS_KEYWORDS
        .iter()
        .filter(|kw| query_lower.contains(*kw))
        .count();
    if keyword_matches > 0 {
        threat_score += (keyword_matches as f32 * 0.1).min(0.4);
        warnings.push(format!("Found {keyword_matches} suspicious keyword(s)"));
    }

    let instruction_count = instruction_verbs().find_iter(query).count();
    if instruction_count > 1 {
        threat_score += 0.2;
        warnings.push("Multiple instruction manipulation attempts detected".to_string());
    }

    // Excessive length may indicate obfuscation
    if query.len() > 1000 {
        threat_score += 0.1;
    }

    let threat_score = threat_score.min(1.0);
    let is_injection = threat_score > 0.4 || pattern_matches >= 2;

    if is_injection {
        let preview: String = query.chars().take(100).collect();
        tracing::warn!(
            threat_score,
            pattern_matches,
            query_preview = %preview,
            "Injection attempt detected"
        );
    }

    InjectionReport {
        is_injection,
        threat_score,
        warnings,
        pattern_matches,
    }
}
