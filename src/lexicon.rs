//! Fixed word lists and lexical matching helpers
//!
//! Every heuristic in the engine is a plain lexical match against these
//! lists. Scores are defined against this exact behavior, so extend the
//! lists with care.

use std::collections::HashSet;

/// Hedging language. Used both for ambiguity detection (substring) and for
/// the clarity penalty (word-boundary count).
pub const HEDGE_PHRASES: &[&str] = &[
    "maybe",
    "possibly",
    "might",
    "perhaps",
    "probably",
    "not sure",
    "unsure",
    "i think",
    "i guess",
    "could be",
    "kind of",
    "sort of",
    "unclear",
    "depends",
    "hopefully",
    "tbd",
];

/// Decisive language rewarded by the clarity factor
pub const DECISIVE_WORDS: &[&str] = &[
    "must",
    "will",
    "always",
    "never",
    "definitely",
    "certainly",
    "required",
    "shall",
    "exactly",
    "guaranteed",
];

/// Bare one-word answers
pub const BARE_ANSWERS: &[&str] = &["yes", "no", "y", "n", "yep", "nope", "ok", "sure"];

/// Domain vocabulary rewarded by the specificity factor. Plural forms
/// match too.
pub const TECHNICAL_TERMS: &[&str] = &[
    "api",
    "endpoint",
    "database",
    "schema",
    "postgresql",
    "postgres",
    "mysql",
    "sqlite",
    "redis",
    "cache",
    "caching",
    "queue",
    "server",
    "client",
    "user",
    "concurrent",
    "latency",
    "throughput",
    "network",
    "retry",
    "backoff",
    "timeout",
    "http",
    "json",
    "auth",
    "token",
    "encryption",
    "deployment",
    "container",
    "service",
    "transaction",
    "index",
];

/// Vague quantifiers penalized by the specificity factor
pub const GENERIC_WORDS: &[&str] = &[
    "various",
    "some",
    "a lot",
    "stuff",
    "things",
    "etc",
    "several",
    "somehow",
    "whatever",
    "generally",
];

/// Phrases that introduce a concrete example
pub const EXAMPLE_INDICATORS: &[&str] = &[
    "for example",
    "for instance",
    "such as",
    "e.g.",
    "use case",
    "scenario",
    "like when",
    "in practice",
    "imagine",
];

/// (assertion, negation) pairs that signal a contradiction when two
/// answers take opposite sides
pub const ANTONYM_PAIRS: &[(&str, &str)] = &[
    ("yes", "no"),
    ("true", "false"),
    ("always", "never"),
    ("must", "must not"),
    ("will", "won't"),
    ("can", "cannot"),
    ("should", "should not"),
];

/// Function words ignored for topical overlap
pub const STOPWORDS: &[&str] = &[
    "the", "and", "but", "for", "nor", "yet", "with", "from", "into", "onto", "that",
    "this", "these", "those", "then", "than", "there", "their", "they", "them", "our",
    "ours", "your", "you", "are", "was", "were", "been", "being", "have", "has", "had",
    "does", "did", "doing", "will", "would", "should", "could", "can", "cannot", "must",
    "may", "not", "yes", "all", "any", "also", "just", "only", "very", "what", "when",
    "where", "which", "who", "whom", "why", "how", "its", "it's", "his", "her", "she",
    "him", "about", "over", "under", "after", "before", "each", "both", "such", "own",
    "same", "too", "out", "off", "use", "using", "won't", "don't", "we're",
];

/// Count word-boundary occurrences of `phrase` in already-lowercased text
pub fn count_phrase(lower: &str, phrase: &str) -> usize {
    if phrase.is_empty() {
        return 0;
    }
    lower
        .match_indices(phrase)
        .filter(|(start, matched)| {
            let before_ok = lower[..*start]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric());
            let after_ok = lower[start + matched.len()..]
                .chars()
                .next()
                .map_or(true, |c| !c.is_alphanumeric());
            before_ok && after_ok
        })
        .count()
}

/// Total word-boundary occurrences of any phrase in the list
pub fn count_any(lower: &str, phrases: &[&str]) -> usize {
    phrases.iter().map(|p| count_phrase(lower, p)).sum()
}

/// Whether the text asserts `positive` on its own, not only as the first
/// word of its negation ("must" inside "must not" doesn't count). Single-word
/// negations like "cannot" never match the positive at a word boundary.
pub fn asserts(lower: &str, positive: &str, negation: &str) -> bool {
    let pos = count_phrase(lower, positive);
    let prefixed = negation
        .strip_prefix(positive)
        .map_or(false, |rest| rest.starts_with(char::is_whitespace));
    if prefixed {
        pos > count_phrase(lower, negation)
    } else {
        pos > 0
    }
}

/// Lowercased alphanumeric tokens (apostrophes kept)
pub fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\''))
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Content-bearing terms used for topical overlap and terminology reuse
pub fn key_terms(text: &str) -> HashSet<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 3)
        .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Count distinct technical terms in the text
pub fn technical_hits(text: &str) -> usize {
    let tokens: HashSet<String> = words(text).into_iter().collect();
    TECHNICAL_TERMS
        .iter()
        .filter(|term| tokens.contains(**term) || tokens.contains(&format!("{}s", term)))
        .count()
}

/// Lines that look like bullet or numbered list items
pub fn list_item_count(text: &str) -> usize {
    text.lines()
        .map(str::trim_start)
        .filter(|line| {
            if line.starts_with("- ") || line.starts_with("* ") || line.starts_with("• ") {
                return true;
            }
            let digits: String = line.chars().take_while(|c| c.is_ascii_digit()).collect();
            !digits.is_empty()
                && (line[digits.len()..].starts_with(". ") || line[digits.len()..].starts_with(") "))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_phrase_respects_word_boundaries() {
        assert_eq!(count_phrase("we will scale", "will"), 1);
        assert_eq!(count_phrase("a willing team", "will"), 0);
        assert_eq!(count_phrase("must, must and must", "must"), 3);
        assert_eq!(count_phrase("i am not sure", "not sure"), 1);
    }

    #[test]
    fn test_asserts_ignores_negated_prefix() {
        assert!(asserts("you must log in", "must", "must not"));
        assert!(!asserts("you must not log in", "must", "must not"));
        assert!(asserts("you must not skip, you must log in", "must", "must not"));
        assert!(!asserts("we cannot", "can", "cannot"));
        assert!(asserts("we can read but cannot write", "can", "cannot"));
    }

    #[test]
    fn test_key_terms_skip_stopwords_and_numbers() {
        let terms = key_terms("The API must return 200 for all cached users");
        assert!(terms.contains("api"));
        assert!(terms.contains("cached"));
        assert!(terms.contains("users"));
        assert!(!terms.contains("the"));
        assert!(!terms.contains("must"));
        assert!(!terms.contains("200"));
    }

    #[test]
    fn test_technical_hits_match_plurals() {
        assert_eq!(technical_hits("Postgres stores users and tokens"), 3);
        assert_eq!(technical_hits("nothing technical here"), 0);
    }

    #[test]
    fn test_list_item_count() {
        let text = "Requirements:\n- login\n- logout\n1. audit\n2) export\nplain line";
        assert_eq!(list_item_count(text), 4);
    }
}
