//! Ambiguity Detector
//!
//! Flags hedging language with a case-insensitive substring match against
//! `lexicon::HEDGE_PHRASES`. Output is boolean; there is no weighting.

use crate::lexicon::HEDGE_PHRASES;
use crate::templates::render_text;
use crate::types::{Answer, Priority, Question, CLARIFICATION_CATEGORY};
use std::collections::HashMap;

/// Characters kept on each side of a hedge phrase when quoting it back
pub const CONTEXT_WINDOW: usize = 20;

/// Flat confidence reduction for ambiguous answers
pub const DEFAULT_AMBIGUITY_PENALTY: f64 = 0.2;

const GENERIC_CLARIFICATION: &str =
    "Your answer about {topic} included \"{context}\". Could you be more specific?";

/// A hedge phrase found in an answer
#[derive(Debug, Clone, PartialEq)]
pub struct HedgeMatch {
    pub phrase: &'static str,
    /// Up to `CONTEXT_WINDOW` chars either side of the phrase
    pub context: String,
}

pub fn detect_ambiguity(text: &str) -> bool {
    let lower = text.to_lowercase();
    HEDGE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Earliest hedge phrase in the text, with its surrounding window
pub fn first_hedge(text: &str) -> Option<HedgeMatch> {
    let chars: Vec<char> = text.chars().collect();
    // One lowercase char per original char keeps indices aligned
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let mut best: Option<(usize, &'static str)> = None;
    for phrase in HEDGE_PHRASES {
        let needle: Vec<char> = phrase.chars().collect();
        if let Some(pos) = find_chars(&lower, &needle) {
            if best.map_or(true, |(p, _)| pos < p) {
                best = Some((pos, phrase));
            }
        }
    }

    best.map(|(pos, phrase)| {
        let end = pos + phrase.chars().count();
        let start = pos.saturating_sub(CONTEXT_WINDOW);
        let stop = (end + CONTEXT_WINDOW).min(chars.len());
        HedgeMatch {
            phrase,
            context: chars[start..stop].iter().collect::<String>().trim().to_string(),
        }
    })
}

fn find_chars(haystack: &[char], needle: &[char]) -> Option<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Clarification question for an ambiguous answer, or `None` if the answer
/// is clear. Uses `template` when given (`{context}` and `{topic}`
/// placeholders), otherwise a generic wording.
pub fn clarification_question(
    answer: &Answer,
    original: &Question,
    topic: &str,
    template: Option<&str>,
) -> Option<Question> {
    let hedge = first_hedge(&answer.text)?;

    let mut values = HashMap::new();
    values.insert("context".to_string(), hedge.context);
    let text = render_text(template.unwrap_or(GENERIC_CLARIFICATION), topic, &values);

    Some(
        Question::new(
            None,
            &original.phase,
            text,
            CLARIFICATION_CATEGORY,
            Priority::Critical,
        )
        .with_follow_up_to(&original.id),
    )
}

/// Confidence after the flat ambiguity reduction, floored at zero
pub fn penalize(confidence: f64, penalty: f64) -> f64 {
    (confidence - penalty).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_hedging() {
        assert!(detect_ambiguity("maybe it could work"));
        assert!(detect_ambiguity("I'm NOT SURE about the limits"));
        assert!(detect_ambiguity("It depends on the client"));
    }

    #[test]
    fn test_decisive_text_is_not_ambiguous() {
        assert!(!detect_ambiguity("the system will use PostgreSQL"));
        assert!(!detect_ambiguity("Requests must complete within 200ms."));
    }

    #[test]
    fn test_first_hedge_picks_earliest_phrase() {
        let hedge = first_hedge("We probably need SSO, maybe SAML").unwrap();
        assert_eq!(hedge.phrase, "probably");
    }

    #[test]
    fn test_context_window_is_bounded() {
        let text = "The ingestion pipeline should perhaps batch writes every few seconds";
        let hedge = first_hedge(text).unwrap();
        assert_eq!(hedge.phrase, "perhaps");
        assert!(hedge.context.contains("perhaps"));
        assert!(hedge.context.chars().count() <= "perhaps".len() + 2 * CONTEXT_WINDOW);
        assert!(!hedge.context.contains("ingestion"));
    }

    #[test]
    fn test_context_window_handles_multibyte_text() {
        let hedge = first_hedge("Ünïcödé — maybe ✓").unwrap();
        assert_eq!(hedge.phrase, "maybe");
        assert!(hedge.context.contains("✓"));
    }

    #[test]
    fn test_clarification_question_links_to_original() {
        let original = Question::new(
            Some("req-core".into()),
            "specify",
            "What must it do?".into(),
            "requirements",
            Priority::High,
        );
        let answer = Answer::new(&original.id, "It might export reports", 0.6);
        let q = clarification_question(&answer, &original, "billing", None).unwrap();

        assert_eq!(q.follow_up_to.as_deref(), Some(original.id.as_str()));
        assert_eq!(q.priority, Priority::Critical);
        assert_eq!(q.category, CLARIFICATION_CATEGORY);
        assert_eq!(q.phase, "specify");
        assert!(q.text.contains("billing"));
        assert!(q.text.contains("might export"));
    }

    #[test]
    fn test_clarification_uses_configured_template() {
        let original = Question::new(None, "plan", "?".into(), "context", Priority::Low);
        let answer = Answer::new(&original.id, "possibly weekly", 0.5);
        let q = clarification_question(&answer, &original, "sync", Some("Define '{context}' for {topic}"))
            .unwrap();
        assert_eq!(q.text, "Define 'possibly weekly' for sync");
    }

    #[test]
    fn test_clear_answer_gets_no_clarification() {
        let original = Question::new(None, "plan", "?".into(), "context", Priority::Low);
        let answer = Answer::new(&original.id, "Weekly, on Mondays.", 0.9);
        assert!(clarification_question(&answer, &original, "sync", None).is_none());
    }

    #[test]
    fn test_penalty_floors_at_zero() {
        assert!((penalize(0.9, 0.2) - 0.7).abs() < 1e-9);
        assert_eq!(penalize(0.1, 0.2), 0.0);
    }
}
