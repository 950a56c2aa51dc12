//! Confidence Calculator
//!
//! Scores how completely a topic has been elicited from six independent
//! lexical factors, combined as a fixed convex combination:
//!
//! | factor | default weight | signal |
//! |---|---|---|
//! | clarity | 0.25 | hedging vs decisive language, bare yes/no, structure, self-reported confidence |
//! | completeness | 0.20 | answer length bands, multi-part answers to multi-part questions |
//! | specificity | 0.20 | technical terms, numbers, code notation, minus vague quantifiers |
//! | consistency | 0.15 | pairwise contradictions, shared terminology |
//! | coverage | 0.15 | critical and overall categories asked |
//! | examples | 0.05 | example phrases, code fences, enumerated scenarios |
//!
//! Pure and deterministic: identical inputs and weights always produce
//! bit-identical results.

use crate::lexicon::{
    asserts, count_any, count_phrase, key_terms, list_item_count, technical_hits, words,
    ANTONYM_PAIRS, BARE_ANSWERS, DECISIVE_WORDS, EXAMPLE_INDICATORS, GENERIC_WORDS,
    HEDGE_PHRASES,
};
use crate::templates::default_critical_categories;
use crate::types::{Answer, ConfidenceFactors, ConfidenceResult, Question, CLARIFICATION_CATEGORY};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Categories a complete elicitation is expected to touch
pub const KNOWN_CATEGORIES: &[&str] = &[
    "requirements",
    "constraints",
    "edge-cases",
    "context",
    "users",
    "integration",
    "performance",
    "security",
];

/// Answers needed before consistency is measured rather than assumed
pub const DEFAULT_MIN_ANSWERS_FOR_CONSISTENCY: usize = 3;

const NEUTRAL_CONSISTENCY: f64 = 0.7;
const CONTRADICTION_PENALTY: f64 = 0.15;
const MAX_TERMINOLOGY_BONUS: f64 = 0.2;
const TERMINOLOGY_SHARE: f64 = 0.3;
/// Shared non-stopword terms needed before two answers count as on-topic
const TOPICAL_OVERLAP: usize = 3;

/// Factor weights. Renormalized to sum to 1 before use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub clarity: f64,
    pub completeness: f64,
    pub specificity: f64,
    pub consistency: f64,
    pub coverage: f64,
    pub examples: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            clarity: 0.25,
            completeness: 0.20,
            specificity: 0.20,
            consistency: 0.15,
            coverage: 0.15,
            examples: 0.05,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.clarity
            + self.completeness
            + self.specificity
            + self.consistency
            + self.coverage
            + self.examples
    }

    pub fn is_valid(&self) -> bool {
        let all = [
            self.clarity,
            self.completeness,
            self.specificity,
            self.consistency,
            self.coverage,
            self.examples,
        ];
        all.iter().all(|w| w.is_finite() && *w >= 0.0) && self.sum() > 0.0
    }

    /// Same ratios, summing to 1. Invalid weights fall back to the defaults.
    pub fn normalized(&self) -> Self {
        if !self.is_valid() {
            return Self::default();
        }
        let total = self.sum();
        Self {
            clarity: self.clarity / total,
            completeness: self.completeness / total,
            specificity: self.specificity / total,
            consistency: self.consistency / total,
            coverage: self.coverage / total,
            examples: self.examples / total,
        }
    }

    fn combine(&self, f: &ConfidenceFactors) -> f64 {
        self.clarity * f.clarity
            + self.completeness * f.completeness
            + self.specificity * f.specificity
            + self.consistency * f.consistency
            + self.coverage * f.coverage
            + self.examples * f.examples
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceCalculator {
    weights: ConfidenceWeights,
    min_answers_for_consistency: usize,
    critical_categories: Vec<String>,
    total_categories: usize,
    threshold: f64,
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self::new(ConfidenceWeights::default())
    }
}

impl ConfidenceCalculator {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self {
            weights: weights.normalized(),
            min_answers_for_consistency: DEFAULT_MIN_ANSWERS_FOR_CONSISTENCY,
            critical_categories: default_critical_categories(),
            total_categories: KNOWN_CATEGORIES.len(),
            threshold: 0.8,
        }
    }

    pub fn with_min_answers_for_consistency(mut self, min: usize) -> Self {
        self.min_answers_for_consistency = min;
        self
    }

    pub fn with_critical_categories(mut self, categories: Vec<String>) -> Self {
        self.critical_categories = categories;
        self
    }

    /// Size of the category universe used by the coverage factor
    pub fn with_total_categories(mut self, total: usize) -> Self {
        self.total_categories = total.max(1);
        self
    }

    /// Target used for the closing gap-to-threshold insight
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn weights(&self) -> &ConfidenceWeights {
        &self.weights
    }

    /// Score `answers` against the `questions` they respond to. Questions are
    /// matched by id, falling back to position.
    pub fn calculate(&self, answers: &[Answer], questions: &[Question]) -> ConfidenceResult {
        let missing = self.missing_categories(questions);

        if answers.is_empty() {
            return ConfidenceResult {
                overall: 0.0,
                factors: ConfidenceFactors::default(),
                missing,
                insights: vec!["No answers provided yet".to_string()],
            };
        }

        // Position only pairs an answer with a question no other answer names
        let claimed: HashSet<&str> = answers
            .iter()
            .filter(|a| questions.iter().any(|q| q.id == a.question_id))
            .map(|a| a.question_id.as_str())
            .collect();
        let pairs: Vec<(&Answer, Option<&Question>)> = answers
            .iter()
            .enumerate()
            .map(|(i, answer)| {
                let question = questions
                    .iter()
                    .find(|q| q.id == answer.question_id)
                    .or_else(|| questions.get(i).filter(|q| !claimed.contains(q.id.as_str())));
                (answer, question)
            })
            .collect();

        let factors = ConfidenceFactors {
            clarity: average(answers.iter().map(clarity_score)),
            completeness: average(pairs.iter().map(|(a, q)| completeness_score(a, *q))),
            specificity: average(answers.iter().map(|a| specificity_score(&a.text))),
            consistency: self.consistency_score(answers),
            coverage: self.coverage_score(questions),
            examples: examples_score(answers),
        };

        let overall = self.weights.combine(&factors).clamp(0.0, 1.0);
        let insights = self.insights(overall, &factors, &missing);

        debug!(
            answers = answers.len(),
            overall = overall,
            clarity = factors.clarity,
            completeness = factors.completeness,
            specificity = factors.specificity,
            consistency = factors.consistency,
            coverage = factors.coverage,
            examples = factors.examples,
            "Confidence recomputed"
        );

        ConfidenceResult {
            overall,
            factors,
            missing,
            insights,
        }
    }

    fn missing_categories(&self, questions: &[Question]) -> Vec<String> {
        let asked: HashSet<&str> = questions.iter().map(|q| q.category.as_str()).collect();
        self.critical_categories
            .iter()
            .filter(|c| !asked.contains(c.as_str()))
            .cloned()
            .collect()
    }

    fn consistency_score(&self, answers: &[Answer]) -> f64 {
        if answers.len() < self.min_answers_for_consistency {
            return NEUTRAL_CONSISTENCY;
        }

        let texts: Vec<&str> = answers.iter().map(|a| a.text.as_str()).collect();
        let contradictions = find_contradictions(&texts).len();
        let bonus = terminology_bonus(&texts);

        (1.0 - CONTRADICTION_PENALTY * contradictions as f64 + bonus).clamp(0.0, 1.0)
    }

    fn coverage_score(&self, questions: &[Question]) -> f64 {
        // Clarifications reach no new category
        let asked: HashSet<&str> = questions
            .iter()
            .map(|q| q.category.as_str())
            .filter(|c| *c != CLARIFICATION_CATEGORY)
            .collect();

        let critical = if self.critical_categories.is_empty() {
            1.0
        } else {
            let covered = self
                .critical_categories
                .iter()
                .filter(|c| asked.contains(c.as_str()))
                .count();
            covered as f64 / self.critical_categories.len() as f64
        };
        let breadth = (asked.len() as f64 / self.total_categories as f64).min(1.0);

        0.7 * critical + 0.3 * breadth
    }

    fn insights(&self, overall: f64, f: &ConfidenceFactors, missing: &[String]) -> Vec<String> {
        let mut insights = Vec::new();

        if f.clarity < 0.5 {
            insights.push("Too much ambiguity - ask for definite statements".to_string());
        }
        if f.completeness < 0.5 {
            insights.push("Answers are brief - request more detail".to_string());
        }
        if f.specificity < 0.5 {
            insights.push("Answers lack specifics - ask for numbers, names, and technical details".to_string());
        }
        if f.consistency < 0.6 {
            insights.push("Some answers contradict each other - resolve the conflicts".to_string());
        }
        if f.coverage < 0.5 {
            insights.push(format!(
                "Critical categories not covered: {}",
                missing.join(", ")
            ));
        } else if !missing.is_empty() {
            insights.push(format!("Still missing critical categories: {}", missing.join(", ")));
        }
        if f.examples < 0.3 {
            insights.push("Few concrete examples - ask for a use case".to_string());
        }

        for (name, value) in f.named() {
            if value > 0.8 {
                insights.push(format!("Strong {} ({:.0}%)", name, value * 100.0));
            }
        }

        if overall >= self.threshold {
            insights.push(format!(
                "Confidence {:.0}% meets the {:.0}% target",
                overall * 100.0,
                self.threshold * 100.0
            ));
        } else {
            insights.push(format!(
                "Confidence {:.0}% is {:.0} points below the {:.0}% target",
                overall * 100.0,
                (self.threshold - overall) * 100.0,
                self.threshold * 100.0
            ));
        }

        insights
    }
}

fn average(scores: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = scores.fold((0.0, 0usize), |(s, n), x| (s + x, n + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

fn clarity_score(answer: &Answer) -> f64 {
    let lower = answer.text.to_lowercase();
    let mut score = 0.5;

    score -= 0.1 * count_any(&lower, HEDGE_PHRASES) as f64;
    score += 0.1 * count_any(&lower, DECISIVE_WORDS) as f64;

    let trimmed = lower.trim();
    let bare = trimmed.trim_end_matches(|c: char| c.is_ascii_punctuation());
    if trimmed.len() < 10 && BARE_ANSWERS.contains(&bare) {
        score -= 0.3;
    }

    if list_item_count(&answer.text) >= 2 {
        score += 0.2;
    }

    ((score.clamp(0.0, 1.0) + answer.confidence) / 2.0).clamp(0.0, 1.0)
}

fn completeness_score(answer: &Answer, question: Option<&Question>) -> f64 {
    let word_count = answer.text.split_whitespace().count();
    let mut score: f64 = match word_count {
        0..=4 => 0.2,
        5..=19 => 0.5,
        20..=99 => 0.8,
        100..=199 => 1.0,
        _ => 0.9,
    };

    if let Some(question) = question {
        let parts = question.part_count();
        if parts > 1 && answer_segments(&answer.text) >= parts {
            score += 0.2;
        }
    }

    score.min(1.0)
}

fn answer_segments(text: &str) -> usize {
    text.split(|c| matches!(c, '.' | '\n' | ';' | '?' | '!'))
        .filter(|s| words(s).len() >= 2)
        .count()
}

fn specificity_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    let mut score = 0.5;

    score += (0.1 * technical_hits(text) as f64).min(0.3);
    if text.chars().any(|c| c.is_ascii_digit()) {
        score += 0.1;
    }
    if text.contains('`') || text.contains("()") || (text.contains('{') && text.contains('}')) {
        score += 0.2;
    }
    score -= 0.1 * count_any(&lower, GENERIC_WORDS) as f64;

    score.clamp(0.0, 1.0)
}

fn examples_score(answers: &[Answer]) -> f64 {
    let indicators: usize = answers
        .iter()
        .map(|a| count_any(&a.text.to_lowercase(), EXAMPLE_INDICATORS))
        .sum();

    let mut score = (0.25 * indicators as f64).min(1.0);
    if answers.iter().any(|a| a.text.contains("```")) {
        score += 0.5;
    }
    if answers.iter().any(|a| list_item_count(&a.text) >= 2) {
        score += 0.3;
    }

    score.min(1.0)
}

/// Index pairs of answers that take opposite sides of an antonym pair while
/// talking about the same thing (more than three shared key terms).
pub fn find_contradictions(texts: &[&str]) -> Vec<(usize, usize)> {
    let lowered: Vec<String> = texts.iter().map(|t| t.to_lowercase()).collect();
    let terms: Vec<HashSet<String>> = texts.iter().map(|t| key_terms(t)).collect();

    let mut found = Vec::new();
    for i in 0..texts.len() {
        for j in (i + 1)..texts.len() {
            if terms[i].intersection(&terms[j]).count() <= TOPICAL_OVERLAP {
                continue;
            }
            if opposed(&lowered[i], &lowered[j]) {
                found.push((i, j));
            }
        }
    }
    found
}

fn opposed(a: &str, b: &str) -> bool {
    ANTONYM_PAIRS.iter().any(|(pos, neg)| {
        (asserts(a, pos, neg) && count_phrase(b, neg) > 0)
            || (asserts(b, pos, neg) && count_phrase(a, neg) > 0)
    })
}

/// Up to +0.2, proportional to the share of terms reused across answers
fn terminology_bonus(texts: &[&str]) -> f64 {
    let mut usage: HashMap<String, usize> = HashMap::new();
    for text in texts {
        for term in key_terms(text) {
            *usage.entry(term).or_insert(0) += 1;
        }
    }
    if usage.is_empty() {
        return 0.0;
    }

    let n = texts.len() as f64;
    let shared = usage
        .values()
        .filter(|&&count| count >= 2 && count as f64 / n >= TERMINOLOGY_SHARE)
        .count();

    MAX_TERMINOLOGY_BONUS * shared as f64 / usage.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Priority;

    fn question(category: &str, text: &str) -> Question {
        Question::new(None, "specify", text.to_string(), category, Priority::Critical)
    }

    fn answers_for(questions: &[Question], texts: &[(&str, f64)]) -> Vec<Answer> {
        questions
            .iter()
            .zip(texts)
            .map(|(q, (text, conf))| Answer::new(&q.id, text, *conf))
            .collect()
    }

    fn scenario() -> (Vec<Answer>, Vec<Question>) {
        let questions = vec![
            question("requirements", "What must the system handle?"),
            question("constraints", "What technology constraints apply?"),
            question("edge-cases", "Which edge cases matter?"),
        ];
        let answers = answers_for(
            &questions,
            &[
                ("The system must handle 1000 concurrent users with response times under 200ms.", 0.9),
                ("We will use PostgreSQL with Redis caching.", 0.85),
                ("Edge cases: network failure, concurrent edits. For example, retry with backoff.", 0.9),
            ],
        );
        (answers, questions)
    }

    #[test]
    fn test_empty_input_scores_zero() {
        let result = ConfidenceCalculator::default().calculate(&[], &[]);
        assert_eq!(result.overall, 0.0);
        assert!(result.insights.iter().any(|i| i.contains("No answers")));
        assert_eq!(result.missing.len(), 3);
    }

    #[test]
    fn test_calculation_is_deterministic() {
        let (answers, questions) = scenario();
        let calc = ConfidenceCalculator::default();
        let a = calc.calculate(&answers, &questions);
        let b = calc.calculate(&answers, &questions);
        assert_eq!(a.overall.to_bits(), b.overall.to_bits());
        assert_eq!(a.factors, b.factors);
    }

    #[test]
    fn test_weights_are_normalized() {
        let (answers, questions) = scenario();
        let base = ConfidenceWeights::default();
        let doubled = ConfidenceWeights {
            clarity: base.clarity * 2.0,
            completeness: base.completeness * 2.0,
            specificity: base.specificity * 2.0,
            consistency: base.consistency * 2.0,
            coverage: base.coverage * 2.0,
            examples: base.examples * 2.0,
        };
        assert!((doubled.sum() - 2.0).abs() < 1e-9);

        let a = ConfidenceCalculator::new(base).calculate(&answers, &questions);
        let b = ConfidenceCalculator::new(doubled).calculate(&answers, &questions);
        assert!((a.overall - b.overall).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_weights_fall_back_to_defaults() {
        let zero = ConfidenceWeights {
            clarity: 0.0,
            completeness: 0.0,
            specificity: 0.0,
            consistency: 0.0,
            coverage: 0.0,
            examples: 0.0,
        };
        assert_eq!(zero.normalized(), ConfidenceWeights::default());
    }

    #[test]
    fn test_strong_scenario_converges() {
        let (answers, questions) = scenario();
        let result = ConfidenceCalculator::default().calculate(&answers, &questions);
        assert!(result.overall > 0.7, "overall was {}", result.overall);
        assert!(result.missing.is_empty());
    }

    #[test]
    fn test_bare_yes_is_incomplete() {
        let q = question("requirements", "Is authentication required?");
        let a = Answer::new(&q.id, "Yes", 0.9);
        let result = ConfidenceCalculator::default().calculate(&[a], &[q]);
        assert!(result.factors.completeness < 0.5);
        assert!(result.factors.clarity < 0.6);
    }

    #[test]
    fn test_contradiction_lowers_consistency() {
        let questions = vec![
            question("requirements", "Should sessions be cached?"),
            question("constraints", "Any caching limits?"),
            question("integration", "What does the API return?"),
        ];
        let neutral = "The API returns JSON responses to mobile clients.";
        let contradictory = answers_for(
            &questions,
            &[
                ("We should always cache user session tokens in the redis layer.", 0.8),
                ("We should never cache user session tokens in the redis layer.", 0.8),
                (neutral, 0.8),
            ],
        );
        let agreeing = answers_for(
            &questions,
            &[
                ("We should always cache user session tokens in the redis layer.", 0.8),
                ("We should always cache user session tokens in the redis layer too.", 0.8),
                (neutral, 0.8),
            ],
        );

        let calc = ConfidenceCalculator::default();
        let bad = calc.calculate(&contradictory, &questions).factors.consistency;
        let good = calc.calculate(&agreeing, &questions).factors.consistency;
        assert!(bad < good, "contradictory {} vs agreeing {}", bad, good);
    }

    #[test]
    fn test_consistency_neutral_below_minimum() {
        let q = question("requirements", "What?");
        let a = Answer::new(&q.id, "Always cache everything.", 0.8);
        let result = ConfidenceCalculator::default().calculate(&[a], &[q]);
        assert_eq!(result.factors.consistency, 0.7);
    }

    #[test]
    fn test_find_contradictions_needs_topical_overlap() {
        let texts = ["We always retry.", "We never log."];
        assert!(find_contradictions(&texts).is_empty());

        let texts = [
            "Admins must export billing reports nightly",
            "Admins must not export billing reports nightly",
        ];
        assert_eq!(find_contradictions(&texts), vec![(0, 1)]);
    }

    #[test]
    fn test_hedging_lowers_clarity() {
        let q = question("requirements", "What?");
        let clear = Answer::new(&q.id, "It must always encrypt data at rest.", 0.5);
        let hedged = Answer::new(&q.id, "Maybe it might possibly encrypt data.", 0.5);
        assert!(clarity_score(&clear) > clarity_score(&hedged));
    }

    #[test]
    fn test_structured_answer_gets_clarity_bonus() {
        let q = question("requirements", "What?");
        let flat = Answer::new(&q.id, "login and logout", 0.5);
        let listed = Answer::new(&q.id, "- login\n- logout", 0.5);
        assert!(clarity_score(&listed) > clarity_score(&flat));
    }

    #[test]
    fn test_completeness_bands() {
        let short = Answer::new("q", "one two three", 0.5);
        let medium = Answer::new("q", &"word ".repeat(10), 0.5);
        let long = Answer::new("q", &"word ".repeat(50), 0.5);
        let thorough = Answer::new("q", &"word ".repeat(150), 0.5);
        let rambling = Answer::new("q", &"word ".repeat(250), 0.5);
        assert_eq!(completeness_score(&short, None), 0.2);
        assert_eq!(completeness_score(&medium, None), 0.5);
        assert_eq!(completeness_score(&long, None), 0.8);
        assert_eq!(completeness_score(&thorough, None), 1.0);
        assert_eq!(completeness_score(&rambling, None), 0.9);
    }

    #[test]
    fn test_multi_part_answer_boosts_completeness() {
        let q = question("users", "Who uses it? How often?");
        let a = Answer::new(&q.id, "Finance analysts use it. They log in every morning.", 0.8);
        let single = Answer::new(&q.id, "Finance analysts use it every single morning", 0.8);
        assert!(completeness_score(&a, Some(&q)) > completeness_score(&single, Some(&q)));
    }

    #[test]
    fn test_specificity_signals() {
        assert!(specificity_score("Call `POST /api/v1/jobs` with a 30s timeout") > 0.9);
        assert!(specificity_score("various things and stuff") < 0.5);
    }

    #[test]
    fn test_examples_signals() {
        let plain = [Answer::new("q", "It exports data.", 0.8)];
        let rich = [Answer::new(
            "q",
            "For example, a nightly export such as:\n```\nexport --all\n```",
            0.8,
        )];
        assert_eq!(examples_score(&plain), 0.0);
        assert_eq!(examples_score(&rich), 1.0);
    }

    #[test]
    fn test_coverage_formula() {
        let calc = ConfidenceCalculator::default();
        let questions = vec![question("requirements", "?"), question("users", "?")];
        let expected = 0.7 * (1.0 / 3.0) + 0.3 * (2.0 / 8.0);
        assert!((calc.coverage_score(&questions) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_can_and_cannot_contradict_despite_other_negations() {
        let texts = [
            "Admins can export billing reports nightly but cannot delete them",
            "Admins cannot export billing reports nightly",
        ];
        assert_eq!(find_contradictions(&texts), vec![(0, 1)]);
    }

    #[test]
    fn test_terminology_reuse_bonus() {
        let unrelated = [
            "billing export runs nightly",
            "audit logs stored forever",
            "mobile clients poll hourly",
        ];
        assert_eq!(terminology_bonus(&unrelated), 0.0);

        // billing + export shared by 2 of 3 answers, 9 distinct terms
        let partial = [
            "billing export runs nightly",
            "billing export retries twice",
            "audit logs stored",
        ];
        assert!((terminology_bonus(&partial) - 0.2 * 2.0 / 9.0).abs() < 1e-9);

        let identical = ["billing export runs nightly"; 3];
        assert!((terminology_bonus(&identical) - 0.2).abs() < 1e-9);
    }

    #[test]
    fn test_enumerated_scenarios_count_as_examples() {
        let listed = [Answer::new("q", "- login\n- logout", 0.8)];
        assert_eq!(examples_score(&listed), 0.3);

        let single = [Answer::new("q", "- login", 0.8)];
        assert_eq!(examples_score(&single), 0.0);
    }

    #[test]
    fn test_answered_clarification_leaves_coverage_unchanged() {
        let calc = ConfidenceCalculator::default().with_total_categories(8);
        let base = vec![question("requirements", "What must it do?")];
        let mut clarified = base.clone();
        clarified.push(question(CLARIFICATION_CATEGORY, "What do you mean by fast?"));

        let before = calc.calculate(
            &answers_for(&base, &[("It must export invoices.", 0.8)]),
            &base,
        );
        let after = calc.calculate(
            &answers_for(
                &clarified,
                &[("It must export invoices.", 0.8), ("Under 200ms per request.", 0.8)],
            ),
            &clarified,
        );
        assert_eq!(before.factors.coverage, after.factors.coverage);
    }

    #[test]
    fn test_unmatched_answer_does_not_borrow_claimed_question() {
        let q = question("users", "Who uses it? How often?");
        let stray = Answer::new("not-asked", "Operators use it. They log in nightly.", 0.8);
        let matched = Answer::new(&q.id, "Finance analysts use it. They log in every morning.", 0.8);

        // stray: 0.5 unpaired; matched: 0.5 + 0.2 multi-part
        let result = ConfidenceCalculator::default().calculate(&[stray, matched], &[q]);
        assert!((result.factors.completeness - 0.6).abs() < 1e-9);
    }

    #[test]
    fn test_insight_thresholds() {
        let q = question("users", "Who uses it?");
        let hedged = Answer::new(&q.id, "Maybe, I guess, probably.", 0.1);
        let result = ConfidenceCalculator::default().calculate(&[hedged], &[q.clone()]);
        assert!(result.factors.clarity < 0.5);
        assert!(result.insights.iter().any(|i| i.starts_with("Too much ambiguity")));
        assert!(result.factors.coverage < 0.5);
        assert!(result
            .insights
            .iter()
            .any(|i| i.starts_with("Critical categories not covered") && i.contains("requirements")));
        assert!(!result.insights.iter().any(|i| i.starts_with("Strong")));

        let precise = Answer::new(&q.id, "Call `POST /api/v1/jobs` with a 30s timeout", 0.9);
        let result = ConfidenceCalculator::default().calculate(&[precise], &[q]);
        assert!(result.factors.specificity > 0.8);
        assert!(result.insights.iter().any(|i| i.starts_with("Strong specificity")));
        assert!(!result.insights.iter().any(|i| i.starts_with("Too much ambiguity")));
    }

    #[test]
    fn test_insights_report_gap_to_threshold() {
        let (answers, questions) = scenario();
        let result = ConfidenceCalculator::default()
            .with_threshold(0.95)
            .calculate(&answers, &questions);
        let last = result.insights.last().unwrap();
        assert!(last.contains("below the 95% target"), "{}", last);
    }
}
