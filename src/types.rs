//! Core types for the adaptive questioning loop
//!
//! Templates are blueprints (see `templates`); everything here is created
//! while a session runs and lives only as long as that session.

use crate::coverage::CoverageReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Category used for clarification questions, generated or templated
pub const CLARIFICATION_CATEGORY: &str = "clarification";

/// How urgently a question should be asked
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Base selection score. Tiers are an order of magnitude apart so a
    /// bonus never lets a lower tier leapfrog more than one level.
    pub fn score(&self) -> u32 {
        match self {
            Priority::Critical => 1000,
            Priority::High => 100,
            Priority::Medium => 10,
            Priority::Low => 1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "critical" => Some(Priority::Critical),
            "high" => Some(Priority::High),
            "medium" => Some(Priority::Medium),
            "low" => Some(Priority::Low),
            _ => None,
        }
    }

    /// All tiers, most urgent first
    pub fn tiers() -> [Priority; 4] {
        [Priority::Critical, Priority::High, Priority::Medium, Priority::Low]
    }
}

/// A concrete, rendered question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: String,
    /// Template this question was rendered from; `None` for generated
    /// clarifications
    pub template_id: Option<String>,
    pub phase: String,
    pub text: String,
    pub category: String,
    pub priority: Priority,
    /// Question this one drills into
    pub follow_up_to: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Question {
    pub fn new(
        template_id: Option<String>,
        phase: &str,
        text: String,
        category: &str,
        priority: Priority,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            template_id,
            phase: phase.to_string(),
            text,
            category: category.to_string(),
            priority,
            follow_up_to: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_follow_up_to(mut self, parent_id: &str) -> Self {
        self.follow_up_to = Some(parent_id.to_string());
        self
    }

    /// Number of `?` marks, used to detect multi-part questions
    pub fn part_count(&self) -> usize {
        self.text.matches('?').count()
    }
}

/// A response to a question
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub question_id: String,
    pub text: String,
    /// Self-reported confidence in [0, 1]
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Answer {
    pub fn new(question_id: &str, text: &str, confidence: f64) -> Self {
        Self {
            question_id: question_id.to_string(),
            text: text.to_string(),
            confidence: confidence.clamp(0.0, 1.0),
            timestamp: Utc::now(),
        }
    }
}

/// What the caller knows when asking for the next question
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionContext {
    pub topic: String,
    pub phase: String,
    /// Extra placeholder values for template rendering
    #[serde(default)]
    pub existing_knowledge: HashMap<String, String>,
    /// Overrides the phase's target confidence when set
    #[serde(default)]
    pub target_confidence: Option<f64>,
}

impl QuestionContext {
    pub fn new(topic: &str, phase: &str) -> Self {
        Self {
            topic: topic.to_string(),
            phase: phase.to_string(),
            ..Default::default()
        }
    }

    pub fn with_knowledge(mut self, key: &str, value: &str) -> Self {
        self.existing_knowledge
            .insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_target(mut self, target: f64) -> Self {
        self.target_confidence = Some(target);
        self
    }
}

/// The six independent sub-scores, each in [0, 1]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceFactors {
    pub clarity: f64,
    pub completeness: f64,
    pub specificity: f64,
    pub consistency: f64,
    pub coverage: f64,
    pub examples: f64,
}

impl ConfidenceFactors {
    /// (name, value) pairs in a fixed order
    pub fn named(&self) -> [(&'static str, f64); 6] {
        [
            ("clarity", self.clarity),
            ("completeness", self.completeness),
            ("specificity", self.specificity),
            ("consistency", self.consistency),
            ("coverage", self.coverage),
            ("examples", self.examples),
        ]
    }
}

/// Outcome of one confidence calculation
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfidenceResult {
    pub overall: f64,
    pub factors: ConfidenceFactors,
    /// Critical categories with no asked question
    pub missing: Vec<String>,
    pub insights: Vec<String>,
}

/// Session controller state
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Collecting,
    AwaitingAnswer,
    /// Target confidence met and phase minimum satisfied
    Converged,
    /// Global question ceiling reached
    Exhausted,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Converged | SessionStatus::Exhausted)
    }

    pub fn name(&self) -> &'static str {
        match self {
            SessionStatus::Collecting => "COLLECTING",
            SessionStatus::AwaitingAnswer => "AWAITING_ANSWER",
            SessionStatus::Converged => "CONVERGED",
            SessionStatus::Exhausted => "EXHAUSTED",
        }
    }
}

/// Snapshot of a session's progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestioningStats {
    pub session_id: String,
    pub status: SessionStatus,
    pub total_questions: usize,
    pub answered: usize,
    pub follow_ups: usize,
    pub ambiguous_answers: usize,
    pub current_confidence: f64,
    pub questions_by_category: BTreeMap<String, usize>,
    pub questions_by_phase: BTreeMap<String, usize>,
    /// Coverage of the phase most recently asked about
    pub coverage: Option<CoverageReport>,
    pub persistence_failures: usize,
    pub started_at: DateTime<Utc>,
}
