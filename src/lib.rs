//! elicit - Adaptive Requirements Elicitation
//!
//! Decides which question to ask next while gathering requirements, scores
//! how well the answers so far pin the problem down, and stops once the
//! answers are good enough or the question budget runs out.
//!
//! # Scoring
//!
//! Six factors, combined with renormalized weights:
//!
//! - **Clarity**: decisive language up, hedging down, blended with the
//!   answerer's own confidence
//! - **Completeness**: answer length against what the question asked for
//! - **Specificity**: numbers, identifiers, technical vocabulary
//! - **Consistency**: shared terms up, contradicting pairs down
//! - **Coverage**: critical categories reached, breadth of categories asked
//! - **Examples**: concrete illustrations anywhere in the answers
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use elicit::{Answer, EngineConfig, QuestionContext, QuestioningEngine};
//!
//! let mut engine = QuestioningEngine::initialize("s1", &base_path, EngineConfig::default()).await?;
//! let ctx = QuestionContext::new("payment reconciliation", "specify");
//!
//! while let Some(question) = engine.generate_next_question(&ctx)? {
//!     let answer = Answer::new(&question.id, &ask(&question.text), 0.8);
//!     let confidence = engine.process_answer(answer.clone());
//!     for follow_up in engine.get_follow_up_questions(&answer) {
//!         // ask these too
//!     }
//! }
//!
//! let stats = engine.close();
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 QuestioningEngine                    │
//! │  generate_next_question() → Selector + Coverage      │
//! │  process_answer()         → Ambiguity + Confidence   │
//! │  get_follow_up_questions()→ Follow-Up Generator      │
//! └──────────┬─────────────────────────────┬─────────────┘
//!            │ TemplateSource              │ QuestionStore (optional)
//!            ▼                             ▼
//!   templates.json / built-in       SQLite sessions.db
//! ```

pub mod ambiguity;
pub mod confidence;
pub mod config;
pub mod coverage;
pub mod db;
pub mod error;
pub mod followup;
pub mod lexicon;
pub mod selector;
pub mod session;
pub mod templates;
pub mod types;

// Core types
pub use error::{QuestioningError, Result};
pub use types::*;

// Session controller
pub use session::{evaluate_status, should_continue, QuestioningEngine};
pub use config::EngineConfig;

// Template catalog
pub use templates::{
    BuiltinSource, JsonFileSource, PhaseRequirement, QuestionTemplate, StaticSource, TemplateData,
    TemplateSource,
};

// Scoring
pub use ambiguity::{clarification_question, detect_ambiguity, first_hedge};
pub use confidence::{find_contradictions, ConfidenceCalculator, ConfidenceWeights};
pub use coverage::{analyze_coverage, find_gaps, CoverageReport};

// Selection
pub use followup::FollowUpGenerator;
pub use selector::{QuestionSelector, SelectionState};

// Persistence
pub use db::{init_db, QuestionRecord, QuestionStore, SessionRecord, SqliteStore};
