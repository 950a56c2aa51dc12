//! Session Controller
//!
//! Drives one questioning session:
//!
//! ```text
//! COLLECTING ──next question──▶ AWAITING_ANSWER ──answer──▶ COLLECTING
//!     │                                                        │
//!     └── asked ≥ ceiling ─▶ EXHAUSTED     confidence ≥ target and
//!                                           asked ≥ phase minimum ─▶ CONVERGED
//! ```
//!
//! One engine owns one session's state. It is not shared between callers;
//! build a fresh engine per session. Confidence is recomputed synchronously
//! after every recorded answer, so the score after answer `i` depends only
//! on answers `0..=i`.

use crate::ambiguity::{detect_ambiguity, penalize};
use crate::confidence::ConfidenceCalculator;
use crate::config::EngineConfig;
use crate::coverage::{analyze_coverage, find_gaps};
use crate::db::{QuestionRecord, QuestionStore};
use crate::error::Result;
use crate::followup::FollowUpGenerator;
use crate::selector::{generic_clarification, QuestionSelector, SelectionState};
use crate::templates::{JsonFileSource, QuestionTemplate, TemplateData, TemplateSource};
use crate::types::*;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

/// Where a session stands given its counts. The ceiling wins over
/// everything; below the phase minimum the session keeps collecting no
/// matter how high confidence is.
pub fn evaluate_status(
    asked: usize,
    confidence: f64,
    min_questions: usize,
    target: f64,
    max_questions: usize,
) -> SessionStatus {
    if asked >= max_questions {
        SessionStatus::Exhausted
    } else if asked < min_questions {
        SessionStatus::Collecting
    } else if confidence >= target {
        SessionStatus::Converged
    } else {
        SessionStatus::Collecting
    }
}

pub fn should_continue(
    asked: usize,
    confidence: f64,
    min_questions: usize,
    target: f64,
    max_questions: usize,
) -> bool {
    !evaluate_status(asked, confidence, min_questions, target, max_questions).is_terminal()
}

pub struct QuestioningEngine {
    session_id: String,
    config: EngineConfig,
    catalog: TemplateData,
    status: SessionStatus,

    /// Asked questions in order
    questions: Vec<Question>,
    asked_question_ids: HashSet<String>,
    asked_template_ids: HashSet<String>,
    /// Keys are always asked question ids
    answers: HashMap<String, Answer>,
    answer_order: Vec<String>,
    /// Answers to ids this session never asked; scored, not linked
    unmatched_answers: Vec<Answer>,

    follow_ups: FollowUpGenerator,
    calculator: ConfidenceCalculator,
    confidence: f64,
    last_result: Option<ConfidenceResult>,
    last_context: Option<QuestionContext>,

    ambiguous_answers: usize,
    follow_up_count: usize,

    store: Option<Box<dyn QuestionStore>>,
    persistence_failures: usize,
    started_at: DateTime<Utc>,
}

impl QuestioningEngine {
    /// Load `<base_path>/templates.json` and start a session
    pub async fn initialize(session_id: &str, base_path: &Path, config: EngineConfig) -> Result<Self> {
        Self::with_source(session_id, &JsonFileSource::in_dir(base_path), config).await
    }

    /// Start a session from any template source. Fails if the source cannot
    /// produce a valid catalog.
    pub async fn with_source(
        session_id: &str,
        source: &dyn TemplateSource,
        config: EngineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = source.load().await?;

        info!(
            session = session_id,
            source = %source.describe(),
            templates = catalog.templates.len(),
            phases = catalog.phase_transitions.len(),
            "Questioning session initialized"
        );

        Ok(Self::from_catalog(session_id, catalog, config))
    }

    /// Rebuild a session from its persisted history and keep persisting to
    /// the same store
    pub async fn resume(
        session_id: &str,
        source: &dyn TemplateSource,
        mut config: EngineConfig,
        store: Box<dyn QuestionStore>,
    ) -> Result<Self> {
        config.persist_questions = true;
        let mut engine = Self::with_source(session_id, source, config).await?;

        let fingerprint = engine.catalog.fingerprint()?;
        let topic = match store.session(session_id)? {
            Some(record) => {
                if record.catalog_fingerprint != fingerprint {
                    warn!(
                        session = session_id,
                        "Template catalog changed since this session was recorded"
                    );
                }
                record.topic
            }
            None => String::new(),
        };

        let history = store.load_history(session_id)?;
        engine.restore(history);
        engine.attach_store(store, &topic)?;

        info!(
            session = session_id,
            questions = engine.questions.len(),
            answers = engine.answers.len(),
            confidence = engine.confidence,
            "Questioning session resumed"
        );
        Ok(engine)
    }

    fn from_catalog(session_id: &str, catalog: TemplateData, config: EngineConfig) -> Self {
        let max_depth = config
            .max_follow_up_depth
            .unwrap_or(catalog.follow_up_rules.max_depth);
        let follow_ups =
            FollowUpGenerator::new(max_depth, catalog.follow_up_rules.conditions.short_answer_chars);

        let total_categories = catalog
            .categories()
            .into_iter()
            .filter(|c| *c != CLARIFICATION_CATEGORY)
            .count();
        let calculator = ConfidenceCalculator::new(config.weights)
            .with_min_answers_for_consistency(config.min_answers_for_consistency)
            .with_critical_categories(catalog.adaptive_rules.critical_categories.clone())
            .with_total_categories(total_categories)
            .with_threshold(config.target_confidence);

        Self {
            session_id: session_id.to_string(),
            config,
            catalog,
            status: SessionStatus::Collecting,
            questions: Vec::new(),
            asked_question_ids: HashSet::new(),
            asked_template_ids: HashSet::new(),
            answers: HashMap::new(),
            answer_order: Vec::new(),
            unmatched_answers: Vec::new(),
            follow_ups,
            calculator,
            confidence: 0.0,
            last_result: None,
            last_context: None,
            ambiguous_answers: 0,
            follow_up_count: 0,
            store: None,
            persistence_failures: 0,
            started_at: Utc::now(),
        }
    }

    /// Persist questions and answers to `store`. Writes only happen while
    /// `persist_questions` is enabled in the config.
    pub fn attach_store(&mut self, store: Box<dyn QuestionStore>, topic: &str) -> Result<()> {
        if self.config.persist_questions {
            store.open_session(&self.session_id, topic, &self.catalog.fingerprint()?)?;
        }
        self.store = Some(store);
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn last_result(&self) -> Option<&ConfidenceResult> {
        self.last_result.as_ref()
    }

    pub fn catalog(&self) -> &TemplateData {
        &self.catalog
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Questions asked so far, in order
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn question(&self, question_id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == question_id)
    }

    /// Template an asked question was rendered from
    pub fn template_for(&self, question_id: &str) -> Option<&QuestionTemplate> {
        self.question(question_id)
            .and_then(|q| q.template_id.as_deref())
            .and_then(|id| self.catalog.get(id))
    }

    pub fn asked_count(&self) -> usize {
        self.asked_question_ids.len()
    }

    fn target_for(&self, context_target: Option<f64>, requirement_target: Option<f64>) -> f64 {
        context_target
            .or(requirement_target)
            .unwrap_or(self.config.target_confidence)
    }

    fn phase_categories<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a str> {
        self.questions
            .iter()
            .filter(move |q| q.phase == phase)
            .map(|q| q.category.as_str())
    }

    /// Pick, record, and return the next question. `None` once the session
    /// has converged for this phase or hit the question ceiling.
    pub fn generate_next_question(&mut self, context: &QuestionContext) -> Result<Option<Question>> {
        let requirement = self.catalog.phase(&context.phase)?.clone();
        let target = self.target_for(context.target_confidence, requirement.target_confidence);
        let max_questions = self.config.max_questions_per_session;
        let asked = self.asked_count();
        self.last_context = Some(context.clone());

        let status = evaluate_status(asked, self.confidence, requirement.min_questions, target, max_questions);
        if status.is_terminal() {
            self.transition(status);
            return Ok(None);
        }

        let gaps = find_gaps(&requirement, self.phase_categories(&context.phase));
        let state = SelectionState {
            asked_template_ids: &self.asked_template_ids,
            asked_count: asked,
            max_questions,
            current_confidence: self.confidence,
            target_confidence: target,
        };

        let selected = match QuestionSelector::new(&self.catalog).select_next(context, &state, &gaps) {
            Some(question) => Some(question),
            // The phase minimum holds even when the catalog has nothing left
            None if asked < requirement.min_questions => Some(generic_clarification(context)),
            None => None,
        };

        match selected {
            Some(question) => {
                debug!(
                    session = %self.session_id,
                    question = %question.id,
                    category = %question.category,
                    gaps = ?gaps,
                    "Asking question"
                );
                self.register(question.clone());
                self.persist_question(&question);
                self.transition(SessionStatus::AwaitingAnswer);
                Ok(Some(question))
            }
            None => {
                let status = evaluate_status(asked, self.confidence, 0, target, max_questions);
                self.transition(status);
                Ok(None)
            }
        }
    }

    /// Record an answer and return the recomputed overall confidence.
    ///
    /// Ambiguous answers lose `ambiguity_penalty` of their self-reported
    /// confidence before scoring. Answers to unknown question ids are scored
    /// but not linked to any template.
    pub fn process_answer(&mut self, mut answer: Answer) -> f64 {
        if detect_ambiguity(&answer.text) {
            answer.confidence = penalize(answer.confidence, self.config.ambiguity_penalty);
            self.ambiguous_answers += 1;
        }

        if self.asked_question_ids.contains(&answer.question_id) {
            self.persist_answer(&answer);
            let id = answer.question_id.clone();
            if self.answers.insert(id.clone(), answer).is_none() {
                self.answer_order.push(id);
            }
        } else {
            warn!(
                session = %self.session_id,
                question = %answer.question_id,
                "Answer references a question this session never asked"
            );
            self.unmatched_answers.push(answer);
        }

        self.recompute();

        let next = match self.last_context.as_ref() {
            Some(context) => {
                let phase = self.catalog.phase(&context.phase).ok();
                let min_questions = phase.map_or(0, |p| p.min_questions);
                let target = self.target_for(
                    context.target_confidence,
                    phase.and_then(|p| p.target_confidence),
                );
                evaluate_status(
                    self.asked_count(),
                    self.confidence,
                    min_questions,
                    target,
                    self.config.max_questions_per_session,
                )
            }
            None => SessionStatus::Collecting,
        };
        self.transition(next);

        self.confidence
    }

    /// Follow-up questions for an answer, recorded as asked. Bounded by the
    /// follow-up depth limit and the remaining question budget.
    pub fn get_follow_up_questions(&mut self, answer: &Answer) -> Vec<Question> {
        let parent = match self.question(&answer.question_id) {
            Some(q) => q.clone(),
            None => {
                warn!(question = %answer.question_id, "No follow-ups for an unknown question");
                return Vec::new();
            }
        };

        let context = self
            .last_context
            .clone()
            .unwrap_or_else(|| QuestionContext::new("", &parent.phase));
        let template = parent
            .template_id
            .as_deref()
            .and_then(|id| self.catalog.get(id));

        let mut questions = self.follow_ups.expand(
            answer,
            &parent,
            template,
            &self.catalog,
            &context,
            &self.asked_template_ids,
        );

        let remaining = self
            .config
            .max_questions_per_session
            .saturating_sub(self.asked_count());
        questions.truncate(remaining);

        for question in &questions {
            self.register(question.clone());
            self.persist_question(question);
            self.follow_up_count += 1;
        }
        if !questions.is_empty() {
            self.transition(SessionStatus::AwaitingAnswer);
        }
        questions
    }

    /// Up to `count` questions for a phase, sampled across priority tiers.
    /// Does not touch session state.
    pub fn generate_questions(&self, topic: &str, phase: &str, count: usize) -> Result<Vec<Question>> {
        self.catalog.phase(phase)?;
        let context = QuestionContext::new(topic, phase);
        Ok(QuestionSelector::new(&self.catalog).sample_tiers(&context, count))
    }

    pub fn should_continue_questioning(&self, phase: &str) -> Result<bool> {
        let requirement = self.catalog.phase(phase)?;
        let context_target = self.last_context.as_ref().and_then(|c| c.target_confidence);
        let target = self.target_for(context_target, requirement.target_confidence);
        Ok(should_continue(
            self.asked_count(),
            self.confidence,
            requirement.min_questions,
            target,
            self.config.max_questions_per_session,
        ))
    }

    pub fn get_stats(&self) -> QuestioningStats {
        let mut by_category = BTreeMap::new();
        let mut by_phase = BTreeMap::new();
        for q in &self.questions {
            *by_category.entry(q.category.clone()).or_insert(0) += 1;
            *by_phase.entry(q.phase.clone()).or_insert(0) += 1;
        }

        let coverage = self.last_context.as_ref().and_then(|context| {
            let requirement = self.catalog.phase(&context.phase).ok()?;
            Some(analyze_coverage(
                &context.phase,
                requirement,
                self.phase_categories(&context.phase),
            ))
        });

        QuestioningStats {
            session_id: self.session_id.clone(),
            status: self.status,
            total_questions: self.questions.len(),
            answered: self.answers.len(),
            follow_ups: self.follow_up_count,
            ambiguous_answers: self.ambiguous_answers,
            current_confidence: self.confidence,
            questions_by_category: by_category,
            questions_by_phase: by_phase,
            coverage,
            persistence_failures: self.persistence_failures,
            started_at: self.started_at,
        }
    }

    /// End the session and return its final stats
    pub fn close(mut self) -> QuestioningStats {
        if self.config.persist_questions {
            let result = match self.store.as_deref() {
                Some(store) => store.close_session(&self.session_id),
                None => Ok(()),
            };
            self.record_persistence(result, "close");
        }

        let stats = self.get_stats();
        info!(
            session = %self.session_id,
            status = stats.status.name(),
            questions = stats.total_questions,
            answered = stats.answered,
            confidence = stats.current_confidence,
            "Questioning session closed"
        );
        stats
    }

    fn register(&mut self, question: Question) {
        let depth = self.follow_ups.depth_for(question.follow_up_to.as_deref());
        if depth > 0 {
            self.follow_ups.record_depth(&question.id, depth);
        }
        self.asked_question_ids.insert(question.id.clone());
        if let Some(template_id) = &question.template_id {
            self.asked_template_ids.insert(template_id.clone());
        }
        self.questions.push(question);
    }

    fn restore(&mut self, history: Vec<QuestionRecord>) {
        for record in history {
            if record.question.follow_up_to.is_some() {
                self.follow_up_count += 1;
            }
            self.register(record.question);
            if let Some(answer) = record.answer {
                if detect_ambiguity(&answer.text) {
                    self.ambiguous_answers += 1;
                }
                self.answer_order.push(answer.question_id.clone());
                self.answers.insert(answer.question_id.clone(), answer);
            }
        }
        self.recompute();
    }

    fn recompute(&mut self) {
        let mut answers = Vec::with_capacity(self.answer_order.len() + self.unmatched_answers.len());
        let mut questions = Vec::with_capacity(self.answer_order.len());
        for id in &self.answer_order {
            if let (Some(answer), Some(question)) = (self.answers.get(id), self.question(id)) {
                answers.push(answer.clone());
                questions.push(question.clone());
            }
        }
        answers.extend(self.unmatched_answers.iter().cloned());

        let target = match self.last_context.as_ref() {
            Some(context) => {
                let phase_target = self
                    .catalog
                    .phase(&context.phase)
                    .ok()
                    .and_then(|p| p.target_confidence);
                self.target_for(context.target_confidence, phase_target)
            }
            None => self.config.target_confidence,
        };

        let result = self
            .calculator
            .clone()
            .with_threshold(target)
            .calculate(&answers, &questions);
        self.confidence = result.overall;
        self.last_result = Some(result);
    }

    fn transition(&mut self, next: SessionStatus) {
        if next != self.status && next.is_terminal() {
            info!(
                session = %self.session_id,
                status = next.name(),
                asked = self.asked_count(),
                confidence = self.confidence,
                "Questioning session reached terminal state"
            );
        }
        self.status = next;
    }

    fn persist_question(&mut self, question: &Question) {
        if !self.config.persist_questions {
            return;
        }
        let result = match self.store.as_deref() {
            Some(store) => store.store_question(&self.session_id, question),
            None => return,
        };
        self.record_persistence(result, "question");
    }

    fn persist_answer(&mut self, answer: &Answer) {
        if !self.config.persist_questions {
            return;
        }
        let result = match self.store.as_deref() {
            Some(store) => store.store_answer(&answer.question_id, &answer.text, answer.confidence),
            None => return,
        };
        self.record_persistence(result, "answer");
    }

    /// Persistence failures never interrupt scoring
    fn record_persistence(&mut self, result: Result<()>, what: &str) {
        if let Err(e) = result {
            self.persistence_failures += 1;
            warn!(session = %self.session_id, write = what, error = %e, "Persistence write failed");
        }
    }
}
