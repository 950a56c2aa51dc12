//! Question Selector
//!
//! Ranks unused templates for the current phase:
//!
//! ```text
//! score = priority (critical 1000, high 100, medium 10, low 1)
//!       + 500 if the category is a coverage gap
//!       + 200 if confidence is low and the category is boosted
//! ```
//!
//! The best template is rendered into a fresh `Question`. Ties go to the
//! template listed first in the catalog.

use crate::templates::{QuestionTemplate, TemplateData};
use crate::types::{Priority, Question, QuestionContext, CLARIFICATION_CATEGORY};
use std::collections::HashSet;
use tracing::debug;

pub const GAP_BONUS: u32 = 500;
pub const ADAPTIVE_BONUS: u32 = 200;

const GENERIC_CLARIFICATION: &str =
    "Is there anything about {topic} we haven't covered that could change the requirements?";

/// Session facts the selector needs besides the caller's context
#[derive(Debug, Clone, Copy)]
pub struct SelectionState<'a> {
    pub asked_template_ids: &'a HashSet<String>,
    pub asked_count: usize,
    pub max_questions: usize,
    pub current_confidence: f64,
    pub target_confidence: f64,
}

pub struct QuestionSelector<'a> {
    catalog: &'a TemplateData,
}

impl<'a> QuestionSelector<'a> {
    pub fn new(catalog: &'a TemplateData) -> Self {
        Self { catalog }
    }

    pub fn score(&self, template: &QuestionTemplate, coverage_gaps: &[String], confidence: f64) -> u32 {
        let rules = &self.catalog.adaptive_rules;
        let mut score = template.priority.score();

        if coverage_gaps.iter().any(|g| *g == template.category) {
            score += GAP_BONUS;
        }
        if confidence < rules.low_confidence_threshold
            && rules.low_confidence_boost.iter().any(|c| *c == template.category)
        {
            score += ADAPTIVE_BONUS;
        }

        score
    }

    /// Next question, or `None` when the ceiling is reached or the catalog is
    /// exhausted with the target already met. An exhausted catalog below
    /// target yields a generic clarification instead.
    pub fn select_next(
        &self,
        context: &QuestionContext,
        state: &SelectionState<'_>,
        coverage_gaps: &[String],
    ) -> Option<Question> {
        if state.asked_count >= state.max_questions {
            return None;
        }

        let mut best: Option<(&QuestionTemplate, u32)> = None;
        for template in self.catalog.for_phase(&context.phase) {
            if state.asked_template_ids.contains(&template.id) {
                continue;
            }
            let score = self.score(template, coverage_gaps, state.current_confidence);
            if best.map_or(true, |(_, s)| score > s) {
                best = Some((template, score));
            }
        }

        match best {
            Some((template, score)) => {
                debug!(
                    template = %template.id,
                    category = %template.category,
                    score = score,
                    "Selected template"
                );
                Some(instantiate(template, context))
            }
            None if state.current_confidence < state.target_confidence => {
                debug!(phase = %context.phase, "Templates exhausted below target, asking for clarification");
                Some(generic_clarification(context))
            }
            None => None,
        }
    }

    /// Up to `count` questions for a phase without session state: one from
    /// each priority tier per round, most urgent tier first, catalog order
    /// within a tier.
    pub fn sample_tiers(&self, context: &QuestionContext, count: usize) -> Vec<Question> {
        let mut tiers: Vec<Vec<&QuestionTemplate>> = Priority::tiers()
            .iter()
            .map(|tier| {
                self.catalog
                    .for_phase(&context.phase)
                    .filter(|t| t.priority == *tier)
                    .collect()
            })
            .collect();
        for tier in &mut tiers {
            tier.reverse();
        }

        let mut questions = Vec::with_capacity(count);
        while questions.len() < count {
            let mut took_any = false;
            for tier in tiers.iter_mut() {
                if questions.len() >= count {
                    break;
                }
                if let Some(template) = tier.pop() {
                    questions.push(instantiate(template, context));
                    took_any = true;
                }
            }
            if !took_any {
                break;
            }
        }
        questions
    }
}

/// Render a template into a new question for the context's phase
pub fn instantiate(template: &QuestionTemplate, context: &QuestionContext) -> Question {
    Question::new(
        Some(template.id.clone()),
        &context.phase,
        template.render(&context.topic, &context.existing_knowledge),
        &template.category,
        template.priority,
    )
}

pub fn generic_clarification(context: &QuestionContext) -> Question {
    Question::new(
        None,
        &context.phase,
        GENERIC_CLARIFICATION.replace("{topic}", &context.topic),
        CLARIFICATION_CATEGORY,
        Priority::High,
    )
}
