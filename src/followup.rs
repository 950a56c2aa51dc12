//! Follow-Up Generator
//!
//! Expands a template's linked follow-ups after an answer:
//! - ambiguous answer: only follow-ups in the `clarification` category,
//!   or a generated clarification when the template links none
//! - short answer (< `shortAnswerChars`): every configured follow-up
//! - otherwise: the first follow-up only
//!
//! Each follow-up sits one level deeper than the question it drills into.
//! Questions at `max_depth` are not expanded further.

use crate::ambiguity::{clarification_question, detect_ambiguity};
use crate::templates::{render_text, QuestionTemplate, TemplateData};
use crate::types::{Answer, Question, QuestionContext};
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FollowUpGenerator {
    max_depth: u32,
    short_answer_chars: usize,
    /// question id -> depth in its follow-up chain (roots are 0)
    depths: HashMap<String, u32>,
}

impl FollowUpGenerator {
    pub fn new(max_depth: u32, short_answer_chars: usize) -> Self {
        Self {
            max_depth,
            short_answer_chars,
            depths: HashMap::new(),
        }
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn depth(&self, question_id: &str) -> u32 {
        self.depths.get(question_id).copied().unwrap_or(0)
    }

    /// Record a question's depth, e.g. when restoring a session
    pub fn record_depth(&mut self, question_id: &str, depth: u32) {
        self.depths
            .insert(question_id.to_string(), depth.min(self.max_depth));
    }

    /// Depth for a question linked to `parent`, or 0 for a root
    pub fn depth_for(&self, parent: Option<&str>) -> u32 {
        parent.map_or(0, |p| self.depth(p) + 1)
    }

    /// Which linked templates an answer calls for
    pub fn choose<'t>(
        &self,
        answer: &Answer,
        template: &'t QuestionTemplate,
        catalog: &'t TemplateData,
    ) -> Vec<&'t QuestionTemplate> {
        let linked = template.follow_ups.iter().filter_map(|id| catalog.get(id));

        if detect_ambiguity(&answer.text) {
            linked.filter(|t| t.is_clarification()).collect()
        } else if answer.text.trim().chars().count() < self.short_answer_chars {
            linked.collect()
        } else {
            linked.take(1).collect()
        }
    }

    /// Follow-up questions for `answer` to `parent`. Templates in `exclude`
    /// are skipped. Returned questions have their depth recorded.
    pub fn expand(
        &mut self,
        answer: &Answer,
        parent: &Question,
        template: Option<&QuestionTemplate>,
        catalog: &TemplateData,
        context: &QuestionContext,
        exclude: &HashSet<String>,
    ) -> Vec<Question> {
        let parent_depth = self.depth(&parent.id);
        if parent_depth >= self.max_depth {
            debug!(question = %parent.id, depth = parent_depth, "Follow-up depth limit reached");
            return Vec::new();
        }

        let mut questions: Vec<Question> = template
            .map(|t| self.choose(answer, t, catalog))
            .unwrap_or_default()
            .into_iter()
            .filter(|t| !exclude.contains(&t.id))
            .map(|t| {
                Question::new(
                    Some(t.id.clone()),
                    &parent.phase,
                    render_text(&t.text, &context.topic, &context.existing_knowledge),
                    &t.category,
                    t.priority,
                )
                .with_follow_up_to(&parent.id)
            })
            .collect();

        if questions.is_empty() {
            let clarification_template = catalog.adaptive_rules.clarification_template.as_deref();
            if let Some(q) =
                clarification_question(answer, parent, &context.topic, clarification_template)
            {
                questions.push(q);
            }
        }

        for q in &questions {
            self.depths.insert(q.id.clone(), parent_depth + 1);
        }

        debug!(
            question = %parent.id,
            generated = questions.len(),
            depth = parent_depth + 1,
            "Expanded follow-ups"
        );
        questions
    }
}
