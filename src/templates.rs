//! Template Catalog: question blueprints, phase requirements, and the rules
//! that drive selection and follow-up expansion.
//!
//! A catalog is loaded once per session through a `TemplateSource` and is
//! read-only afterwards. There is no fallback catalog: a source that fails
//! to load fails the session. `BuiltinSource` exists for callers that want
//! the shipped catalog on purpose.

use crate::error::{QuestioningError, Result};
use crate::types::{Priority, CLARIFICATION_CATEGORY};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// File name looked up under a session's base path
pub const DEFAULT_TEMPLATE_FILE: &str = "templates.json";

const BUILTIN_CATALOG: &str = include_str!("../data/templates.json");

/// A reusable question blueprint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTemplate {
    pub id: String,
    /// Text with `{topic}` and `{knowledge-key}` placeholders
    pub text: String,
    pub category: String,
    /// Phases this template may be selected in. Empty means the template is
    /// only reachable as a follow-up.
    #[serde(default)]
    pub phases: Vec<String>,
    pub priority: Priority,
    #[serde(default)]
    pub follow_ups: Vec<String>,
}

impl QuestionTemplate {
    pub fn applies_to(&self, phase: &str) -> bool {
        self.phases.iter().any(|p| p == phase)
    }

    pub fn is_clarification(&self) -> bool {
        self.category == CLARIFICATION_CATEGORY
    }

    /// Substitute `{topic}` and any known placeholders
    pub fn render(&self, topic: &str, knowledge: &HashMap<String, String>) -> String {
        render_text(&self.text, topic, knowledge)
    }
}

pub(crate) fn render_text(text: &str, topic: &str, knowledge: &HashMap<String, String>) -> String {
    let mut rendered = text.replace("{topic}", topic);
    for (key, value) in knowledge {
        rendered = rendered.replace(&format!("{{{}}}", key), value);
    }
    rendered
}

/// Per-phase gating rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseRequirement {
    pub min_questions: usize,
    /// category -> minimum number of asked questions
    #[serde(default)]
    pub min_coverage: BTreeMap<String, usize>,
    /// Falls back to the engine's configured target when absent
    #[serde(default)]
    pub target_confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpConditions {
    /// Answers shorter than this get every configured follow-up
    #[serde(default = "default_short_answer_chars")]
    pub short_answer_chars: usize,
}

fn default_short_answer_chars() -> usize {
    50
}

impl Default for FollowUpConditions {
    fn default() -> Self {
        Self {
            short_answer_chars: default_short_answer_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpRules {
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default)]
    pub conditions: FollowUpConditions,
}

fn default_max_depth() -> u32 {
    3
}

impl Default for FollowUpRules {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            conditions: FollowUpConditions::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveRules {
    /// Below this confidence the boost list gets a selection bonus
    #[serde(default = "default_low_confidence_threshold")]
    pub low_confidence_threshold: f64,
    #[serde(default)]
    pub low_confidence_boost: Vec<String>,
    /// Categories the coverage factor weighs most heavily
    #[serde(default = "default_critical_categories")]
    pub critical_categories: Vec<String>,
    /// Rendered for ambiguous answers; `{context}` and `{topic}` available
    #[serde(default)]
    pub clarification_template: Option<String>,
}

fn default_low_confidence_threshold() -> f64 {
    0.5
}

pub fn default_critical_categories() -> Vec<String> {
    vec![
        "requirements".to_string(),
        "constraints".to_string(),
        "edge-cases".to_string(),
    ]
}

impl Default for AdaptiveRules {
    fn default() -> Self {
        Self {
            low_confidence_threshold: default_low_confidence_threshold(),
            low_confidence_boost: Vec::new(),
            critical_categories: default_critical_categories(),
            clarification_template: None,
        }
    }
}

/// Everything a template source provides
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateData {
    pub templates: Vec<QuestionTemplate>,
    #[serde(default)]
    pub follow_up_rules: FollowUpRules,
    pub phase_transitions: BTreeMap<String, PhaseRequirement>,
    #[serde(default)]
    pub adaptive_rules: AdaptiveRules,
}

impl TemplateData {
    /// Parse and validate a JSON catalog
    pub fn from_json(json: &str) -> Result<Self> {
        let data: TemplateData = serde_json::from_str(json)?;
        data.validate()?;
        Ok(data)
    }

    /// The catalog shipped with the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_CATALOG)
    }

    pub fn validate(&self) -> Result<()> {
        if self.templates.is_empty() {
            return Err(QuestioningError::template_load("catalog contains no templates"));
        }
        if self.phase_transitions.is_empty() {
            return Err(QuestioningError::config("catalog declares no phases"));
        }

        let mut ids = HashSet::new();
        for template in &self.templates {
            if !ids.insert(template.id.as_str()) {
                return Err(QuestioningError::config(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
        }

        for template in &self.templates {
            for phase in &template.phases {
                if !self.phase_transitions.contains_key(phase) {
                    return Err(QuestioningError::config(format!(
                        "template '{}' references undeclared phase '{}'",
                        template.id, phase
                    )));
                }
            }
            for follow_up in &template.follow_ups {
                if !ids.contains(follow_up.as_str()) {
                    return Err(QuestioningError::config(format!(
                        "template '{}' has unknown follow-up '{}'",
                        template.id, follow_up
                    )));
                }
            }
        }

        for (phase, req) in &self.phase_transitions {
            if let Some(target) = req.target_confidence {
                if !(0.0..=1.0).contains(&target) {
                    return Err(QuestioningError::config(format!(
                        "phase '{}' target confidence {} outside [0, 1]",
                        phase, target
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&QuestionTemplate> {
        self.templates.iter().find(|t| t.id == id)
    }

    /// Requirement for a declared phase
    pub fn phase(&self, phase: &str) -> Result<&PhaseRequirement> {
        self.phase_transitions
            .get(phase)
            .ok_or_else(|| QuestioningError::UnknownPhase(phase.to_string()))
    }

    pub fn phase_names(&self) -> Vec<&str> {
        self.phase_transitions.keys().map(String::as_str).collect()
    }

    /// Templates selectable in a phase, in catalog order
    pub fn for_phase<'a>(&'a self, phase: &'a str) -> impl Iterator<Item = &'a QuestionTemplate> {
        self.templates.iter().filter(move |t| t.applies_to(phase))
    }

    /// Distinct categories across the catalog
    pub fn categories(&self) -> BTreeSet<&str> {
        self.templates.iter().map(|t| t.category.as_str()).collect()
    }

    /// Hex SHA-256 of the catalog's canonical JSON
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&canonical)))
    }
}

/// Provides a catalog. Loaded once, at session start.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn load(&self) -> Result<TemplateData>;

    /// Human-readable origin, for logs
    fn describe(&self) -> String;
}

/// Reads a JSON catalog from disk
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<base_path>/templates.json`
    pub fn in_dir(base_path: &Path) -> Self {
        Self::new(base_path.join(DEFAULT_TEMPLATE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TemplateSource for JsonFileSource {
    async fn load(&self) -> Result<TemplateData> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            QuestioningError::template_load(format!("cannot read {:?}: {}", self.path, e))
        })?;
        TemplateData::from_json(&content)
    }

    fn describe(&self) -> String {
        format!("file {:?}", self.path)
    }
}

/// Serves an in-memory catalog
#[derive(Debug, Clone)]
pub struct StaticSource {
    data: TemplateData,
}

impl StaticSource {
    pub fn new(data: TemplateData) -> Self {
        Self { data }
    }
}

#[async_trait]
impl TemplateSource for StaticSource {
    async fn load(&self) -> Result<TemplateData> {
        self.data.validate()?;
        Ok(self.data.clone())
    }

    fn describe(&self) -> String {
        format!("static catalog ({} templates)", self.data.templates.len())
    }
}

/// The catalog compiled into the crate
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSource;

#[async_trait]
impl TemplateSource for BuiltinSource {
    async fn load(&self) -> Result<TemplateData> {
        TemplateData::builtin()
    }

    fn describe(&self) -> String {
        "builtin catalog".to_string()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small catalog shared by tests across the crate
    pub(crate) fn sample_catalog() -> TemplateData {
        TemplateData::from_json(
            r#"{
            "templates": [
                {"id": "req-core", "text": "What must {topic} do?", "category": "requirements",
                 "phases": ["specify"], "priority": "critical", "followUps": ["req-detail", "clar-terms"]},
                {"id": "con-limits", "text": "What limits apply to {topic}?", "category": "constraints",
                 "phases": ["specify"], "priority": "high"},
                {"id": "edge-fail", "text": "How should {topic} fail?", "category": "edge-cases",
                 "phases": ["specify"], "priority": "medium"},
                {"id": "ctx-users", "text": "Who uses {topic} at {company}?", "category": "users",
                 "phases": ["specify", "brainstorm"], "priority": "low"},
                {"id": "req-detail", "text": "Which {topic} requirement matters most?", "category": "requirements",
                 "phases": [], "priority": "high"},
                {"id": "clar-terms", "text": "Which terms in your {topic} answer need defining?", "category": "clarification",
                 "phases": [], "priority": "critical"}
            ],
            "followUpRules": {"maxDepth": 2, "conditions": {"shortAnswerChars": 50}},
            "phaseTransitions": {
                "specify": {"minQuestions": 3, "minCoverage": {"requirements": 1, "constraints": 1, "edge-cases": 1}, "targetConfidence": 0.7},
                "brainstorm": {"minQuestions": 1, "targetConfidence": 0.5}
            },
            "adaptiveRules": {"lowConfidenceThreshold": 0.5, "lowConfidenceBoost": ["edge-cases"]}
        }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_builtin_catalog_is_valid() {
        let data = TemplateData::builtin().unwrap();
        assert!(data.templates.len() >= 20);
        for phase in ["brainstorm", "specify", "plan", "validate"] {
            assert!(data.phase(phase).is_ok(), "missing phase {}", phase);
            assert!(data.for_phase(phase).count() > 0, "no templates for {}", phase);
        }
    }

    #[test]
    fn test_render_substitutes_topic_and_knowledge() {
        let data = sample_catalog();
        let template = data.get("ctx-users").unwrap();
        let mut knowledge = HashMap::new();
        knowledge.insert("company".to_string(), "Acme".to_string());
        assert_eq!(template.render("billing", &knowledge), "Who uses billing at Acme?");
        assert_eq!(
            template.render("billing", &HashMap::new()),
            "Who uses billing at {company}?"
        );
    }

    #[test]
    fn test_unknown_phase_is_error() {
        let data = sample_catalog();
        let err = data.phase("deploy").unwrap_err();
        assert!(matches!(err, QuestioningError::UnknownPhase(p) if p == "deploy"));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut data = sample_catalog();
        let dup = data.templates[0].clone();
        data.templates.push(dup);
        assert!(matches!(data.validate(), Err(QuestioningError::Config(_))));
    }

    #[test]
    fn test_unknown_follow_up_rejected() {
        let mut data = sample_catalog();
        data.templates[1].follow_ups.push("missing".to_string());
        assert!(data.validate().is_err());
    }

    #[test]
    fn test_unknown_priority_rejected() {
        let json = r#"{"templates": [{"id": "a", "text": "?", "category": "x", "priority": "urgent"}],
                       "phaseTransitions": {"p": {"minQuestions": 1}}}"#;
        assert!(matches!(
            TemplateData::from_json(json),
            Err(QuestioningError::Serialization(_))
        ));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let json = r#"{"templates": [], "phaseTransitions": {"p": {"minQuestions": 1}}}"#;
        assert!(matches!(
            TemplateData::from_json(json),
            Err(QuestioningError::TemplateLoad(_))
        ));
    }

    #[test]
    fn test_for_phase_filters_in_catalog_order() {
        let data = sample_catalog();
        let ids: Vec<_> = data.for_phase("specify").map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["req-core", "con-limits", "edge-fail", "ctx-users"]);
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = sample_catalog().fingerprint().unwrap();
        let b = sample_catalog().fingerprint().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let mut changed = sample_catalog();
        changed.templates[0].text.push('!');
        assert_ne!(a, changed.fingerprint().unwrap());
    }

    #[test]
    fn test_missing_file_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileSource::in_dir(dir.path());
        let result = tokio_test::block_on(source.load());
        assert!(matches!(result, Err(QuestioningError::TemplateLoad(_))));
    }

    #[test]
    fn test_file_source_loads_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let json = serde_json::to_string(&sample_catalog()).unwrap();
        std::fs::write(dir.path().join(DEFAULT_TEMPLATE_FILE), json).unwrap();
        let data = tokio_test::block_on(JsonFileSource::in_dir(dir.path()).load()).unwrap();
        assert_eq!(data, sample_catalog());
    }
}
