//! Coverage Analyzer
//!
//! Compares how many questions of each category have been asked against a
//! phase's `minCoverage` requirements. Pure: depends only on the asked
//! categories and the static phase requirement.

use crate::templates::PhaseRequirement;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-phase coverage snapshot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoverageReport {
    pub phase: String,
    /// Asked questions per category
    pub tallies: BTreeMap<String, usize>,
    /// Required minimum per category
    pub required: BTreeMap<String, usize>,
    /// Categories still below their minimum
    pub gaps: Vec<String>,
    /// Fraction of required categories already satisfied (1.0 when none
    /// are required)
    pub satisfied_ratio: f64,
}

/// Count asked questions per category
pub fn tally<'a>(categories: impl IntoIterator<Item = &'a str>) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for category in categories {
        *counts.entry(category.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Required categories whose tally is below the phase minimum, in
/// category-name order
pub fn find_gaps<'a>(
    requirement: &PhaseRequirement,
    asked_categories: impl IntoIterator<Item = &'a str>,
) -> Vec<String> {
    gaps_from_tallies(requirement, &tally(asked_categories))
}

fn gaps_from_tallies(requirement: &PhaseRequirement, tallies: &BTreeMap<String, usize>) -> Vec<String> {
    requirement
        .min_coverage
        .iter()
        .filter(|(category, min)| tallies.get(*category).copied().unwrap_or(0) < **min)
        .map(|(category, _)| category.clone())
        .collect()
}

pub fn analyze_coverage<'a>(
    phase: &str,
    requirement: &PhaseRequirement,
    asked_categories: impl IntoIterator<Item = &'a str>,
) -> CoverageReport {
    let tallies = tally(asked_categories);
    let gaps = gaps_from_tallies(requirement, &tallies);

    let required = requirement.min_coverage.len();
    let satisfied_ratio = if required == 0 {
        1.0
    } else {
        (required - gaps.len()) as f64 / required as f64
    };

    CoverageReport {
        phase: phase.to_string(),
        tallies,
        required: requirement.min_coverage.clone(),
        gaps,
        satisfied_ratio,
    }
}
