//! Scoring model.
//!
//! Every category starts at 100. Each finding deducts its severity's base
//! points, divided by `1 + 0.3 × (findings already counted in the
//! category)`, so repeated findings of one kind weigh less and less.
//! The overall score is the weighted sum of the category scores.

use crate::analyzer::types::{Finding, ManifestFamily, RuleCategory, Severity};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Damping applied per prior finding in the same category.
pub const DIMINISHING_FACTOR: f64 = 0.3;

/// Points a finding of each severity deducts before damping.
pub fn base_points(severity: Severity) -> f64 {
    match severity {
        Severity::Error => 15.0,
        Severity::Warning => 6.0,
        Severity::Info => 2.0,
    }
}

/// Category weights for a family. They add up to 100.
pub fn weights(family: ManifestFamily) -> &'static [(RuleCategory, f64)] {
    match family {
        ManifestFamily::Kubernetes => &[
            (RuleCategory::Schema, 25.0),
            (RuleCategory::Security, 30.0),
            (RuleCategory::Reliability, 20.0),
            (RuleCategory::BestPractice, 10.0),
            (RuleCategory::CrossResource, 15.0),
        ],
        ManifestFamily::Compose => &[
            (RuleCategory::Schema, 25.0),
            (RuleCategory::Security, 25.0),
            (RuleCategory::Reliability, 15.0),
            (RuleCategory::BestPractice, 10.0),
            (RuleCategory::CrossResource, 10.0),
            (RuleCategory::Style, 5.0),
            (RuleCategory::Semantic, 10.0),
        ],
    }
}

/// Letter grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "B+")]
    BPlus,
    B,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "C+")]
    CPlus,
    C,
    #[serde(rename = "C-")]
    CMinus,
    D,
    F,
}

const GRADE_FLOORS: &[(f64, Grade)] = &[
    (97.0, Grade::APlus),
    (93.0, Grade::A),
    (90.0, Grade::AMinus),
    (87.0, Grade::BPlus),
    (83.0, Grade::B),
    (80.0, Grade::BMinus),
    (77.0, Grade::CPlus),
    (73.0, Grade::C),
    (70.0, Grade::CMinus),
    (60.0, Grade::D),
];

impl Grade {
    pub fn from_score(score: f64) -> Self {
        GRADE_FLOORS
            .iter()
            .find(|(floor, _)| score >= *floor)
            .map(|(_, grade)| *grade)
            .unwrap_or(Grade::F)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::APlus => "A+",
            Self::A => "A",
            Self::AMinus => "A-",
            Self::BPlus => "B+",
            Self::B => "B",
            Self::BMinus => "B-",
            Self::CPlus => "C+",
            Self::C => "C",
            Self::CMinus => "C-",
            Self::D => "D",
            Self::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Score of one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryScore {
    pub category: RuleCategory,
    pub score: f64,
    pub weight: f64,
    pub findings: usize,
}

/// The score of one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Score {
    pub overall: f64,
    pub grade: Grade,
    pub categories: Vec<CategoryScore>,
}

impl Score {
    /// Score of an input that could not be parsed.
    pub fn failed(family: ManifestFamily) -> Self {
        Self {
            overall: 0.0,
            grade: Grade::F,
            categories: weights(family)
                .iter()
                .map(|&(category, weight)| CategoryScore {
                    category,
                    score: 0.0,
                    weight,
                    findings: 0,
                })
                .collect(),
        }
    }

    /// Score of one category, if the family weighs it.
    pub fn category(&self, category: RuleCategory) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
    }
}

/// Reduce findings to a score.
///
/// Findings in a category the family does not weigh are ignored.
pub fn score(findings: &[Finding], family: ManifestFamily) -> Score {
    let mut deductions: BTreeMap<RuleCategory, (f64, usize)> = BTreeMap::new();
    for finding in findings {
        let (total, prior) = deductions.entry(finding.category).or_insert((0.0, 0));
        *total += base_points(finding.severity) / (1.0 + DIMINISHING_FACTOR * *prior as f64);
        *prior += 1;
    }

    let categories: Vec<CategoryScore> = weights(family)
        .iter()
        .map(|&(category, weight)| {
            let (deducted, count) = deductions.get(&category).copied().unwrap_or((0.0, 0));
            CategoryScore {
                category,
                score: (100.0 - deducted).max(0.0),
                weight,
                findings: count,
            }
        })
        .collect();

    let overall = categories
        .iter()
        .map(|c| c.score * c.weight / 100.0)
        .sum::<f64>()
        .clamp(0.0, 100.0);

    Score {
        overall,
        grade: Grade::from_score(overall),
        categories,
    }
}
