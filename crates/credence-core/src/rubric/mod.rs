//! Rubric derivation: weighted dimensions and pass thresholds from an
//! operating profile.
//!
//! A rubric is derived, never authored: baseline dimension weights are
//! nudged by profile levels, priorities, and risk aversions, floored so
//! no dimension vanishes, then renormalized to sum to one. Thresholds
//! (coverage bar, completion ceiling, writeup length, change-size cap)
//! are table lookups keyed by profile level. The same profile always
//! derives the same rubric, and the rubric records the profile version
//! it came from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::profile::{Level, OperatingProfile, PriorityTag, RiskAversion};

/// Schema identifier embedded in serialized rubrics.
pub const RUBRIC_SCHEMA: &str = "credence.rubric.v1";

/// No dimension's weight falls below this after adjustment.
pub const WEIGHT_FLOOR: f64 = 0.05;

/// Weight nudge applied per priority tag and per risk aversion.
pub const TAG_ADJUSTMENT: f64 = 0.05;

/// Tolerance when checking that weights sum to one.
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-9;

/// Corroborating sources required for self-reported facts, independent
/// of profile.
pub const MIN_CORROBORATING_SOURCES: usize = 2;

/// Errors raised by rubric validation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RubricError {
    /// Dimension weights do not sum to one.
    #[error("rubric weights sum to {sum}, expected 1.0")]
    WeightsUnnormalized {
        /// The observed sum.
        sum: f64,
    },
    /// A dimension weight is negative or non-finite.
    #[error("rubric weight for {dimension} is {weight}, expected a finite non-negative value")]
    WeightInvalid {
        /// The offending dimension.
        dimension: Dimension,
        /// The offending weight.
        weight: f64,
    },
    /// The serialized rubric carries an unknown schema identifier.
    #[error("unsupported rubric schema: {found}")]
    SchemaMismatch {
        /// The schema identifier encountered.
        found: String,
    },
}

/// An evaluated dimension of candidate performance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum Dimension {
    /// Maintainability and focus of the submitted change.
    CodeQuality,
    /// Testing rigor: regression tests, suite health, coverage.
    TestDiscipline,
    /// Wall-clock delivery speed.
    CompletionSpeed,
    /// Written communication about the work.
    Communication,
    /// Claimed background, corroborated or not.
    Experience,
}

impl Dimension {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CodeQuality => "code-quality",
            Self::TestDiscipline => "test-discipline",
            Self::CompletionSpeed => "completion-speed",
            Self::Communication => "communication",
            Self::Experience => "experience",
        }
    }

    /// All dimensions in canonical order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::CodeQuality,
            Self::TestDiscipline,
            Self::CompletionSpeed,
            Self::Communication,
            Self::Experience,
        ]
    }

    /// Baseline weight before profile adjustment.
    #[must_use]
    pub const fn baseline_weight(self) -> f64 {
        match self {
            Self::CodeQuality | Self::TestDiscipline => 0.25,
            Self::CompletionSpeed | Self::Communication => 0.15,
            Self::Experience => 0.20,
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The dimension a priority tag boosts.
const fn priority_dimension(tag: PriorityTag) -> Dimension {
    match tag {
        PriorityTag::Shipping => Dimension::CompletionSpeed,
        PriorityTag::Craft => Dimension::CodeQuality,
        PriorityTag::Collaboration => Dimension::Communication,
        PriorityTag::Ownership => Dimension::Experience,
        PriorityTag::Testing => Dimension::TestDiscipline,
    }
}

/// The dimension a risk aversion boosts.
const fn risk_dimension(risk: RiskAversion) -> Dimension {
    match risk {
        RiskAversion::Outages => Dimension::CodeQuality,
        RiskAversion::Regressions => Dimension::TestDiscipline,
        RiskAversion::MissedDeadlines => Dimension::CompletionSpeed,
    }
}

/// Pass/fail cutoffs the proof rules compare evidence against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Completion spans above this many hours miss the pace expectation.
    pub max_completion_hours: f64,
    /// Line coverage below this percentage misses the quality bar.
    pub min_line_coverage_pct: f64,
    /// Coverage deltas below this (versus baseline) miss the quality bar.
    pub min_coverage_delta_pct: f64,
    /// Writeups shorter than this many words are considered thin.
    pub min_writeup_words: usize,
    /// Independent sources required before a self-reported fact counts.
    pub min_corroborating_sources: usize,
    /// Changes touching more files than this are considered unfocused.
    pub max_files_changed: usize,
}

impl Thresholds {
    /// Derives thresholds from profile levels.
    #[must_use]
    pub fn derive(profile: &OperatingProfile) -> Self {
        let max_completion_hours = match profile.pace {
            Level::High => 24.0,
            Level::Medium => 48.0,
            Level::Low => 96.0,
        };
        let (min_line_coverage_pct, min_coverage_delta_pct) = match profile.quality_bar {
            Level::High => (85.0, 0.0),
            Level::Medium => (70.0, -1.0),
            Level::Low => (55.0, -3.0),
        };
        let min_writeup_words = match profile.quality_bar {
            Level::High => 300,
            Level::Medium => 150,
            Level::Low => 75,
        };
        let max_files_changed = match profile.quality_bar {
            Level::High => 20,
            Level::Medium => 40,
            Level::Low => 80,
        };
        Self {
            max_completion_hours,
            min_line_coverage_pct,
            min_coverage_delta_pct,
            min_writeup_words,
            min_corroborating_sources: MIN_CORROBORATING_SOURCES,
            max_files_changed,
        }
    }
}

/// A derived evaluation rubric: normalized dimension weights plus the
/// thresholds proof rules enforce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    /// Schema identifier, always [`RUBRIC_SCHEMA`] for rubrics derived by
    /// this version.
    pub schema: String,
    /// Version of the operating profile this rubric was derived from.
    pub profile_version: u32,
    /// Normalized dimension weights summing to one.
    pub weights: BTreeMap<Dimension, f64>,
    /// Pass/fail cutoffs.
    pub thresholds: Thresholds,
}

impl Rubric {
    /// Derives the rubric for an operating profile.
    #[must_use]
    pub fn derive(profile: &OperatingProfile) -> Self {
        let mut weights: BTreeMap<Dimension, f64> = Dimension::all()
            .into_iter()
            .map(|dimension| (dimension, dimension.baseline_weight()))
            .collect();

        match profile.pace {
            Level::High => add_weight(&mut weights, Dimension::CompletionSpeed, 0.10),
            Level::Low => add_weight(&mut weights, Dimension::CompletionSpeed, -0.05),
            Level::Medium => {},
        }
        match profile.quality_bar {
            Level::High => {
                add_weight(&mut weights, Dimension::CodeQuality, 0.05);
                add_weight(&mut weights, Dimension::TestDiscipline, 0.05);
            },
            Level::Low => add_weight(&mut weights, Dimension::TestDiscipline, -0.05),
            Level::Medium => {},
        }
        match profile.ambiguity_tolerance {
            Level::High => add_weight(&mut weights, Dimension::Experience, 0.05),
            Level::Low => add_weight(&mut weights, Dimension::Communication, 0.05),
            Level::Medium => {},
        }
        for &tag in &profile.priorities {
            add_weight(&mut weights, priority_dimension(tag), TAG_ADJUSTMENT);
        }
        for &risk in &profile.risk_aversions {
            add_weight(&mut weights, risk_dimension(risk), TAG_ADJUSTMENT);
        }

        floor_and_normalize(&mut weights);
        Self {
            schema: RUBRIC_SCHEMA.to_string(),
            profile_version: profile.version,
            weights,
            thresholds: Thresholds::derive(profile),
        }
    }

    /// The normalized weight of one dimension.
    #[must_use]
    pub fn weight(&self, dimension: Dimension) -> f64 {
        self.weights.get(&dimension).copied().unwrap_or(0.0)
    }

    /// Checks schema, weight bounds, and normalization.
    ///
    /// # Errors
    ///
    /// Returns a [`RubricError`] naming the first violated invariant.
    pub fn validate(&self) -> Result<(), RubricError> {
        if self.schema != RUBRIC_SCHEMA {
            return Err(RubricError::SchemaMismatch {
                found: self.schema.clone(),
            });
        }
        for (&dimension, &weight) in &self.weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RubricError::WeightInvalid { dimension, weight });
            }
        }
        let sum: f64 = self.weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(RubricError::WeightsUnnormalized { sum });
        }
        Ok(())
    }
}

fn add_weight(weights: &mut BTreeMap<Dimension, f64>, dimension: Dimension, delta: f64) {
    if let Some(weight) = weights.get_mut(&dimension) {
        *weight += delta;
    }
}

/// Clamps each weight to the floor, then rescales so the sum is one.
fn floor_and_normalize(weights: &mut BTreeMap<Dimension, f64>) {
    for weight in weights.values_mut() {
        if *weight < WEIGHT_FLOOR {
            *weight = WEIGHT_FLOOR;
        }
    }
    let sum: f64 = weights.values().sum();
    for weight in weights.values_mut() {
        *weight /= sum;
    }
}
