//! Operating-profile calibration from hiring-team intake answers.
//!
//! The intake form collects ordinal answers (1-5) about how the team
//! works plus a small set of stated priorities and risk aversions. The
//! calibrator buckets each ordinal into a [`Level`] and produces a
//! versioned [`OperatingProfile`]; recalibrating after new answers bumps
//! the version so downstream rubrics record which profile generation
//! they were derived from.
//!
//! Calibration is total and deterministic over valid answers: the same
//! intake always yields the same profile.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lowest valid ordinal intake answer.
pub const ORDINAL_MIN: u8 = 1;

/// Highest valid ordinal intake answer.
pub const ORDINAL_MAX: u8 = 5;

/// Ordinal answers at or above this calibrate to [`Level::High`].
pub const HIGH_CUTOFF: u8 = 4;

/// Ordinal answers at or above this (and below the high cutoff)
/// calibrate to [`Level::Medium`].
pub const MEDIUM_CUTOFF: u8 = 2;

/// Most priority tags retained per profile; extras beyond the first
/// occurrences are dropped.
pub const MAX_PRIORITY_TAGS: usize = 3;

/// Errors raised while calibrating intake answers.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CalibrationError {
    /// An ordinal answer fell outside the accepted scale.
    #[error("intake answer '{field}' is {value}, expected {min}..={max}")]
    OutOfRange {
        /// Which intake field was rejected.
        field: &'static str,
        /// The rejected value.
        value: u8,
        /// Inclusive lower bound of the scale.
        min: u8,
        /// Inclusive upper bound of the scale.
        max: u8,
    },
}

/// Three-point scale produced by bucketing an ordinal intake answer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Level {
    /// Bottom of the scale.
    Low,
    /// Middle of the scale.
    Medium,
    /// Top of the scale.
    High,
}

impl Level {
    /// Buckets an ordinal answer without validating its range.
    #[must_use]
    pub const fn from_ordinal(value: u8) -> Self {
        if value >= HIGH_CUTOFF {
            Self::High
        } else if value >= MEDIUM_CUTOFF {
            Self::Medium
        } else {
            Self::Low
        }
    }

    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// All levels, low to high.
    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Low, Self::Medium, Self::High]
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stated hiring priority, each nudging one rubric dimension upward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum PriorityTag {
    /// Getting changes into production quickly.
    Shipping,
    /// Code craftsmanship and maintainability.
    Craft,
    /// Working well with the existing team.
    Collaboration,
    /// Owning problems end to end.
    Ownership,
    /// Rigorous automated testing.
    Testing,
}

impl PriorityTag {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shipping => "shipping",
            Self::Craft => "craft",
            Self::Collaboration => "collaboration",
            Self::Ownership => "ownership",
            Self::Testing => "testing",
        }
    }
}

impl std::fmt::Display for PriorityTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure mode the team most wants to avoid.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RiskAversion {
    /// Production outages.
    Outages,
    /// Behavioral regressions slipping through review.
    Regressions,
    /// Commitments landing late.
    MissedDeadlines,
}

impl RiskAversion {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Outages => "outages",
            Self::Regressions => "regressions",
            Self::MissedDeadlines => "missed-deadlines",
        }
    }
}

impl std::fmt::Display for RiskAversion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw intake-form answers, prior to validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeAnswers {
    /// How fast the team expects work to land (1 = relaxed, 5 = urgent).
    pub pace: u8,
    /// How strict the quality bar is (1 = lenient, 5 = exacting).
    pub quality_bar: u8,
    /// How much ambiguity the role carries (1 = well specified,
    /// 5 = open-ended).
    pub ambiguity: u8,
    /// Stated priorities, strongest first.
    #[serde(default)]
    pub priorities: Vec<PriorityTag>,
    /// Failure modes the team most wants to avoid.
    #[serde(default)]
    pub risk_aversions: Vec<RiskAversion>,
}

impl IntakeAnswers {
    fn validate(&self) -> Result<(), CalibrationError> {
        for (field, value) in [
            ("pace", self.pace),
            ("quality_bar", self.quality_bar),
            ("ambiguity", self.ambiguity),
        ] {
            if !(ORDINAL_MIN..=ORDINAL_MAX).contains(&value) {
                return Err(CalibrationError::OutOfRange {
                    field,
                    value,
                    min: ORDINAL_MIN,
                    max: ORDINAL_MAX,
                });
            }
        }
        Ok(())
    }
}

/// The calibrated expectations a subject is evaluated against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatingProfile {
    /// Monotonically increasing profile generation, starting at 1.
    pub version: u32,
    /// Expected delivery pace.
    pub pace: Level,
    /// Strictness of the quality bar.
    pub quality_bar: Level,
    /// Tolerance for ambiguous, open-ended work.
    pub ambiguity_tolerance: Level,
    /// Retained priorities, first occurrences only.
    pub priorities: Vec<PriorityTag>,
    /// Retained risk aversions, first occurrences only.
    pub risk_aversions: Vec<RiskAversion>,
}

/// Calibrates a first-generation profile from intake answers.
///
/// # Errors
///
/// Returns [`CalibrationError::OutOfRange`] when any ordinal answer lies
/// outside `1..=5`.
pub fn calibrate(answers: &IntakeAnswers) -> Result<OperatingProfile, CalibrationError> {
    answers.validate()?;
    Ok(OperatingProfile {
        version: 1,
        pace: Level::from_ordinal(answers.pace),
        quality_bar: Level::from_ordinal(answers.quality_bar),
        ambiguity_tolerance: Level::from_ordinal(answers.ambiguity),
        priorities: dedup_capped(&answers.priorities, MAX_PRIORITY_TAGS),
        risk_aversions: dedup_capped(&answers.risk_aversions, usize::MAX),
    })
}

/// Recalibrates from fresh answers, bumping the profile version.
///
/// # Errors
///
/// Returns [`CalibrationError::OutOfRange`] when any ordinal answer lies
/// outside `1..=5`.
pub fn recalibrate(
    previous: &OperatingProfile,
    answers: &IntakeAnswers,
) -> Result<OperatingProfile, CalibrationError> {
    let mut profile = calibrate(answers)?;
    profile.version = previous.version.saturating_add(1);
    Ok(profile)
}

/// Keeps the first occurrence of each element, up to `cap`, preserving
/// stated order.
fn dedup_capped<T: Copy + PartialEq>(items: &[T], cap: usize) -> Vec<T> {
    let mut kept: Vec<T> = Vec::new();
    for &item in items {
        if kept.len() >= cap {
            break;
        }
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    kept
}
