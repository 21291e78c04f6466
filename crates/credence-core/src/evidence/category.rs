//! Evidence category taxonomy.
//!
//! Categories organize extracted facts by what kind of signal they carry
//! and how much independent corroboration they need before a proof rule
//! may rely on them.

use serde::{Deserialize, Serialize};

use super::EvidenceError;

/// Category classification for evidence records.
///
/// The category determines which proof rules may consume a record and
/// whether the record can stand alone or needs corroboration.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum EvidenceCategory {
    /// Shape of the submitted change: files touched, churn, test footprint.
    CommitPattern,

    /// Test-runner results: pass/fail counts and duration.
    TestExecution,

    /// Coverage percentages and deltas against a baseline.
    TestCoverage,

    /// Writeup structure: word count, required topic sections.
    DocumentationQuality,

    /// Skills or experience asserted by the subject about themselves.
    SelfReported,

    /// Prior employment tenure, as stated or corroborated.
    JobTenure,

    /// Wall-clock completion time for the work sample.
    Timing,
}

impl std::fmt::Display for EvidenceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl EvidenceCategory {
    /// Parses an evidence category from a string.
    ///
    /// Accepts kebab-case (canonical), snake_case, and any capitalization.
    ///
    /// # Errors
    ///
    /// Returns `EvidenceError::InvalidCategory` if the string is not a
    /// recognized category.
    pub fn parse(s: &str) -> Result<Self, EvidenceError> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "commit-pattern" => Ok(Self::CommitPattern),
            "test-execution" => Ok(Self::TestExecution),
            "test-coverage" => Ok(Self::TestCoverage),
            "documentation-quality" => Ok(Self::DocumentationQuality),
            "self-reported" => Ok(Self::SelfReported),
            "job-tenure" => Ok(Self::JobTenure),
            "timing" => Ok(Self::Timing),
            _ => Err(EvidenceError::InvalidCategory {
                value: s.to_string(),
            }),
        }
    }

    /// Returns the canonical string representation of this category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CommitPattern => "commit-pattern",
            Self::TestExecution => "test-execution",
            Self::TestCoverage => "test-coverage",
            Self::DocumentationQuality => "documentation-quality",
            Self::SelfReported => "self-reported",
            Self::JobTenure => "job-tenure",
            Self::Timing => "timing",
        }
    }

    /// Returns all known categories in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::CommitPattern,
            Self::TestExecution,
            Self::TestCoverage,
            Self::DocumentationQuality,
            Self::SelfReported,
            Self::JobTenure,
            Self::Timing,
        ]
    }

    /// Whether records in this category need independent corroboration
    /// before a rule may treat them as proof.
    ///
    /// Self-reported facts come from the subject describing themselves;
    /// a single source can never lift them above the self-reported
    /// confidence cap.
    #[must_use]
    pub const fn requires_corroboration(&self) -> bool {
        match self {
            Self::SelfReported | Self::JobTenure => true,
            Self::CommitPattern
            | Self::TestExecution
            | Self::TestCoverage
            | Self::DocumentationQuality
            | Self::Timing => false,
        }
    }
}
