//! Confidence scoring for evidence records.
//!
//! Confidence is a reliability estimate in `[0, 1]` attached to every
//! evidence record. The scale is anchored by source type, not by how
//! persuasive the content reads:
//!
//! - direct machine measurement (parsed logs, diffs): at least 0.9
//! - subject self-description (writeup claims, assistant tags): at most 0.5
//! - independent corroboration: boosted above any single source, capped
//!   at 0.99 because corroboration never reaches certainty

use serde::{Deserialize, Deserializer, Serialize};

/// A confidence value clamped to `[0, 1]`.
///
/// Construction clamps rather than errors: reliability arithmetic
/// (corroboration boosts, caps) should never be able to push a record
/// outside the valid range.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// No confidence at all.
    pub const ZERO: Self = Self(0.0);

    /// Baseline for facts measured directly from artifact bytes.
    pub const DIRECT_MEASUREMENT: Self = Self(0.95);

    /// Baseline for facts read from producer-reported metadata.
    pub const REPORTED_MEASUREMENT: Self = Self(0.9);

    /// Ceiling for any fact the subject asserts about themselves.
    pub const SELF_REPORTED_CAP: Self = Self(0.5);

    /// Ceiling for corroboration boosts.
    pub const CORROBORATION_CAP: Self = Self(0.99);

    /// Creates a confidence value, clamping into `[0, 1]`.
    ///
    /// `NaN` clamps to zero: an unknowable reliability is no reliability.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            return Self::ZERO;
        }
        Self(value.clamp(0.0, 1.0))
    }

    /// The raw value in `[0, 1]`.
    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Returns the smaller of this value and `ceiling`.
    #[must_use]
    pub fn capped_at(self, ceiling: Self) -> Self {
        if self.0 > ceiling.0 { ceiling } else { self }
    }

    /// Combines independent source confidences into one boosted value.
    ///
    /// Treats each source as an independent probabilistic witness:
    /// `1 - Π(1 - c_i)`, capped at [`Self::CORROBORATION_CAP`]. Two
    /// sources at 0.6 and 0.7 combine to 0.88. An empty slice yields
    /// [`Self::ZERO`].
    #[must_use]
    pub fn corroborate(sources: &[Self]) -> Self {
        if sources.is_empty() {
            return Self::ZERO;
        }
        let miss_all: f64 = sources.iter().map(|c| 1.0 - c.0).product();
        Self::new(1.0 - miss_all).capped_at(Self::CORROBORATION_CAP)
    }

    /// Whether this value is strictly above the self-reported ceiling.
    ///
    /// Proof rules may only cite evidence satisfying this predicate, which
    /// is what keeps a lone self-reported fact from ever verifying a
    /// claim.
    #[must_use]
    pub fn exceeds_self_reported_cap(self) -> bool {
        self.0 > Self::SELF_REPORTED_CAP.0
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Clamp on the way in so out-of-range wire values cannot smuggle
        // an invalid confidence into the engine.
        f64::deserialize(deserializer).map(Self::new)
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
