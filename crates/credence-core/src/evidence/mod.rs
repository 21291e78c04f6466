//! Evidence records: structured, confidence-scored facts derived from
//! artifacts.
//!
//! Every evidence record references exactly one source artifact (merged
//! records list every contributor in `corroborated_by`). Records are
//! immutable once created; the aggregator supersedes rather than edits,
//! so the original extraction always survives for audit.
//!
//! # Identity
//!
//! A record's identifier is derived from (artifact, category, fact key),
//! so re-extracting the same artifact yields the same identifiers and
//! ingestion stays idempotent end to end. The fact key is the payload's
//! semantic identity: two records with the same key describe the same
//! underlying fact and are candidates for corroboration or contradiction.

mod category;
mod confidence;

pub use category::EvidenceCategory;
pub use confidence::Confidence;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{keyed_digest, short_hex};

/// Domain separator for evidence identifier derivation.
pub const EVIDENCE_ID_DOMAIN: &[u8] = b"credence.evidence.v1";

/// Coverage percentages within this distance agree.
pub const COVERAGE_TOLERANCE_PCT: f64 = 0.5;

/// Stated tenures within this many months agree.
pub const TENURE_TOLERANCE_MONTHS: u32 = 3;

/// Word counts within this relative fraction agree.
pub const WORD_COUNT_TOLERANCE: f64 = 0.1;

/// Completion spans within this relative fraction agree.
pub const TIMING_TOLERANCE: f64 = 0.05;

/// Errors raised by evidence parsing and validation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvidenceError {
    /// The string is not a recognized evidence category.
    #[error("invalid evidence category: {value}")]
    InvalidCategory {
        /// The rejected input.
        value: String,
    },
}

/// Machine-readable payload of an evidence record.
///
/// The variant determines the record's [fact key](Self::fact_key), which
/// is what the aggregator groups on when looking for corroboration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum EvidencePayload {
    /// Overall shape of the submitted diff.
    DiffShape {
        /// Number of files touched.
        files_changed: usize,
        /// Lines added across all files.
        lines_added: usize,
        /// Lines removed across all files.
        lines_removed: usize,
    },

    /// Test files touched by the diff.
    TestFootprint {
        /// Number of changed paths matching the test-path heuristic.
        test_files: usize,
        /// The matching paths, sorted.
        paths: Vec<String>,
    },

    /// Parsed test-runner counts.
    TestRun {
        /// Total tests executed.
        total: u64,
        /// Tests that passed.
        passed: u64,
        /// Tests that failed.
        failed: u64,
        /// Runner-reported duration, if present.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u64>,
    },

    /// Parsed coverage percentages.
    Coverage {
        /// Line coverage percent.
        line_pct: f64,
        /// Branch coverage percent, if reported.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        branch_pct: Option<f64>,
        /// Delta versus the producer-supplied baseline, if one exists.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delta_pct: Option<f64>,
    },

    /// Structure of the free-text writeup.
    WriteupShape {
        /// Whitespace-separated word count.
        word_count: usize,
        /// Required topic sections found, sorted.
        sections_present: Vec<String>,
        /// Required topic sections not found, sorted.
        sections_missing: Vec<String>,
    },

    /// A low-confidence tag asserted about the subject (skill, tool).
    Tag {
        /// Tag name, e.g. a skill.
        name: String,
        /// Optional qualifier, e.g. a proficiency phrase.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },

    /// Stated employment tenure.
    Tenure {
        /// Organization name as stated.
        organization: String,
        /// Tenure length in months.
        months: u32,
    },

    /// Wall-clock completion span of the work sample.
    Timing {
        /// Hours between start and submission.
        span_hours: f64,
    },
}

impl EvidencePayload {
    /// Semantic identity of the underlying fact.
    ///
    /// Records sharing a category and fact key describe the same fact and
    /// are compared for agreement during aggregation. Keyed variants fold
    /// their key into the identity so "Rust" and "Go" skill tags never
    /// collide.
    #[must_use]
    pub fn fact_key(&self) -> String {
        match self {
            Self::DiffShape { .. } => "diff-shape".to_string(),
            Self::TestFootprint { .. } => "test-footprint".to_string(),
            Self::TestRun { .. } => "test-run".to_string(),
            Self::Coverage { .. } => "coverage".to_string(),
            Self::WriteupShape { .. } => "writeup-shape".to_string(),
            Self::Tag { name, .. } => format!("tag:{}", name.trim().to_ascii_lowercase()),
            Self::Tenure { organization, .. } => {
                format!("tenure:{}", organization.trim().to_ascii_lowercase())
            },
            Self::Timing { .. } => "timing".to_string(),
        }
    }

    /// Compares two payloads describing the same fact.
    ///
    /// Returns `None` when the fact keys differ (nothing to compare),
    /// `Some(true)` when the material values agree within tolerance, and
    /// `Some(false)` when they materially disagree. Informative fields
    /// (durations, path lists, section lists) are not material.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> Option<bool> {
        if self.fact_key() != other.fact_key() {
            return None;
        }
        let agreement = match (self, other) {
            (
                Self::DiffShape {
                    files_changed: fa,
                    lines_added: aa,
                    lines_removed: ra,
                },
                Self::DiffShape {
                    files_changed: fb,
                    lines_added: ab,
                    lines_removed: rb,
                },
            ) => fa == fb && aa == ab && ra == rb,
            (
                Self::TestFootprint { test_files: a, .. },
                Self::TestFootprint { test_files: b, .. },
            ) => a == b,
            (
                Self::TestRun {
                    total: ta,
                    failed: fa,
                    ..
                },
                Self::TestRun {
                    total: tb,
                    failed: fb,
                    ..
                },
            ) => ta == tb && fa == fb,
            (Self::Coverage { line_pct: a, .. }, Self::Coverage { line_pct: b, .. }) => {
                (a - b).abs() <= COVERAGE_TOLERANCE_PCT
            },
            (
                Self::WriteupShape { word_count: a, .. },
                Self::WriteupShape { word_count: b, .. },
            ) => {
                let max = (*a.max(b)) as f64;
                (*a as f64 - *b as f64).abs() <= max * WORD_COUNT_TOLERANCE
            },
            (Self::Tag { value: a, .. }, Self::Tag { value: b, .. }) => match (a, b) {
                (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                // A tag without a qualifier does not dispute one with.
                _ => true,
            },
            (Self::Tenure { months: a, .. }, Self::Tenure { months: b, .. }) => {
                a.abs_diff(*b) <= TENURE_TOLERANCE_MONTHS
            },
            (Self::Timing { span_hours: a }, Self::Timing { span_hours: b }) => {
                let max = a.max(*b);
                (a - b).abs() <= max * TIMING_TOLERANCE
            },
            _ => return None,
        };
        Some(agreement)
    }
}

/// A structured fact derived from exactly one artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Identifier derived from (artifact, category, fact key).
    pub id: String,
    /// The subject this fact is about.
    pub subject_id: String,
    /// The artifact the fact was extracted from. For merged records, the
    /// lexically smallest contributing artifact.
    pub artifact_id: String,
    /// Evidence category.
    pub category: EvidenceCategory,
    /// Human-readable statement of the fact.
    pub fact: String,
    /// Source reliability in `[0, 1]`.
    pub confidence: Confidence,
    /// Machine-readable payload.
    pub payload: EvidencePayload,
    /// When extraction ran, milliseconds since the epoch (caller-supplied).
    pub extracted_at_ms: u64,
    /// Set when the source was malformed but still partially parseable.
    #[serde(default)]
    pub needs_verification: bool,
    /// Set when another independent source materially disagrees.
    #[serde(default)]
    pub contradiction_detected: bool,
    /// Artifact identifiers corroborating this fact (merged records only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub corroborated_by: Vec<String>,
    /// Identifier of the merged record that superseded this one, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
}

impl Evidence {
    /// Creates a new single-source evidence record with a derived
    /// identifier.
    #[must_use]
    pub fn new(
        subject_id: &str,
        artifact_id: &str,
        category: EvidenceCategory,
        fact: impl Into<String>,
        confidence: Confidence,
        payload: EvidencePayload,
        extracted_at_ms: u64,
    ) -> Self {
        let id = derive_evidence_id(artifact_id, category, &payload.fact_key());
        Self {
            id,
            subject_id: subject_id.to_string(),
            artifact_id: artifact_id.to_string(),
            category,
            fact: fact.into(),
            confidence,
            payload,
            extracted_at_ms,
            needs_verification: false,
            contradiction_detected: false,
            corroborated_by: Vec::new(),
            superseded_by: None,
        }
    }

    /// Marks this record as extracted from malformed-but-parseable input.
    #[must_use]
    pub fn with_needs_verification(mut self) -> Self {
        self.needs_verification = true;
        self
    }

    /// Number of independent artifact sources behind this record.
    #[must_use]
    pub fn source_count(&self) -> usize {
        self.corroborated_by.len().max(1)
    }

    /// Whether this record has been superseded by a merged record.
    #[must_use]
    pub const fn is_superseded(&self) -> bool {
        self.superseded_by.is_some()
    }
}

/// Derives the identifier for a single-source evidence record.
#[must_use]
pub fn derive_evidence_id(
    artifact_id: &str,
    category: EvidenceCategory,
    fact_key: &str,
) -> String {
    let digest = keyed_digest(
        EVIDENCE_ID_DOMAIN,
        &[
            artifact_id.as_bytes(),
            category.as_str().as_bytes(),
            fact_key.as_bytes(),
        ],
    );
    format!("ev-{}", short_hex(&digest, 8))
}

/// Derives the identifier for a merged evidence record.
///
/// The contributing record identifiers must already be sorted; the derived
/// identifier is then independent of extraction order.
#[must_use]
pub fn derive_merged_evidence_id(
    category: EvidenceCategory,
    fact_key: &str,
    sorted_contributor_ids: &[String],
) -> String {
    let mut parts: Vec<&[u8]> =
        vec![b"merged", category.as_str().as_bytes(), fact_key.as_bytes()];
    parts.extend(sorted_contributor_ids.iter().map(|id| id.as_bytes()));
    let digest = keyed_digest(EVIDENCE_ID_DOMAIN, &parts);
    format!("ev-{}", short_hex(&digest, 8))
}
