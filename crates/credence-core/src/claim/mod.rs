//! Claims: evaluable statements about a subject, derived from the rubric
//! and the aggregated evidence.
//!
//! Claim generation is deterministic and fail-closed friendly: every
//! claim starts `Unverified` with no cited evidence and no rule, and only
//! the proof-rule engine or an audited manual override moves it. Two
//! families exist:
//!
//! - **work-product claims**: fixed templates about the submission
//!   itself (focus, tests, coverage, timing, writeup), generated
//!   unconditionally so missing artifacts surface as unverified claims;
//! - **assertion claims**: one per distinct self-reported skill and per
//!   stated employer, generated only when the subject actually asserted
//!   the underlying fact.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::aggregate::EvidenceSet;
use crate::crypto::{content_digest, short_hex};
use crate::evidence::{Confidence, EvidenceCategory, EvidencePayload};
use crate::rubric::{Dimension, Rubric};

/// Most assertion claims generated per evidence category; extras beyond
/// the first (sorted) occurrences are dropped.
pub const MAX_ASSERTION_CLAIMS: usize = 16;

/// Lifecycle state of a claim.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ClaimStatus {
    /// Default state; no rule has admitted evidence for or against.
    Unverified,
    /// A proof rule found sufficient supporting evidence.
    Verified,
    /// A proof rule found evidence against the claim.
    Contradicted,
    /// Evidence supports part of the claim but not all of it.
    Partial,
}

impl ClaimStatus {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unverified => "unverified",
            Self::Verified => "verified",
            Self::Contradicted => "contradicted",
            Self::Partial => "partial",
        }
    }

    /// All statuses in canonical order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::Unverified,
            Self::Verified,
            Self::Contradicted,
            Self::Partial,
        ]
    }
}

impl std::fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An evaluable statement about one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Stable identifier: `clm-<dimension>-<template>[-<key>]`.
    pub id: String,
    /// The subject this claim is about.
    pub subject_id: String,
    /// Rubric dimension the claim scores against.
    pub dimension: Dimension,
    /// Evidence category rules draw from when evaluating this claim.
    pub category: EvidenceCategory,
    /// Human-readable statement under evaluation.
    pub statement: String,
    /// Current lifecycle state.
    pub status: ClaimStatus,
    /// Confidence granted by the admitting rule; zero until evaluated.
    pub confidence: Confidence,
    /// Rubric weight of the claim's dimension at generation time.
    pub relevance: f64,
    /// Identifiers of the evidence records the verdict cites.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// The rule that produced the current status, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Explanation of the current status.
    pub reason: String,
    /// For assertion claims, the evidence fact key the claim is about.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fact_key: Option<String>,
    /// Questions a human should ask when the claim is not verified.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub followup_questions: Vec<String>,
}

impl Claim {
    fn unverified(
        subject_id: &str,
        dimension: Dimension,
        category: EvidenceCategory,
        template: &str,
        key: Option<&str>,
        statement: String,
        relevance: f64,
        fact_key: Option<String>,
    ) -> Self {
        let id = match key {
            Some(key) => format!("clm-{}-{template}-{key}", dimension.as_str()),
            None => format!("clm-{}-{template}", dimension.as_str()),
        };
        Self {
            id,
            subject_id: subject_id.to_string(),
            dimension,
            category,
            statement,
            status: ClaimStatus::Unverified,
            confidence: Confidence::ZERO,
            relevance,
            evidence_refs: Vec::new(),
            rule_id: None,
            reason: "not yet evaluated".to_string(),
            fact_key,
            followup_questions: Vec::new(),
        }
    }

    /// Whether any rule or override has moved this claim off its
    /// generated state.
    #[must_use]
    pub fn is_evaluated(&self) -> bool {
        self.rule_id.is_some() || self.status != ClaimStatus::Unverified
    }
}

/// Generates the claim set for one subject.
///
/// Work-product claims are always present; assertion claims mirror what
/// the subject actually asserted. Output order is canonical (template
/// order, then sorted assertion keys) and deterministic for a given
/// rubric and evidence set.
#[must_use]
pub fn generate(subject_id: &str, rubric: &Rubric, evidence: &EvidenceSet) -> Vec<Claim> {
    let mut claims = vec![
        Claim::unverified(
            subject_id,
            Dimension::CodeQuality,
            EvidenceCategory::CommitPattern,
            "focused-change",
            None,
            "the submitted change is focused and reviewable".to_string(),
            rubric.weight(Dimension::CodeQuality),
            None,
        ),
        Claim::unverified(
            subject_id,
            Dimension::TestDiscipline,
            EvidenceCategory::CommitPattern,
            "regression-tests",
            None,
            "the change includes regression tests".to_string(),
            rubric.weight(Dimension::TestDiscipline),
            None,
        ),
        Claim::unverified(
            subject_id,
            Dimension::TestDiscipline,
            EvidenceCategory::TestExecution,
            "suite-passes",
            None,
            "the test suite passes on the submitted change".to_string(),
            rubric.weight(Dimension::TestDiscipline),
            None,
        ),
        Claim::unverified(
            subject_id,
            Dimension::TestDiscipline,
            EvidenceCategory::TestCoverage,
            "coverage-bar",
            None,
            "line coverage meets the configured bar".to_string(),
            rubric.weight(Dimension::TestDiscipline),
            None,
        ),
        Claim::unverified(
            subject_id,
            Dimension::CompletionSpeed,
            EvidenceCategory::Timing,
            "timely-completion",
            None,
            "the work sample was completed within the expected window".to_string(),
            rubric.weight(Dimension::CompletionSpeed),
            None,
        ),
        Claim::unverified(
            subject_id,
            Dimension::Communication,
            EvidenceCategory::DocumentationQuality,
            "writeup-topics",
            None,
            "the writeup covers the required topics".to_string(),
            rubric.weight(Dimension::Communication),
            None,
        ),
    ];

    claims.extend(skill_claims(subject_id, rubric, evidence));
    claims.extend(tenure_claims(subject_id, rubric, evidence));
    claims
}

/// One claim per distinct self-reported skill, sorted by skill name.
fn skill_claims(subject_id: &str, rubric: &Rubric, evidence: &EvidenceSet) -> Vec<Claim> {
    let mut skills: Vec<(String, String)> = evidence
        .active_in(EvidenceCategory::SelfReported)
        .filter_map(|record| match &record.payload {
            EvidencePayload::Tag { name, .. } => {
                Some((record.payload.fact_key(), name.clone()))
            },
            _ => None,
        })
        .collect();
    skills.sort();
    skills.dedup_by(|a, b| a.0 == b.0);
    skills.truncate(MAX_ASSERTION_CLAIMS);

    let mut used = BTreeSet::new();
    skills
        .into_iter()
        .map(|(fact_key, name)| {
            let key = claim_key(&name, &fact_key, &mut used);
            Claim::unverified(
                subject_id,
                Dimension::Experience,
                EvidenceCategory::SelfReported,
                "skill",
                Some(&key),
                format!("claimed skill '{name}' is corroborated by independent evidence"),
                rubric.weight(Dimension::Experience),
                Some(fact_key),
            )
        })
        .collect()
}

/// One claim per stated employer, sorted by organization.
fn tenure_claims(subject_id: &str, rubric: &Rubric, evidence: &EvidenceSet) -> Vec<Claim> {
    let mut employers: Vec<(String, String)> = evidence
        .active_in(EvidenceCategory::JobTenure)
        .filter_map(|record| match &record.payload {
            EvidencePayload::Tenure { organization, .. } => {
                Some((record.payload.fact_key(), organization.clone()))
            },
            _ => None,
        })
        .collect();
    employers.sort();
    employers.dedup_by(|a, b| a.0 == b.0);
    employers.truncate(MAX_ASSERTION_CLAIMS);

    let mut used = BTreeSet::new();
    employers
        .into_iter()
        .map(|(fact_key, organization)| {
            let key = claim_key(&organization, &fact_key, &mut used);
            Claim::unverified(
                subject_id,
                Dimension::Experience,
                EvidenceCategory::JobTenure,
                "tenure",
                Some(&key),
                format!(
                    "stated tenure at '{organization}' is corroborated by independent evidence"
                ),
                rubric.weight(Dimension::Experience),
                Some(fact_key),
            )
        })
        .collect()
}

/// Claim-id key for one asserted fact.
///
/// Slugging drops punctuation, so distinct fact keys can land on the
/// same slug ("C" and "C++" both slug to "c"). The first taker, in
/// sorted fact-key order, keeps the bare slug; later ones append a
/// short digest of their fact key so every fact gets its own claim id.
fn claim_key(name: &str, fact_key: &str, used: &mut BTreeSet<String>) -> String {
    let slug = slugify(name);
    if used.insert(slug.clone()) {
        return slug;
    }
    let suffixed = format!("{slug}-{}", short_hex(&content_digest(fact_key.as_bytes()), 4));
    used.insert(suffixed.clone());
    suffixed
}

/// Lowercases and collapses non-alphanumerics to single dashes.
fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        slug.push_str("unnamed");
    }
    slug
}
