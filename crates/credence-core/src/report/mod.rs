//! Report assembly: the verification outcome in one deterministic
//! document.
//!
//! A report never averages a score. Claims are partitioned by status,
//! dimension coverage is classified, and anything that should worry a
//! reviewer becomes an explicit risk flag. Serialization is canonical:
//! sorted claim lists, ordered maps, and fixed field order, so two
//! assemblies from identical inputs are byte-identical and hash equal.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::aggregate::EvidenceSet;
use crate::claim::{Claim, ClaimStatus};
use crate::crypto::keyed_digest;
use crate::evidence::EvidenceCategory;
use crate::rubric::{Dimension, Rubric};

/// Schema identifier embedded in serialized reports.
pub const REPORT_SCHEMA: &str = "credence.report.v1";

/// Domain separator for report hashing.
pub const REPORT_HASH_DOMAIN: &[u8] = b"credence.report.v1";

/// Contradicted claims at or above this relevance become risk flags.
pub const HIGH_WEIGHT_THRESHOLD: f64 = 0.2;

/// Proof ratios below this trigger a risk flag.
pub const LOW_PROOF_RATIO: f64 = 0.5;

/// How well a rubric dimension is supported by verified claims.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum CoverageLevel {
    /// Every claim in the dimension verified.
    Covered,
    /// Some claims verified, or partial support exists.
    Partial,
    /// No verified or partially verified claims.
    Uncovered,
}

impl CoverageLevel {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Covered => "covered",
            Self::Partial => "partial",
            Self::Uncovered => "uncovered",
        }
    }
}

impl std::fmt::Display for CoverageLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something a reviewer should look at before trusting the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
#[non_exhaustive]
pub enum RiskFlag {
    /// A high-weight claim was contradicted by evidence.
    ContradictedClaim {
        /// The contradicted claim.
        claim_id: String,
        /// Its rubric dimension.
        dimension: Dimension,
        /// Its relevance weight at generation time.
        weight: f64,
    },
    /// A rubric dimension has no verified support at all.
    UncoveredDimension {
        /// The unsupported dimension.
        dimension: Dimension,
    },
    /// Independent sources disagree about a fact.
    EvidenceContradiction {
        /// Category of the disputed fact.
        category: EvidenceCategory,
        /// Artifacts on the two sides of the dispute, sorted.
        artifact_ids: Vec<String>,
    },
    /// An artifact failed its digest check and was excluded.
    IntegrityFailure {
        /// The excluded artifact.
        artifact_id: String,
    },
    /// Too little of the claimed picture is actually proven.
    LowProofRatio {
        /// The observed ratio.
        ratio: f64,
    },
}

/// The assembled verification report for one subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Schema identifier, always [`REPORT_SCHEMA`].
    pub schema: String,
    /// The evaluated subject.
    pub subject_id: String,
    /// The rubric snapshot the claims were evaluated against.
    pub rubric: Rubric,
    /// Assembly time, milliseconds since the epoch (caller-supplied).
    pub generated_at_ms: u64,
    /// Verified claims, sorted by identifier.
    pub verified: Vec<Claim>,
    /// Partially supported claims, sorted by identifier.
    pub partial: Vec<Claim>,
    /// Contradicted claims, sorted by identifier.
    pub contradicted: Vec<Claim>,
    /// Unverified claims, sorted by identifier.
    pub unverified: Vec<Claim>,
    /// Coverage classification per rubric dimension.
    pub coverage: BTreeMap<Dimension, CoverageLevel>,
    /// Reviewer-facing warnings, in deterministic order.
    pub risk_flags: Vec<RiskFlag>,
    /// Verified claims over claims with non-zero relevance.
    pub proof_ratio: f64,
    /// Total number of claims evaluated.
    pub claims_total: usize,
    /// Claims with a non-zero relevance weight.
    pub claims_relevant: usize,
}

impl Report {
    /// Canonical digest of the serialized report, hex encoded.
    ///
    /// # Errors
    ///
    /// Returns the serialization error if the report cannot be encoded.
    pub fn compute_hash(&self) -> Result<String, serde_json::Error> {
        let bytes = serde_json::to_vec(self)?;
        Ok(hex::encode(keyed_digest(REPORT_HASH_DOMAIN, &[&bytes])))
    }
}

/// Assembles the report from evaluated claims and the published
/// evidence.
///
/// `integrity_failures` lists artifacts excluded by digest mismatch;
/// each becomes a risk flag. The claims are consumed and partitioned.
#[must_use]
pub fn assemble(
    subject_id: &str,
    rubric: &Rubric,
    claims: Vec<Claim>,
    evidence: &EvidenceSet,
    integrity_failures: &[String],
    generated_at_ms: u64,
) -> Report {
    let claims_total = claims.len();
    let claims_relevant = claims.iter().filter(|c| c.relevance > 0.0).count();
    let verified_relevant = claims
        .iter()
        .filter(|c| c.relevance > 0.0 && c.status == ClaimStatus::Verified)
        .count();
    let proof_ratio = if claims_relevant > 0 {
        verified_relevant as f64 / claims_relevant as f64
    } else {
        0.0
    };

    let coverage = classify_coverage(rubric, &claims);

    let mut verified = Vec::new();
    let mut partial = Vec::new();
    let mut contradicted = Vec::new();
    let mut unverified = Vec::new();
    for claim in claims {
        match claim.status {
            ClaimStatus::Verified => verified.push(claim),
            ClaimStatus::Partial => partial.push(claim),
            ClaimStatus::Contradicted => contradicted.push(claim),
            ClaimStatus::Unverified => unverified.push(claim),
        }
    }
    for bucket in [&mut verified, &mut partial, &mut contradicted, &mut unverified] {
        bucket.sort_by(|a, b| a.id.cmp(&b.id));
    }

    let mut risk_flags = Vec::new();
    for claim in &contradicted {
        if claim.relevance >= HIGH_WEIGHT_THRESHOLD {
            risk_flags.push(RiskFlag::ContradictedClaim {
                claim_id: claim.id.clone(),
                dimension: claim.dimension,
                weight: claim.relevance,
            });
        }
    }
    for (&dimension, &level) in &coverage {
        if level == CoverageLevel::Uncovered {
            risk_flags.push(RiskFlag::UncoveredDimension { dimension });
        }
    }
    for ((category, _fact_key), artifact_ids) in evidence.contradiction_clusters() {
        risk_flags.push(RiskFlag::EvidenceContradiction {
            category,
            artifact_ids,
        });
    }
    let mut failed: Vec<String> = integrity_failures.to_vec();
    failed.sort_unstable();
    failed.dedup();
    for artifact_id in failed {
        risk_flags.push(RiskFlag::IntegrityFailure { artifact_id });
    }
    if claims_relevant > 0 && proof_ratio < LOW_PROOF_RATIO {
        risk_flags.push(RiskFlag::LowProofRatio { ratio: proof_ratio });
    }

    Report {
        schema: REPORT_SCHEMA.to_string(),
        subject_id: subject_id.to_string(),
        rubric: rubric.clone(),
        generated_at_ms,
        verified,
        partial,
        contradicted,
        unverified,
        coverage,
        risk_flags,
        proof_ratio,
        claims_total,
        claims_relevant,
    }
}

/// Classifies each rubric dimension by the strength of its claims.
fn classify_coverage(
    rubric: &Rubric,
    claims: &[Claim],
) -> BTreeMap<Dimension, CoverageLevel> {
    let mut coverage = BTreeMap::new();
    for &dimension in rubric.weights.keys() {
        let mut total = 0usize;
        let mut verified = 0usize;
        let mut partial = 0usize;
        for claim in claims.iter().filter(|c| c.dimension == dimension) {
            total += 1;
            match claim.status {
                ClaimStatus::Verified => verified += 1,
                ClaimStatus::Partial => partial += 1,
                _ => {},
            }
        }
        let level = if total == 0 {
            CoverageLevel::Uncovered
        } else if verified == total {
            CoverageLevel::Covered
        } else if verified > 0 || partial > 0 {
            CoverageLevel::Partial
        } else {
            CoverageLevel::Uncovered
        };
        coverage.insert(dimension, level);
    }
    coverage
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::evidence::{Confidence, Evidence, EvidencePayload};
    use crate::profile::{calibrate, IntakeAnswers};

    fn rubric() -> Rubric {
        Rubric::derive(
            &calibrate(&IntakeAnswers {
                pace: 3,
                quality_bar: 3,
                ambiguity: 3,
                priorities: Vec::new(),
                risk_aversions: Vec::new(),
            })
            .unwrap(),
        )
    }

    fn claim(
        id: &str,
        dimension: Dimension,
        category: EvidenceCategory,
        status: ClaimStatus,
        relevance: f64,
    ) -> Claim {
        Claim {
            id: id.to_string(),
            subject_id: "cand-1".to_string(),
            dimension,
            category,
            statement: "statement".to_string(),
            status,
            confidence: Confidence::new(0.9),
            relevance,
            evidence_refs: vec!["ev-1".to_string()],
            rule_id: Some("tests/suite-passes@v1".to_string()),
            reason: "because".to_string(),
            fact_key: None,
            followup_questions: Vec::new(),
        }
    }

    fn default_claims() -> Vec<Claim> {
        vec![
            claim(
                "clm-test-discipline-suite-passes",
                Dimension::TestDiscipline,
                EvidenceCategory::TestExecution,
                ClaimStatus::Verified,
                0.25,
            ),
            claim(
                "clm-test-discipline-coverage-bar",
                Dimension::TestDiscipline,
                EvidenceCategory::TestCoverage,
                ClaimStatus::Partial,
                0.25,
            ),
            claim(
                "clm-code-quality-focused-change",
                Dimension::CodeQuality,
                EvidenceCategory::CommitPattern,
                ClaimStatus::Verified,
                0.25,
            ),
            claim(
                "clm-completion-speed-timely-completion",
                Dimension::CompletionSpeed,
                EvidenceCategory::Timing,
                ClaimStatus::Contradicted,
                0.15,
            ),
            claim(
                "clm-communication-writeup-topics",
                Dimension::Communication,
                EvidenceCategory::DocumentationQuality,
                ClaimStatus::Unverified,
                0.15,
            ),
        ]
    }

    #[test]
    fn test_partitions_sorted_by_id() {
        let report = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 1_000);
        assert_eq!(report.verified.len(), 2);
        assert_eq!(report.partial.len(), 1);
        assert_eq!(report.contradicted.len(), 1);
        assert_eq!(report.unverified.len(), 1);
        assert!(report.verified[0].id < report.verified[1].id);
        assert_eq!(report.claims_total, 5);
        assert_eq!(report.claims_relevant, 5);
        assert_eq!(report.schema, REPORT_SCHEMA);
        assert_eq!(report.generated_at_ms, 1_000);
        // The rubric is snapshotted into the report, not referenced.
        assert_eq!(report.rubric, rubric());
    }

    #[test]
    fn test_coverage_classification() {
        let report = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 0);
        assert_eq!(report.coverage[&Dimension::CodeQuality], CoverageLevel::Covered);
        assert_eq!(report.coverage[&Dimension::TestDiscipline], CoverageLevel::Partial);
        assert_eq!(
            report.coverage[&Dimension::CompletionSpeed],
            CoverageLevel::Uncovered
        );
        // No experience claims at all.
        assert_eq!(report.coverage[&Dimension::Experience], CoverageLevel::Uncovered);
    }

    #[test]
    fn test_proof_ratio_counts_relevant_claims() {
        let report = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 0);
        // 2 of the 5 relevant claims verified.
        assert!((report.proof_ratio - 0.4).abs() < 1e-9);

        // Zero-relevance claims are outside both sides of the ratio.
        let mut claims = default_claims();
        claims.push(claim(
            "clm-experience-skill-rust",
            Dimension::Experience,
            EvidenceCategory::SelfReported,
            ClaimStatus::Unverified,
            0.0,
        ));
        let report = assemble("cand-1", &rubric(), claims, &EvidenceSet::default(), &[], 0);
        assert_eq!(report.claims_total, 6);
        assert_eq!(report.claims_relevant, 5);
        assert!((report.proof_ratio - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty_claims_give_zero_ratio_not_nan() {
        let report =
            assemble("cand-1", &rubric(), Vec::new(), &EvidenceSet::default(), &[], 0);
        assert!((report.proof_ratio - 0.0).abs() < f64::EPSILON);
        assert_eq!(report.claims_total, 0);
        // Every dimension uncovered; no low-ratio flag without claims.
        assert!(report
            .risk_flags
            .iter()
            .all(|flag| !matches!(flag, RiskFlag::LowProofRatio { .. })));
        assert_eq!(
            report
                .risk_flags
                .iter()
                .filter(|flag| matches!(flag, RiskFlag::UncoveredDimension { .. }))
                .count(),
            5
        );
    }

    #[test]
    fn test_high_weight_contradiction_flagged() {
        let mut claims = default_claims();
        claims[0].status = ClaimStatus::Contradicted;
        let report = assemble("cand-1", &rubric(), claims, &EvidenceSet::default(), &[], 0);
        assert!(report.risk_flags.iter().any(|flag| matches!(
            flag,
            RiskFlag::ContradictedClaim { claim_id, .. }
                if claim_id == "clm-test-discipline-suite-passes"
        )));
        // The 0.15-weight timing contradiction stays below the flag bar.
        assert!(!report.risk_flags.iter().any(|flag| matches!(
            flag,
            RiskFlag::ContradictedClaim { claim_id, .. }
                if claim_id == "clm-completion-speed-timely-completion"
        )));
    }

    #[test]
    fn test_integrity_failures_become_flags() {
        let failures = vec!["art-bad".to_string(), "art-bad".to_string()];
        let report = assemble(
            "cand-1",
            &rubric(),
            default_claims(),
            &EvidenceSet::default(),
            &failures,
            0,
        );
        let integrity: Vec<&RiskFlag> = report
            .risk_flags
            .iter()
            .filter(|flag| matches!(flag, RiskFlag::IntegrityFailure { .. }))
            .collect();
        assert_eq!(integrity.len(), 1);
    }

    #[test]
    fn test_evidence_contradiction_flagged() {
        let mut a = Evidence::new(
            "cand-1",
            "art-1",
            EvidenceCategory::JobTenure,
            "fact",
            Confidence::new(0.5),
            EvidencePayload::Tenure {
                organization: "Acme".to_string(),
                months: 24,
            },
            0,
        );
        a.contradiction_detected = true;
        let mut b = Evidence::new(
            "cand-1",
            "art-2",
            EvidenceCategory::JobTenure,
            "fact",
            Confidence::new(0.5),
            EvidencePayload::Tenure {
                organization: "Acme".to_string(),
                months: 60,
            },
            0,
        );
        b.contradiction_detected = true;
        let set = EvidenceSet::from_records(vec![a, b]);

        let report = assemble("cand-1", &rubric(), default_claims(), &set, &[], 0);
        assert!(report.risk_flags.iter().any(|flag| matches!(
            flag,
            RiskFlag::EvidenceContradiction { category, artifact_ids }
                if *category == EvidenceCategory::JobTenure && artifact_ids.len() == 2
        )));
    }

    #[test]
    fn test_low_proof_ratio_flagged() {
        let mut claims = default_claims();
        for claim in &mut claims {
            claim.status = ClaimStatus::Unverified;
        }
        let report = assemble("cand-1", &rubric(), claims, &EvidenceSet::default(), &[], 0);
        assert!(report
            .risk_flags
            .iter()
            .any(|flag| matches!(flag, RiskFlag::LowProofRatio { .. })));
    }

    #[test]
    fn test_identical_inputs_hash_identically() {
        let a = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 42);
        let b = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 42);
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
        assert_eq!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }

    #[test]
    fn test_hash_tracks_content() {
        let a = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 42);
        let mut claims = default_claims();
        claims[0].status = ClaimStatus::Unverified;
        let b = assemble("cand-1", &rubric(), claims, &EvidenceSet::default(), &[], 42);
        assert_ne!(a.compute_hash().unwrap(), b.compute_hash().unwrap());
    }

    #[test]
    fn test_report_serde_round_trip() {
        let report = assemble("cand-1", &rubric(), default_claims(), &EvidenceSet::default(), &[], 42);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"schema\":\"credence.report.v1\""));
        let parsed: Report = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }
}
