//! The proof-rule engine: the only component that moves a claim's status.
//!
//! # Architecture
//!
//! Rules are registered in a scope-keyed registry, sorted by rule
//! identifier within each scope so evaluation order never depends on
//! registration order. Evaluating a claim runs every rule in its scope
//! and combines the admitted verdicts by fixed precedence: the first
//! `Verified` wins outright, else the first `Contradicted`, else the
//! first `Partial`, else the claim stays `Unverified` carrying every
//! rule's stated reason.
//!
//! # Failure policy
//!
//! The engine fails closed. A `Verified` verdict is admitted only when
//! it cites at least one evidence record, every cited record resolves to
//! an active (non-superseded) record in the set, and at least one cited
//! record's confidence strictly exceeds the self-reported cap.
//! `Contradicted` and `Partial` verdicts must also cite resolving
//! evidence or they are downgraded to `Unverified`. A rule that returns
//! an error is treated as a rejected evaluation, never as a verdict.
//! No path writes `Verified` without the full admission check.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::aggregate::EvidenceSet;
use crate::claim::{Claim, ClaimStatus};
use crate::evidence::{Confidence, EvidenceCategory};
use crate::rubric::{Dimension, Thresholds};

mod rules;

pub use rules::{ProofRule, FOCUS_BLOWOUT_MULTIPLIER};

/// Errors raised inside rule evaluation; any of these rejects the
/// evaluation rather than producing a verdict.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuleError {
    /// An assertion rule was handed a claim without a fact key.
    #[error("claim {claim_id} carries no fact key for an assertion rule")]
    MissingFactKey {
        /// The mis-wired claim.
        claim_id: String,
    },
}

/// A rule's proposed outcome for one claim, prior to admission checks.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    /// Proposed status.
    pub status: ClaimStatus,
    /// Explanation of the proposal.
    pub reason: String,
    /// Evidence records the proposal cites.
    pub evidence_refs: Vec<String>,
    /// Confidence granted if the proposal is admitted.
    pub confidence: Confidence,
}

impl RuleVerdict {
    /// A verdict claiming verification, citing supporting evidence.
    #[must_use]
    pub fn verified(
        reason: impl Into<String>,
        evidence_refs: Vec<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            status: ClaimStatus::Verified,
            reason: reason.into(),
            evidence_refs,
            confidence,
        }
    }

    /// A verdict claiming the evidence disproves the claim.
    #[must_use]
    pub fn contradicted(
        reason: impl Into<String>,
        evidence_refs: Vec<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            status: ClaimStatus::Contradicted,
            reason: reason.into(),
            evidence_refs,
            confidence,
        }
    }

    /// A verdict claiming partial support.
    #[must_use]
    pub fn partial(
        reason: impl Into<String>,
        evidence_refs: Vec<String>,
        confidence: Confidence,
    ) -> Self {
        Self {
            status: ClaimStatus::Partial,
            reason: reason.into(),
            evidence_refs,
            confidence,
        }
    }

    /// A verdict declining to move the claim.
    #[must_use]
    pub fn unverified(reason: impl Into<String>) -> Self {
        Self {
            status: ClaimStatus::Unverified,
            reason: reason.into(),
            evidence_refs: Vec::new(),
            confidence: Confidence::ZERO,
        }
    }
}

/// Scope-keyed rule registry plus the evaluation loop.
#[derive(Debug, Clone, Default)]
pub struct ProofRuleEngine {
    registry: BTreeMap<(Dimension, EvidenceCategory), Vec<ProofRule>>,
}

impl ProofRuleEngine {
    /// An engine with no rules; every claim stays unverified.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: BTreeMap::new(),
        }
    }

    /// An engine loaded with every built-in rule.
    #[must_use]
    pub fn with_builtin_rules() -> Self {
        let mut engine = Self::new();
        for rule in ProofRule::all() {
            engine.register(rule);
        }
        engine
    }

    /// Registers a rule under its scope; duplicates are ignored and the
    /// scope's rules stay sorted by identifier.
    pub fn register(&mut self, rule: ProofRule) {
        let slot = self.registry.entry(rule.scope()).or_default();
        if !slot.contains(&rule) {
            slot.push(rule);
            slot.sort_by_key(|r| r.id());
        }
    }

    /// The rules registered for one (dimension, category) scope, in
    /// evaluation order.
    #[must_use]
    pub fn rules_for(&self, dimension: Dimension, category: EvidenceCategory) -> &[ProofRule] {
        self.registry
            .get(&(dimension, category))
            .map_or(&[], Vec::as_slice)
    }

    /// Evaluates one claim in place.
    ///
    /// After this returns the claim's status, confidence, cited
    /// evidence, rule attribution, and reason reflect the combined
    /// verdict; non-verified claims also carry follow-up questions for
    /// a human interviewer.
    pub fn evaluate(&self, claim: &mut Claim, evidence: &EvidenceSet, thresholds: &Thresholds) {
        let rules = self.rules_for(claim.dimension, claim.category);
        if rules.is_empty() {
            apply_unverified(claim, "no proof rule covers this claim".to_string());
            attach_followups(claim);
            return;
        }

        let mut first_contradicted: Option<(ProofRule, RuleVerdict)> = None;
        let mut first_partial: Option<(ProofRule, RuleVerdict)> = None;
        let mut reasons: Vec<String> = Vec::new();

        for &rule in rules {
            let verdict = match rule.evaluate(claim, evidence, thresholds) {
                Ok(verdict) => verdict,
                Err(error) => {
                    warn!(
                        rule = rule.id(),
                        claim_id = %claim.id,
                        %error,
                        "rule evaluation rejected"
                    );
                    reasons.push(format!("{}: evaluation rejected", rule.id()));
                    continue;
                },
            };
            match admit(rule, verdict, evidence) {
                Admitted::Accepted(verdict) if verdict.status == ClaimStatus::Verified => {
                    apply(claim, rule, verdict);
                    attach_followups(claim);
                    debug!(claim_id = %claim.id, rule = rule.id(), "claim verified");
                    return;
                },
                Admitted::Accepted(verdict) if verdict.status == ClaimStatus::Contradicted => {
                    if first_contradicted.is_none() {
                        first_contradicted = Some((rule, verdict));
                    }
                },
                Admitted::Accepted(verdict) => {
                    if first_partial.is_none() {
                        first_partial = Some((rule, verdict));
                    }
                },
                Admitted::Declined(reason) => {
                    reasons.push(format!("{}: {reason}", rule.id()));
                },
            }
        }

        if let Some((rule, verdict)) = first_contradicted {
            apply(claim, rule, verdict);
        } else if let Some((rule, verdict)) = first_partial {
            apply(claim, rule, verdict);
        } else {
            apply_unverified(claim, reasons.join("; "));
        }
        attach_followups(claim);
        debug!(claim_id = %claim.id, status = %claim.status, "claim evaluated");
    }
}

/// Outcome of the admission check on one verdict.
enum Admitted {
    /// The verdict passed admission and may move the claim.
    Accepted(RuleVerdict),
    /// The verdict was rejected or declined; only its reason survives.
    Declined(String),
}

/// Applies the fail-closed admission checks to a proposed verdict.
fn admit(rule: ProofRule, mut verdict: RuleVerdict, evidence: &EvidenceSet) -> Admitted {
    verdict.evidence_refs.sort_unstable();
    verdict.evidence_refs.dedup();

    match verdict.status {
        ClaimStatus::Verified => {
            if verdict.evidence_refs.is_empty() {
                warn!(rule = rule.id(), "verified verdict cited no evidence; rejected");
                return Admitted::Declined("verification rejected: cited no evidence".to_string());
            }
            if !verdict.evidence_refs.iter().all(|id| evidence.is_active(id)) {
                warn!(
                    rule = rule.id(),
                    "verified verdict cited unknown or superseded evidence; rejected"
                );
                return Admitted::Declined(
                    "verification rejected: cited unknown or superseded evidence".to_string(),
                );
            }
            let strong_citation = verdict
                .evidence_refs
                .iter()
                .filter_map(|id| evidence.by_id(id))
                .any(|record| {
                    record.confidence.value() > Confidence::SELF_REPORTED_CAP.value()
                });
            if !strong_citation {
                warn!(
                    rule = rule.id(),
                    "verified verdict cited only low-confidence evidence; rejected"
                );
                return Admitted::Declined(
                    "verification rejected: cited only low-confidence evidence".to_string(),
                );
            }
            Admitted::Accepted(verdict)
        },
        ClaimStatus::Contradicted | ClaimStatus::Partial => {
            if verdict.evidence_refs.is_empty()
                || !verdict.evidence_refs.iter().all(|id| evidence.is_active(id))
            {
                return Admitted::Declined(verdict.reason);
            }
            Admitted::Accepted(verdict)
        },
        ClaimStatus::Unverified => Admitted::Declined(verdict.reason),
    }
}

fn apply(claim: &mut Claim, rule: ProofRule, verdict: RuleVerdict) {
    claim.status = verdict.status;
    claim.confidence = verdict.confidence;
    claim.evidence_refs = verdict.evidence_refs;
    claim.rule_id = Some(rule.id().to_string());
    claim.reason = verdict.reason;
}

fn apply_unverified(claim: &mut Claim, reason: String) {
    claim.status = ClaimStatus::Unverified;
    claim.confidence = Confidence::ZERO;
    claim.evidence_refs.clear();
    claim.rule_id = None;
    claim.reason = if reason.is_empty() {
        "no admissible evidence".to_string()
    } else {
        reason
    };
}

/// Questions a human should ask when a claim in this category did not
/// verify.
fn followup_questions(category: EvidenceCategory) -> &'static [&'static str] {
    match category {
        EvidenceCategory::CommitPattern => {
            &["Can you walk through the change and its test strategy?"]
        },
        EvidenceCategory::TestExecution => {
            &["Can you re-run the suite and share the full runner output?"]
        },
        EvidenceCategory::TestCoverage => {
            &["Can you regenerate the coverage report with per-file totals?"]
        },
        EvidenceCategory::DocumentationQuality => {
            &["Can you expand the writeup to cover the missing topics?"]
        },
        EvidenceCategory::SelfReported => &[
            "Which project best demonstrates this skill?",
            "Who can vouch for this skill firsthand?",
        ],
        EvidenceCategory::JobTenure => {
            &["Can you share a reference or document covering this employment period?"]
        },
        EvidenceCategory::Timing => {
            &["Did anything outside the work sample affect the completion time?"]
        },
    }
}

fn attach_followups(claim: &mut Claim) {
    if claim.status == ClaimStatus::Verified {
        return;
    }
    for question in followup_questions(claim.category) {
        if !claim.followup_questions.iter().any(|q| q == question) {
            claim.followup_questions.push((*question).to_string());
        }
    }
}
