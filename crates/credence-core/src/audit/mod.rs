//! Append-only audit trail of claim status transitions.
//!
//! Every status change, whether produced by a proof rule or by a human
//! override, is recorded as a hash-chained entry: each entry's digest
//! covers its serialized body plus the previous entry's digest, so
//! editing or dropping any recorded transition breaks verification of
//! everything after it. The trail is the answer to "who decided this
//! claim, with what evidence, and when".
//!
//! # Overrides
//!
//! Manual overrides are first-class transitions with a named actor and a
//! required justification note. A claim can be overridden to any status
//! except `Verified`: verification only ever comes from a proof rule
//! citing admissible evidence.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::claim::{Claim, ClaimStatus};
use crate::crypto::{ChainError, EntryHasher, Hash, HASH_SIZE};
use crate::evidence::Confidence;

/// What caused a recorded transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TransitionKind {
    /// The proof-rule engine evaluated the claim.
    RuleEvaluation,
    /// A named human changed the status directly.
    ManualOverride,
}

impl TransitionKind {
    /// Canonical string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RuleEvaluation => "rule-evaluation",
            Self::ManualOverride => "manual-override",
        }
    }
}

impl std::fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while recording or verifying audit entries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuditError {
    /// The hash chain failed verification.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// A record body could not be serialized for hashing.
    #[error("audit record could not be serialized: {detail}")]
    Serialize {
        /// The serializer's message.
        detail: String,
    },

    /// A stored record's hash fields are not valid digests.
    #[error("audit record {index} is corrupt: {detail}")]
    Corrupt {
        /// Zero-based index of the corrupt record.
        index: usize,
        /// What was wrong with it.
        detail: String,
    },

    /// A manual override violated the override policy.
    #[error("invalid override: {detail}")]
    InvalidOverride {
        /// The violated constraint.
        detail: String,
    },
}

/// One recorded claim transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Position in the trail, starting at zero.
    pub seq: u64,
    /// Subject the claim belongs to.
    pub subject_id: String,
    /// The claim that moved.
    pub claim_id: String,
    /// What caused the move.
    pub kind: TransitionKind,
    /// Status before the transition.
    pub from: ClaimStatus,
    /// Status after the transition.
    pub to: ClaimStatus,
    /// Rule attribution after the transition, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    /// Evidence cited after the transition.
    #[serde(default)]
    pub evidence_refs: Vec<String>,
    /// Who caused the transition; `"engine"` for rule evaluations.
    pub actor: String,
    /// Free-text justification.
    pub note: String,
    /// When the transition happened, milliseconds since the epoch
    /// (caller-supplied).
    pub at_ms: u64,
    /// Hex digest of the previous entry (genesis zeros for the first).
    pub prev_hash: String,
    /// Hex digest of this entry.
    pub entry_hash: String,
}

/// The hashed portion of a record; everything except the chain fields.
#[derive(Serialize)]
struct RecordBody<'a> {
    seq: u64,
    subject_id: &'a str,
    claim_id: &'a str,
    kind: TransitionKind,
    from: ClaimStatus,
    to: ClaimStatus,
    rule_id: Option<&'a str>,
    evidence_refs: &'a [String],
    actor: &'a str,
    note: &'a str,
    at_ms: u64,
}

impl AuditRecord {
    fn body(&self) -> RecordBody<'_> {
        RecordBody {
            seq: self.seq,
            subject_id: &self.subject_id,
            claim_id: &self.claim_id,
            kind: self.kind,
            from: self.from,
            to: self.to,
            rule_id: self.rule_id.as_deref(),
            evidence_refs: &self.evidence_refs,
            actor: &self.actor,
            note: &self.note,
            at_ms: self.at_ms,
        }
    }
}

/// Actor recorded for engine-driven transitions.
pub const ENGINE_ACTOR: &str = "engine";

/// An in-memory, hash-chained audit trail.
#[derive(Debug, Default)]
pub struct AuditTrail {
    records: Vec<AuditRecord>,
    head: Hash,
}

impl AuditTrail {
    /// An empty trail whose first entry will link to the genesis hash.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a transition already applied to `claim`.
    ///
    /// `from` is the status before the transition; the record captures
    /// the claim's current status, rule attribution, and citations.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Serialize`] if the record body cannot be
    /// encoded for hashing.
    pub fn record_transition(
        &mut self,
        claim: &Claim,
        from: ClaimStatus,
        kind: TransitionKind,
        actor: &str,
        note: &str,
        at_ms: u64,
    ) -> Result<&AuditRecord, AuditError> {
        let seq = self.records.len() as u64;
        let body = RecordBody {
            seq,
            subject_id: &claim.subject_id,
            claim_id: &claim.id,
            kind,
            from,
            to: claim.status,
            rule_id: claim.rule_id.as_deref(),
            evidence_refs: &claim.evidence_refs,
            actor,
            note,
            at_ms,
        };
        let bytes = serde_json::to_vec(&body).map_err(|error| AuditError::Serialize {
            detail: error.to_string(),
        })?;
        let entry_hash = EntryHasher::hash_entry(&bytes, &self.head);

        let record = AuditRecord {
            seq,
            subject_id: claim.subject_id.clone(),
            claim_id: claim.id.clone(),
            kind,
            from,
            to: claim.status,
            rule_id: claim.rule_id.clone(),
            evidence_refs: claim.evidence_refs.clone(),
            actor: actor.to_string(),
            note: note.to_string(),
            at_ms,
            prev_hash: hex::encode(self.head),
            entry_hash: hex::encode(entry_hash),
        };
        self.head = entry_hash;
        self.records.push(record);
        debug!(
            claim_id = %claim.id,
            %kind,
            from = %from,
            to = %claim.status,
            "transition recorded"
        );
        Ok(self.records.last().expect("record just pushed"))
    }

    /// Applies and records a manual override.
    ///
    /// The claim is mutated: its status becomes `to`, rule attribution is
    /// cleared, and the note becomes its reason. Overriding to
    /// `Unverified` also clears citations and zeroes confidence so the
    /// claim returns to its fail-closed shape.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::InvalidOverride`] when the actor or note is
    /// empty, the status would not change, or the target status is
    /// `Verified`.
    pub fn record_override(
        &mut self,
        claim: &mut Claim,
        to: ClaimStatus,
        actor: &str,
        note: &str,
        at_ms: u64,
    ) -> Result<&AuditRecord, AuditError> {
        if actor.trim().is_empty() {
            return Err(AuditError::InvalidOverride {
                detail: "an override must name its actor".to_string(),
            });
        }
        if note.trim().is_empty() {
            return Err(AuditError::InvalidOverride {
                detail: "an override must carry a justification note".to_string(),
            });
        }
        if to == ClaimStatus::Verified {
            return Err(AuditError::InvalidOverride {
                detail: "a claim cannot be verified by override; only proof rules verify"
                    .to_string(),
            });
        }
        if claim.status == to {
            return Err(AuditError::InvalidOverride {
                detail: format!("claim is already {to}"),
            });
        }

        let from = claim.status;
        claim.status = to;
        claim.rule_id = None;
        claim.reason = note.to_string();
        if to == ClaimStatus::Unverified {
            claim.evidence_refs.clear();
            claim.confidence = Confidence::ZERO;
        }
        self.record_transition(claim, from, TransitionKind::ManualOverride, actor, note, at_ms)
    }

    /// Re-verifies the whole chain from genesis.
    ///
    /// # Errors
    ///
    /// Returns the first failure found: a corrupt hash field, a broken
    /// link, or a body that no longer matches its recorded digest.
    pub fn verify_chain(&self) -> Result<(), AuditError> {
        let mut expected_prev = EntryHasher::GENESIS_PREV_HASH;
        for (index, record) in self.records.iter().enumerate() {
            let prev = decode_hash(index, &record.prev_hash)?;
            let entry = decode_hash(index, &record.entry_hash)?;
            EntryHasher::verify_link(index, &prev, &expected_prev)?;
            let bytes =
                serde_json::to_vec(&record.body()).map_err(|error| AuditError::Serialize {
                    detail: error.to_string(),
                })?;
            EntryHasher::verify_entry(index, &bytes, &prev, &entry)?;
            expected_prev = entry;
        }
        Ok(())
    }

    /// All records in append order.
    #[must_use]
    pub fn records(&self) -> &[AuditRecord] {
        &self.records
    }

    /// Records touching one claim, in append order.
    pub fn for_claim<'a>(&'a self, claim_id: &'a str) -> impl Iterator<Item = &'a AuditRecord> {
        self.records
            .iter()
            .filter(move |record| record.claim_id == claim_id)
    }

    /// Hex digest of the newest entry (genesis zeros when empty).
    #[must_use]
    pub fn head_hash(&self) -> String {
        hex::encode(self.head)
    }

    /// Number of recorded transitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn decode_hash(index: usize, hex_digest: &str) -> Result<Hash, AuditError> {
    let bytes = hex::decode(hex_digest).map_err(|error| AuditError::Corrupt {
        index,
        detail: error.to_string(),
    })?;
    Hash::try_from(bytes.as_slice()).map_err(|_| AuditError::Corrupt {
        index,
        detail: format!("digest is {} bytes, expected {HASH_SIZE}", hex_digest.len() / 2),
    })
}
