//! Evaluation pipeline: artifact ingestion through report assembly.
//!
//! [`Pipeline`] owns one engine instance's moving parts: the artifact
//! store, compiled extraction settings, the proof-rule engine, the
//! optional narrative assistant, the published evidence per subject, and
//! the audit trail. A subject evaluation runs the stages in a fixed
//! order:
//!
//! 1. load the subject's artifacts, verifying stored bytes against their
//!    admission digests
//! 2. extract evidence from each artifact (fanned out across worker
//!    threads, collected back into artifact order)
//! 3. annotate writeups through the narrative assistant, if one is wired
//! 4. aggregate new evidence with the previously published set and
//!    publish the result atomically
//! 5. derive the rubric, generate claims, evaluate each against the
//!    proof rules, and record every transition in the audit trail
//! 6. assemble the report
//!
//! # Failure policy
//!
//! The pipeline degrades rather than aborts wherever a partial result is
//! still meaningful: an artifact whose bytes fail integrity verification
//! is excluded (and surfaced as a risk flag plus an explicit reason on
//! the claims it starves), an assistant failure costs only the
//! self-reported assertions, and unparseable artifacts simply contribute
//! no evidence. Cancellation and store or audit errors abort the
//! evaluation; nothing is published for the subject in that case.
//!
//! # Concurrency
//!
//! Evaluations for different subjects may run concurrently. A per-subject
//! lock serializes the aggregate-and-publish window, so two overlapping
//! evaluations of the same subject cannot interleave their read-modify-
//! write of the published evidence. Published sets are swapped in whole
//! behind an `RwLock`; readers always see a complete set.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, RwLock};
use std::thread;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{self, EvidenceSet};
use crate::artifact::{
    Admission, Artifact, ArtifactKind, ArtifactStore, MemoryArtifactStore, StoreError,
};
use crate::assistant::{annotate_with_deadline, tags_to_evidence, NarrativeAssistant, TagSchema};
use crate::audit::{AuditError, AuditRecord, AuditTrail, TransitionKind, ENGINE_ACTOR};
use crate::claim::{self, Claim, ClaimStatus};
use crate::config::EngineConfig;
use crate::engine::ProofRuleEngine;
use crate::evidence::{Evidence, EvidenceCategory};
use crate::extract::{self, CompiledExtract, SettingsError};
use crate::profile::OperatingProfile;
use crate::report::{self, Report};
use crate::rubric::Rubric;

/// Errors that abort a pipeline operation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    /// The artifact store rejected an operation.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Extraction settings failed to compile.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// The audit trail rejected a record.
    #[error(transparent)]
    Audit(#[from] AuditError),

    /// The caller cancelled the evaluation.
    #[error("evaluation cancelled for subject {subject_id}")]
    Cancelled {
        /// Subject whose evaluation was abandoned.
        subject_id: String,
    },
}

/// The product of one subject evaluation.
#[derive(Debug, Clone)]
pub struct EvaluationOutcome {
    /// The assembled report.
    pub report: Report,
    /// The evidence set the report was evaluated against, as published.
    pub evidence: Arc<EvidenceSet>,
}

/// One verification engine instance.
///
/// Cheap to share behind an [`Arc`]; all interior state is synchronized.
pub struct Pipeline {
    config: EngineConfig,
    extract_settings: CompiledExtract,
    store: MemoryArtifactStore,
    engine: ProofRuleEngine,
    assistant: Option<Arc<dyn NarrativeAssistant>>,
    tag_schema: TagSchema,
    published: RwLock<BTreeMap<String, Arc<EvidenceSet>>>,
    subject_locks: Mutex<BTreeMap<String, Arc<Mutex<()>>>>,
    audit: Mutex<AuditTrail>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .field("artifacts", &self.store.len())
            .field("assistant", &self.assistant.is_some())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Builds a pipeline from configuration, with no assistant wired.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Settings`] if the configured extraction
    /// patterns do not compile.
    pub fn new(config: EngineConfig) -> Result<Self, PipelineError> {
        let extract_settings = config.extract.compile()?;
        let store = MemoryArtifactStore::with_max_size(config.store.max_artifact_size);
        let tag_schema = TagSchema {
            max_tags: config.assistant.max_tags,
            ..TagSchema::default()
        };
        Ok(Self {
            config,
            extract_settings,
            store,
            engine: ProofRuleEngine::with_builtin_rules(),
            assistant: None,
            tag_schema,
            published: RwLock::new(BTreeMap::new()),
            subject_locks: Mutex::new(BTreeMap::new()),
            audit: Mutex::new(AuditTrail::new()),
        })
    }

    /// Wires a narrative assistant for writeup annotation.
    ///
    /// Without one (or with the assistant disabled in configuration),
    /// writeups still contribute structural evidence; only self-reported
    /// assertions are skipped.
    #[must_use]
    pub fn with_assistant(mut self, assistant: Arc<dyn NarrativeAssistant>) -> Self {
        self.assistant = Some(assistant);
        self
    }

    /// Admits an artifact into the store.
    ///
    /// Re-ingesting identical content is a no-op returning the original
    /// admission.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Store`] when the artifact is rejected.
    pub fn ingest(
        &self,
        subject_id: &str,
        kind: ArtifactKind,
        content: &[u8],
        collected_at_ms: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<Admission, PipelineError> {
        let admission = self
            .store
            .put(subject_id, kind, content, collected_at_ms, metadata)?;
        if admission.is_new {
            debug!(artifact_id = %admission.artifact.id, %kind, "artifact admitted");
        } else {
            debug!(
                artifact_id = %admission.artifact.id,
                %kind,
                "duplicate content resubmitted, keeping original admission"
            );
        }
        Ok(admission)
    }

    /// Runs a full evaluation for one subject.
    ///
    /// `now_ms` stamps extraction, audit records, and the report, so a
    /// caller replaying the same inputs with the same clock gets a
    /// byte-identical report. `cancel` is polled between stages; once it
    /// reads `true` the evaluation stops without publishing.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Cancelled`] when the cancel flag is set,
    /// or a store/audit error when a stage fails outright.
    pub fn evaluate_subject(
        &self,
        subject_id: &str,
        profile: &OperatingProfile,
        now_ms: u64,
        cancel: &AtomicBool,
    ) -> Result<EvaluationOutcome, PipelineError> {
        checkpoint(cancel, subject_id)?;

        let artifacts = self.store.for_subject(subject_id);
        let mut loaded: Vec<(Artifact, Vec<u8>)> = Vec::with_capacity(artifacts.len());
        let mut failed: Vec<(String, ArtifactKind)> = Vec::new();
        for artifact in artifacts {
            match self.store.get(&artifact.id) {
                Ok(content) => loaded.push((artifact, content)),
                Err(StoreError::IntegrityFailure { .. }) => {
                    warn!(
                        artifact_id = %artifact.id,
                        kind = %artifact.kind,
                        "stored bytes no longer match admission digest, excluding artifact"
                    );
                    failed.push((artifact.id.clone(), artifact.kind));
                },
                Err(error) => return Err(error.into()),
            }
        }

        checkpoint(cancel, subject_id)?;
        let mut extracted = self.extract_stage(&loaded, now_ms, cancel);
        checkpoint(cancel, subject_id)?;

        extracted.extend(self.assistant_stage(subject_id, &loaded, now_ms, cancel)?);
        checkpoint(cancel, subject_id)?;

        let evidence = self.aggregate_and_publish(subject_id, extracted);

        let rubric = Rubric::derive(profile);
        let mut claims = claim::generate(subject_id, &rubric, &evidence);

        let affected = affected_by_integrity(&failed);
        {
            let mut audit = self.audit.lock().expect("lock poisoned");
            for claim in &mut claims {
                let from = claim.status;
                self.engine.evaluate(claim, &evidence, &rubric.thresholds);
                if claim.status == ClaimStatus::Unverified {
                    if let Some(artifact_ids) = affected.get(&claim.category) {
                        for artifact_id in artifact_ids {
                            claim
                                .reason
                                .push_str(&format!("; evidence integrity failure on {artifact_id}"));
                        }
                    }
                }
                audit.record_transition(
                    claim,
                    from,
                    TransitionKind::RuleEvaluation,
                    ENGINE_ACTOR,
                    &claim.reason,
                    now_ms,
                )?;
            }
        }

        let integrity_ids: Vec<String> = failed.iter().map(|(id, _)| id.clone()).collect();
        let report = report::assemble(
            subject_id,
            &rubric,
            claims,
            &evidence,
            &integrity_ids,
            now_ms,
        );

        info!(
            subject_id,
            records = evidence.len(),
            verified = report.verified.len(),
            partial = report.partial.len(),
            contradicted = report.contradicted.len(),
            unverified = report.unverified.len(),
            risk_flags = report.risk_flags.len(),
            "subject evaluation complete"
        );

        Ok(EvaluationOutcome { report, evidence })
    }

    /// Applies a manual status override to a claim and records it.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Audit`] when the override violates policy
    /// (no actor, no note, no status change, or a verification attempt).
    pub fn override_claim(
        &self,
        claim: &mut Claim,
        to: ClaimStatus,
        actor: &str,
        note: &str,
        at_ms: u64,
    ) -> Result<(), PipelineError> {
        let mut audit = self.audit.lock().expect("lock poisoned");
        let record = audit.record_override(claim, to, actor, note, at_ms)?;
        info!(
            claim_id = %claim.id,
            to = %claim.status,
            actor,
            seq = record.seq,
            "manual override recorded"
        );
        Ok(())
    }

    /// The most recently published evidence set for a subject.
    #[must_use]
    pub fn evidence_for(&self, subject_id: &str) -> Option<Arc<EvidenceSet>> {
        self.published
            .read()
            .expect("lock poisoned")
            .get(subject_id)
            .cloned()
    }

    /// The underlying artifact store.
    #[must_use]
    pub fn store(&self) -> &MemoryArtifactStore {
        &self.store
    }

    /// The configuration this pipeline was built from.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Re-verifies the audit trail's hash chain from genesis.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Audit`] at the first corrupt, relinked,
    /// or tampered record.
    pub fn verify_audit_chain(&self) -> Result<(), PipelineError> {
        self.audit.lock().expect("lock poisoned").verify_chain()?;
        Ok(())
    }

    /// Audit records touching one claim, in append order.
    #[must_use]
    pub fn audit_records_for(&self, claim_id: &str) -> Vec<AuditRecord> {
        self.audit
            .lock()
            .expect("lock poisoned")
            .for_claim(claim_id)
            .cloned()
            .collect()
    }

    /// Total number of audit records.
    #[must_use]
    pub fn audit_len(&self) -> usize {
        self.audit.lock().expect("lock poisoned").len()
    }

    /// Extracts evidence from loaded artifacts, in artifact order.
    ///
    /// Results are collected into per-artifact slots keyed by index, so
    /// the output order never depends on worker scheduling.
    fn extract_stage(
        &self,
        loaded: &[(Artifact, Vec<u8>)],
        extracted_at_ms: u64,
        cancel: &AtomicBool,
    ) -> Vec<Evidence> {
        if loaded.is_empty() {
            return Vec::new();
        }
        let workers = self.config.pipeline.max_extract_workers.min(loaded.len());
        if workers <= 1 {
            return loaded
                .iter()
                .flat_map(|(artifact, content)| {
                    extract::extract(artifact, content, &self.extract_settings, extracted_at_ms)
                })
                .collect();
        }

        let mut slots: Vec<Vec<Evidence>> = vec![Vec::new(); loaded.len()];
        let cursor = AtomicUsize::new(0);
        let settings = &self.extract_settings;
        let (sender, receiver) = mpsc::channel::<(usize, Vec<Evidence>)>();
        thread::scope(|scope| {
            for _ in 0..workers {
                let sender = sender.clone();
                let cursor = &cursor;
                scope.spawn(move || loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some((artifact, content)) = loaded.get(index) else {
                        break;
                    };
                    let records = extract::extract(artifact, content, settings, extracted_at_ms);
                    if sender.send((index, records)).is_err() {
                        break;
                    }
                });
            }
            drop(sender);
            for (index, records) in receiver {
                slots[index] = records;
            }
        });
        slots.into_iter().flatten().collect()
    }

    /// Annotates writeups through the assistant, degrading on failure.
    fn assistant_stage(
        &self,
        subject_id: &str,
        loaded: &[(Artifact, Vec<u8>)],
        extracted_at_ms: u64,
        cancel: &AtomicBool,
    ) -> Result<Vec<Evidence>, PipelineError> {
        let Some(assistant) = &self.assistant else {
            return Ok(Vec::new());
        };
        if !self.config.assistant.enabled {
            return Ok(Vec::new());
        }

        let timeout = Duration::from_millis(self.config.assistant.timeout_ms);
        let mut evidence = Vec::new();
        for (artifact, content) in loaded {
            if artifact.kind != ArtifactKind::Writeup {
                continue;
            }
            checkpoint(cancel, subject_id)?;
            let text = String::from_utf8_lossy(content).into_owned();
            match annotate_with_deadline(assistant, text, &self.tag_schema, timeout) {
                Ok(tags) => {
                    debug!(artifact_id = %artifact.id, tags = tags.len(), "writeup annotated");
                    evidence.extend(tags_to_evidence(
                        subject_id,
                        &artifact.id,
                        &tags,
                        extracted_at_ms,
                    ));
                },
                Err(error) => {
                    warn!(
                        artifact_id = %artifact.id,
                        %error,
                        "assistant annotation failed, writeup contributes no assertions"
                    );
                },
            }
        }
        Ok(evidence)
    }

    /// Merges new evidence with the published set and swaps it in.
    fn aggregate_and_publish(&self, subject_id: &str, extracted: Vec<Evidence>) -> Arc<EvidenceSet> {
        let lock = self.subject_lock(subject_id);
        let _guard = lock.lock().expect("lock poisoned");

        let existing: Vec<Evidence> = {
            let published = self.published.read().expect("lock poisoned");
            published
                .get(subject_id)
                .map(|set| set.all().to_vec())
                .unwrap_or_default()
        };
        let merged = aggregate::aggregate(subject_id, extracted, &existing);
        let set = Arc::new(EvidenceSet::from_records(merged));
        self.published
            .write()
            .expect("lock poisoned")
            .insert(subject_id.to_string(), Arc::clone(&set));
        debug!(subject_id, records = set.len(), "evidence published");
        set
    }

    fn subject_lock(&self, subject_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.subject_locks.lock().expect("lock poisoned");
        Arc::clone(locks.entry(subject_id.to_string()).or_default())
    }
}

fn checkpoint(cancel: &AtomicBool, subject_id: &str) -> Result<(), PipelineError> {
    if cancel.load(Ordering::Relaxed) {
        return Err(PipelineError::Cancelled {
            subject_id: subject_id.to_string(),
        });
    }
    Ok(())
}

/// Maps integrity-failed artifacts to the evidence categories they starve.
fn affected_by_integrity(
    failed: &[(String, ArtifactKind)],
) -> BTreeMap<EvidenceCategory, Vec<String>> {
    let mut affected: BTreeMap<EvidenceCategory, Vec<String>> = BTreeMap::new();
    for (artifact_id, kind) in failed {
        for category in integrity_categories(*kind) {
            affected
                .entry(*category)
                .or_default()
                .push(artifact_id.clone());
        }
    }
    for artifact_ids in affected.values_mut() {
        artifact_ids.sort_unstable();
        artifact_ids.dedup();
    }
    affected
}

const fn integrity_categories(kind: ArtifactKind) -> &'static [EvidenceCategory] {
    match kind {
        ArtifactKind::Diff => &[EvidenceCategory::CommitPattern, EvidenceCategory::Timing],
        ArtifactKind::TestLog => &[EvidenceCategory::TestExecution],
        ArtifactKind::Coverage => &[EvidenceCategory::TestCoverage],
        ArtifactKind::Writeup => &[
            EvidenceCategory::DocumentationQuality,
            EvidenceCategory::SelfReported,
            EvidenceCategory::JobTenure,
        ],
        ArtifactKind::CodeSample => &[],
    }
}
