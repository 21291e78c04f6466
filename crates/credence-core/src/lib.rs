//! # credence-core
//!
//! Evidence-gated verification of claims about a candidate's work
//! products.
//!
//! The engine ingests the artifacts of a work sample (diff, test log,
//! coverage report, writeup), extracts machine-checkable evidence from
//! them, and evaluates a set of claims about the candidate against that
//! evidence using explicit proof rules. Every status a claim reaches is
//! attributable: a rule id, the evidence records it cited, and a
//! hash-chained audit record of the transition.
//!
//! The central guarantee is fail-closed verification. A claim can only
//! become `Verified` through a proof rule citing at least one intact,
//! better-than-self-reported evidence record; absence of evidence leaves
//! a claim `Unverified` with an explicit reason, never silently passed.
//!
//! ## Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use std::sync::atomic::AtomicBool;
//!
//! use credence_core::artifact::ArtifactKind;
//! use credence_core::config::EngineConfig;
//! use credence_core::pipeline::Pipeline;
//! use credence_core::profile::{calibrate, IntakeAnswers};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(EngineConfig::default())?;
//! pipeline.ingest(
//!     "cand-42",
//!     ArtifactKind::TestLog,
//!     b"running 8 tests\ntest result: ok. 8 passed; 0 failed\n",
//!     1_000,
//!     BTreeMap::new(),
//! )?;
//!
//! let profile = calibrate(&IntakeAnswers {
//!     pace: 4,
//!     quality_bar: 4,
//!     ambiguity: 2,
//!     priorities: Vec::new(),
//!     risk_aversions: Vec::new(),
//! })?;
//!
//! let outcome =
//!     pipeline.evaluate_subject("cand-42", &profile, 2_000, &AtomicBool::new(false))?;
//! assert!(outcome
//!     .report
//!     .verified
//!     .iter()
//!     .any(|claim| claim.id == "clm-test-discipline-suite-passes"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`artifact`]: content-addressed artifact admission and storage
//! - [`extract`]: per-kind extractors from artifact bytes to evidence
//! - [`assistant`]: narrative-assistant boundary for writeup assertions,
//!   confidence-capped at self-reported
//! - [`evidence`]: evidence records, categories, payloads, confidence
//! - [`aggregate`]: dedup, cross-source corroboration, contradiction
//!   detection
//! - [`profile`]: intake calibration into an operating profile
//! - [`rubric`]: profile-derived dimension weights and thresholds
//! - [`claim`]: claim generation from rubric and evidence
//! - [`engine`]: proof-rule registry, evaluation, and verdict admission
//! - [`report`]: report assembly, coverage, risk flags, proof ratio
//! - [`audit`]: hash-chained audit trail of claim transitions
//! - [`pipeline`]: end-to-end orchestration of an evaluation
//! - [`config`]: TOML engine configuration
//! - [`crypto`]: content digests and audit chain hashing

pub mod aggregate;
pub mod artifact;
pub mod assistant;
pub mod audit;
pub mod claim;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod evidence;
pub mod extract;
pub mod pipeline;
pub mod profile;
pub mod report;
pub mod rubric;

pub use aggregate::EvidenceSet;
pub use artifact::{ArtifactKind, ArtifactStore, MemoryArtifactStore};
pub use claim::{Claim, ClaimStatus};
pub use config::EngineConfig;
pub use evidence::{Confidence, Evidence, EvidenceCategory};
pub use pipeline::{EvaluationOutcome, Pipeline, PipelineError};
pub use profile::{calibrate, recalibrate, IntakeAnswers, OperatingProfile};
pub use report::Report;
pub use rubric::Rubric;
