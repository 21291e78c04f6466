//! Narrative-assistant boundary.
//!
//! The assistant is a text service that may suggest auxiliary tags (skills,
//! stated tenure) from a writeup. It is an untrusted collaborator:
//!
//! - Its output is validated against an explicit [`TagSchema`]; anything
//!   non-conforming is discarded as "no evidence produced".
//! - Accepted tags become evidence capped at
//!   [`Confidence::SELF_REPORTED_CAP`] and flagged `needs_verification`,
//!   so they can corroborate but never prove a claim alone.
//! - Calls carry a deadline. A slow or failed assistant degrades to no
//!   additional evidence; it can never block or fail an evaluation run.
//! - The assistant has no access to claims or verdicts, only to the text
//!   it is asked to annotate.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::evidence::{Confidence, Evidence, EvidenceCategory, EvidencePayload};

/// Default deadline for one assistant call.
pub const DEFAULT_ASSISTANT_TIMEOUT_MS: u64 = 4_000;

/// Default maximum number of tags accepted from one call.
pub const DEFAULT_MAX_TAGS: usize = 16;

/// Maximum accepted tag name length in bytes.
pub const MAX_TAG_NAME_LEN: usize = 64;

/// Maximum accepted tag value length in bytes.
pub const MAX_TAG_VALUE_LEN: usize = 256;

/// Maximum plausible stated tenure, in months (50 years).
pub const MAX_TENURE_MONTHS: u32 = 600;

/// What kind of fact a tag asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagKind {
    /// A skill or tool the subject claims familiarity with.
    Skill,
    /// Stated employment tenure at an organization.
    Tenure,
}

/// The schema an assistant response must conform to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagSchema {
    /// Maximum number of tags accepted.
    pub max_tags: usize,
    /// Tag kinds the caller will accept.
    pub kinds: Vec<TagKind>,
}

impl Default for TagSchema {
    fn default() -> Self {
        Self {
            max_tags: DEFAULT_MAX_TAGS,
            kinds: vec![TagKind::Skill, TagKind::Tenure],
        }
    }
}

/// One tag as returned by the assistant, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTag {
    /// What kind of fact this is.
    pub kind: TagKind,
    /// Tag name: the skill, or the organization for tenure.
    pub name: String,
    /// Optional qualifier (proficiency phrase, role).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Stated tenure in months; required for tenure tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<u32>,
    /// Assistant's own confidence estimate in `[0, 1]`.
    pub confidence: f64,
}

/// Errors from the assistant boundary.
///
/// All of these are recoverable: the caller logs them and continues with
/// no additional evidence.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssistantError {
    /// The call ran past its deadline and was abandoned.
    #[error("assistant call exceeded deadline of {timeout_ms} ms")]
    Timeout {
        /// The deadline that was exceeded.
        timeout_ms: u64,
    },

    /// The assistant reported a failure of its own.
    #[error("assistant call failed: {detail}")]
    Failed {
        /// Assistant-reported detail.
        detail: String,
    },

    /// The response does not conform to the requested schema.
    #[error("assistant response violates schema: {detail}")]
    SchemaViolation {
        /// What was violated.
        detail: String,
    },

    /// The worker thread disappeared without reporting a result.
    #[error("assistant call aborted before producing a result")]
    Aborted,
}

/// A narrative-assistant implementation.
///
/// Implementations annotate text with tags conforming to `schema`. They
/// are never handed claims, rubric data, or evidence.
pub trait NarrativeAssistant: Send + Sync {
    /// Annotates `text` with tags conforming to `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`AssistantError::Failed`] (or any other variant) when no
    /// conforming annotation can be produced. The caller treats every
    /// error identically: no additional evidence.
    fn annotate(&self, text: &str, schema: &TagSchema) -> Result<Vec<RawTag>, AssistantError>;
}

/// An assistant that never produces tags.
///
/// Used when assistant annotation is disabled by configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAssistant;

impl NarrativeAssistant for NullAssistant {
    fn annotate(&self, _text: &str, _schema: &TagSchema) -> Result<Vec<RawTag>, AssistantError> {
        Ok(Vec::new())
    }
}

/// Calls the assistant with a hard deadline.
///
/// The call runs on a dedicated thread; if the deadline passes, the
/// thread is abandoned (it holds no locks and its result is discarded on
/// arrival) and [`AssistantError::Timeout`] is returned. Results are
/// validated against `schema` before being returned.
///
/// # Errors
///
/// Any [`AssistantError`]; all are recoverable for the caller.
pub fn annotate_with_deadline(
    assistant: &Arc<dyn NarrativeAssistant>,
    text: String,
    schema: &TagSchema,
    timeout: Duration,
) -> Result<Vec<RawTag>, AssistantError> {
    let (sender, receiver) = mpsc::channel();
    let worker_assistant = Arc::clone(assistant);
    let worker_schema = schema.clone();
    thread::spawn(move || {
        let result = worker_assistant.annotate(&text, &worker_schema);
        // Receiver may be gone if the deadline already passed.
        let _ = sender.send(result);
    });

    match receiver.recv_timeout(timeout) {
        Ok(Ok(tags)) => validate_tags(tags, schema),
        Ok(Err(error)) => Err(error),
        Err(mpsc::RecvTimeoutError::Timeout) => Err(AssistantError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AssistantError::Aborted),
    }
}

/// Validates an assistant response against the schema.
///
/// Enforced strictly: one out-of-schema tag rejects the whole response,
/// because a response that violates the schema anywhere is not a response
/// the schema describes.
///
/// # Errors
///
/// Returns [`AssistantError::SchemaViolation`] describing the first
/// violation found.
pub fn validate_tags(
    tags: Vec<RawTag>,
    schema: &TagSchema,
) -> Result<Vec<RawTag>, AssistantError> {
    if tags.len() > schema.max_tags {
        return Err(AssistantError::SchemaViolation {
            detail: format!("{} tags exceeds maximum of {}", tags.len(), schema.max_tags),
        });
    }
    for tag in &tags {
        if !schema.kinds.contains(&tag.kind) {
            return Err(AssistantError::SchemaViolation {
                detail: format!("tag kind {:?} not requested", tag.kind),
            });
        }
        let name = tag.name.trim();
        if name.is_empty() || name.len() > MAX_TAG_NAME_LEN {
            return Err(AssistantError::SchemaViolation {
                detail: format!("tag name length {} outside 1..={MAX_TAG_NAME_LEN}", name.len()),
            });
        }
        if let Some(value) = &tag.value {
            if value.len() > MAX_TAG_VALUE_LEN {
                return Err(AssistantError::SchemaViolation {
                    detail: format!(
                        "tag value length {} exceeds {MAX_TAG_VALUE_LEN}",
                        value.len()
                    ),
                });
            }
        }
        if !tag.confidence.is_finite() || !(0.0..=1.0).contains(&tag.confidence) {
            return Err(AssistantError::SchemaViolation {
                detail: format!("tag confidence {} outside [0, 1]", tag.confidence),
            });
        }
        match tag.kind {
            TagKind::Tenure => match tag.months {
                None => {
                    return Err(AssistantError::SchemaViolation {
                        detail: format!("tenure tag {name:?} missing months"),
                    });
                },
                Some(months) if months == 0 || months > MAX_TENURE_MONTHS => {
                    return Err(AssistantError::SchemaViolation {
                        detail: format!(
                            "tenure tag {name:?} months {months} outside 1..={MAX_TENURE_MONTHS}"
                        ),
                    });
                },
                Some(_) => {},
            },
            TagKind::Skill => {},
        }
    }
    Ok(tags)
}

/// Converts validated tags into evidence records.
///
/// Every record is capped at [`Confidence::SELF_REPORTED_CAP`] and
/// flagged `needs_verification`: assistant-derived facts are the
/// subject's own narrative repeated back, never measurement.
#[must_use]
pub fn tags_to_evidence(
    subject_id: &str,
    writeup_artifact_id: &str,
    tags: &[RawTag],
    extracted_at_ms: u64,
) -> Vec<Evidence> {
    let mut evidence: Vec<Evidence> = tags
        .iter()
        .map(|tag| {
            let confidence =
                Confidence::new(tag.confidence).capped_at(Confidence::SELF_REPORTED_CAP);
            let (category, fact, payload) = match tag.kind {
                TagKind::Skill => {
                    let name = tag.name.trim().to_string();
                    let fact = match &tag.value {
                        Some(value) => format!("self-reported skill: {name} ({value})"),
                        None => format!("self-reported skill: {name}"),
                    };
                    (
                        EvidenceCategory::SelfReported,
                        fact,
                        EvidencePayload::Tag {
                            name,
                            value: tag.value.clone(),
                        },
                    )
                },
                TagKind::Tenure => {
                    let organization = tag.name.trim().to_string();
                    let months = tag.months.unwrap_or(0);
                    (
                        EvidenceCategory::JobTenure,
                        format!("stated tenure: {months} months at {organization}"),
                        EvidencePayload::Tenure {
                            organization,
                            months,
                        },
                    )
                },
            };
            Evidence::new(
                subject_id,
                writeup_artifact_id,
                category,
                fact,
                confidence,
                payload,
                extracted_at_ms,
            )
            .with_needs_verification()
        })
        .collect();

    // Stable order regardless of assistant output order.
    evidence.sort_by(|a, b| a.id.cmp(&b.id));
    evidence.dedup_by(|a, b| a.id == b.id);
    if !evidence.is_empty() {
        warn!(
            subject_id,
            count = evidence.len(),
            "assistant tags admitted as capped self-reported evidence"
        );
    }
    evidence
}
