//! Artifact ingestion types.
//!
//! An artifact is an immutable raw input handed over by the external work
//! producer: a code diff, a test log, a coverage report, a writeup, or a
//! code sample. Artifacts are identified by a digest of their content so
//! that re-submitting identical bytes is idempotent, and their content hash
//! is re-verified on every read.

mod store;

pub use store::{
    Admission, ArtifactStore, MemoryArtifactStore, StoreError, DEFAULT_MAX_ARTIFACT_SIZE,
};

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{keyed_digest, short_hex};

/// Domain separator for artifact identifier derivation.
pub const ARTIFACT_ID_DOMAIN: &[u8] = b"credence.artifact.v1";

/// Maximum number of metadata entries accepted per artifact.
pub const MAX_METADATA_ENTRIES: usize = 32;

/// Maximum length of a metadata key in bytes.
pub const MAX_METADATA_KEY_LEN: usize = 128;

/// Maximum length of a metadata value in bytes.
pub const MAX_METADATA_VALUE_LEN: usize = 1024;

/// The fixed set of artifact types the producer may deliver.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum ArtifactKind {
    /// A unified code diff of the submitted change.
    Diff,
    /// A test-runner log with pass/fail counts.
    TestLog,
    /// A coverage report with line/branch percentages.
    Coverage,
    /// A free-text writeup authored by the subject.
    Writeup,
    /// A standalone code sample (stored, not machine-extracted).
    CodeSample,
}

impl ArtifactKind {
    /// Parses a producer-supplied type tag.
    ///
    /// Accepts kebab-case, snake_case, and any capitalization
    /// (`"test-log"`, `"TEST_LOG"`, `"Test-Log"` all parse).
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().replace('_', "-").as_str() {
            "diff" => Some(Self::Diff),
            "test-log" => Some(Self::TestLog),
            "coverage" => Some(Self::Coverage),
            "writeup" => Some(Self::Writeup),
            "code-sample" => Some(Self::CodeSample),
            _ => None,
        }
    }

    /// Canonical string tag for this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Diff => "diff",
            Self::TestLog => "test-log",
            Self::Coverage => "coverage",
            Self::Writeup => "writeup",
            Self::CodeSample => "code-sample",
        }
    }

    /// All kinds in canonical order.
    #[must_use]
    pub const fn all() -> [Self; 5] {
        [
            Self::Diff,
            Self::TestLog,
            Self::Coverage,
            Self::Writeup,
            Self::CodeSample,
        ]
    }

    /// Whether an extractor exists for this kind.
    ///
    /// Code samples are persisted for human review only; no machine
    /// extraction is defined for them.
    #[must_use]
    pub const fn is_extractable(&self) -> bool {
        !matches!(self, Self::CodeSample)
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable raw input, owned by the evaluation run that ingested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Identifier derived from (subject, kind, content).
    pub id: String,
    /// The subject this artifact was produced for.
    pub subject_id: String,
    /// Producer-declared artifact type.
    pub kind: ArtifactKind,
    /// Hex-encoded Blake3 digest of the content bytes.
    pub content_hash: String,
    /// Content size in bytes.
    pub size: usize,
    /// Producer-reported collection time, milliseconds since the epoch.
    pub collected_at_ms: u64,
    /// Free-form producer metadata (bounded, see `MAX_METADATA_*`).
    pub metadata: BTreeMap<String, String>,
}

/// Derives the artifact identifier for the given subject, kind, and bytes.
///
/// Identical bytes submitted twice for the same subject and kind derive the
/// same identifier, which is what makes re-ingestion idempotent. The same
/// bytes under a different kind or subject derive a distinct identifier.
#[must_use]
pub fn derive_artifact_id(subject_id: &str, kind: ArtifactKind, content: &[u8]) -> String {
    let digest = keyed_digest(
        ARTIFACT_ID_DOMAIN,
        &[subject_id.as_bytes(), kind.as_str().as_bytes(), content],
    );
    format!("art-{}", short_hex(&digest, 8))
}
