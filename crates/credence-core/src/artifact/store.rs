//! Artifact storage with content-hash verification.
//!
//! The store persists raw producer bytes immutably, keyed by an identifier
//! derived from (subject, kind, content). It guarantees:
//!
//! - Content integrity: the content digest is recomputed on every read and
//!   a mismatch is fatal for that artifact.
//! - Idempotent ingestion: re-submitting identical bytes admits the same
//!   artifact again with `is_new = false` instead of creating a duplicate.
//! - Immutability: admitted content is never overwritten.
//!
//! # Architecture
//!
//! [`ArtifactStore`] is a trait so the engine can run against different
//! backends; [`MemoryArtifactStore`] is the in-process implementation used
//! by the evaluation pipeline and tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use thiserror::Error;

use super::{
    derive_artifact_id, Artifact, ArtifactKind, MAX_METADATA_ENTRIES, MAX_METADATA_KEY_LEN,
    MAX_METADATA_VALUE_LEN,
};
use crate::crypto::content_digest;

/// Default maximum artifact size (8 MB).
///
/// Work-sample artifacts are diffs, logs, and prose; anything larger is a
/// producer defect, not a bigger work sample.
pub const DEFAULT_MAX_ARTIFACT_SIZE: usize = 8 * 1024 * 1024;

/// Errors that can occur during artifact store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Empty content is rejected outright, never persisted.
    #[error("empty artifact content is not allowed")]
    EmptyContent,

    /// Content exceeds the configured size limit.
    #[error("artifact too large: {size} bytes exceeds maximum of {max_size} bytes")]
    ContentTooLarge {
        /// The actual size.
        size: usize,
        /// The maximum allowed size.
        max_size: usize,
    },

    /// Metadata exceeds the fixed entry or length bounds.
    #[error("artifact metadata invalid: {detail}")]
    MetadataInvalid {
        /// What bound was violated.
        detail: String,
    },

    /// No artifact admitted under the given identifier.
    #[error("artifact not found: {artifact_id}")]
    NotFound {
        /// The identifier that was not found.
        artifact_id: String,
    },

    /// Stored bytes no longer match the recorded content hash.
    ///
    /// This indicates corruption and is fatal for the artifact: claims
    /// depending on its evidence fall back to unverified.
    #[error("artifact integrity failure for {artifact_id}: expected {expected}, got {actual}")]
    IntegrityFailure {
        /// The corrupted artifact.
        artifact_id: String,
        /// The hash recorded at admission (hex-encoded).
        expected: String,
        /// The hash recomputed from stored bytes (hex-encoded).
        actual: String,
    },

    /// An identifier collision with different content.
    ///
    /// Cryptographically infeasible with Blake3; checked anyway so the
    /// store never silently aliases two submissions.
    #[error("artifact collision: {artifact_id} already admitted with different content")]
    Collision {
        /// The colliding identifier.
        artifact_id: String,
    },
}

/// Result of admitting an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    /// The admitted (or previously admitted) artifact record.
    pub artifact: Artifact,
    /// Whether this submission was new (`true`) or deduplicated (`false`).
    pub is_new: bool,
}

/// Trait for artifact storage backends.
///
/// Implementations must ensure:
/// 1. Empty content is rejected before anything is persisted.
/// 2. Content is verified against its recorded hash on every read.
/// 3. Byte-identical re-submission is deduplicated, not duplicated.
/// 4. Admitted content is immutable.
pub trait ArtifactStore: Send + Sync {
    /// Admits producer content and returns the artifact record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::EmptyContent`] if `content` is empty
    /// - [`StoreError::ContentTooLarge`] if `content` exceeds the limit
    /// - [`StoreError::MetadataInvalid`] if metadata exceeds fixed bounds
    /// - [`StoreError::Collision`] if the derived identifier is already
    ///   bound to different bytes (should never happen)
    fn put(
        &self,
        subject_id: &str,
        kind: ArtifactKind,
        content: &[u8],
        collected_at_ms: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<Admission, StoreError>;

    /// Retrieves artifact content, re-verifying its hash.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no artifact has this identifier
    /// - [`StoreError::IntegrityFailure`] if stored bytes no longer match
    ///   the hash recorded at admission
    fn get(&self, artifact_id: &str) -> Result<Vec<u8>, StoreError>;

    /// Retrieves the artifact record without its content.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no artifact has this identifier.
    fn meta(&self, artifact_id: &str) -> Result<Artifact, StoreError>;

    /// Whether an artifact with this identifier has been admitted.
    fn exists(&self, artifact_id: &str) -> bool;

    /// All artifact records for a subject, sorted by identifier.
    fn for_subject(&self, subject_id: &str) -> Vec<Artifact>;
}

/// Validates producer metadata against the fixed bounds.
fn validate_metadata(metadata: &BTreeMap<String, String>) -> Result<(), StoreError> {
    if metadata.len() > MAX_METADATA_ENTRIES {
        return Err(StoreError::MetadataInvalid {
            detail: format!(
                "{} entries exceeds maximum of {MAX_METADATA_ENTRIES}",
                metadata.len()
            ),
        });
    }
    for (key, value) in metadata {
        if key.is_empty() || key.len() > MAX_METADATA_KEY_LEN {
            return Err(StoreError::MetadataInvalid {
                detail: format!("key length {} outside 1..={MAX_METADATA_KEY_LEN}", key.len()),
            });
        }
        if value.len() > MAX_METADATA_VALUE_LEN {
            return Err(StoreError::MetadataInvalid {
                detail: format!(
                    "value for {key:?} is {} bytes, maximum is {MAX_METADATA_VALUE_LEN}",
                    value.len()
                ),
            });
        }
    }
    Ok(())
}

/// An admitted artifact plus its raw bytes.
#[derive(Debug, Clone)]
struct StoredArtifact {
    meta: Artifact,
    content: Vec<u8>,
}

/// In-memory artifact store.
///
/// Cloning shares the underlying storage, so the pipeline and its extraction
/// workers can hold handles to the same store.
#[derive(Debug, Clone)]
pub struct MemoryArtifactStore {
    storage: Arc<RwLock<HashMap<String, StoredArtifact>>>,
    max_artifact_size: usize,
}

impl Default for MemoryArtifactStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryArtifactStore {
    /// Creates a store with the default per-artifact size limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_ARTIFACT_SIZE)
    }

    /// Creates a store with a custom per-artifact size limit.
    #[must_use]
    pub fn with_max_size(max_artifact_size: usize) -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            max_artifact_size,
        }
    }

    /// Returns the number of admitted artifacts.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn len(&self) -> usize {
        self.storage.read().expect("lock poisoned").len()
    }

    /// Returns true if no artifacts have been admitted.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned (indicates a thread panic).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.read().expect("lock poisoned").is_empty()
    }

    /// Corrupts stored bytes for an artifact.
    ///
    /// Test-only hook for exercising read-time integrity failures.
    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&self, artifact_id: &str) {
        let mut storage = self.storage.write().expect("lock poisoned");
        if let Some(stored) = storage.get_mut(artifact_id) {
            stored.content[0] ^= 0xff;
        }
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn put(
        &self,
        subject_id: &str,
        kind: ArtifactKind,
        content: &[u8],
        collected_at_ms: u64,
        metadata: BTreeMap<String, String>,
    ) -> Result<Admission, StoreError> {
        if content.is_empty() {
            return Err(StoreError::EmptyContent);
        }
        if content.len() > self.max_artifact_size {
            return Err(StoreError::ContentTooLarge {
                size: content.len(),
                max_size: self.max_artifact_size,
            });
        }
        validate_metadata(&metadata)?;

        let id = derive_artifact_id(subject_id, kind, content);
        let content_hash = hex::encode(content_digest(content));

        let mut storage = self.storage.write().expect("lock poisoned");

        if let Some(existing) = storage.get(&id) {
            // Collision detection: same derived id must mean same bytes.
            if existing.content != content {
                return Err(StoreError::Collision { artifact_id: id });
            }
            // Idempotent re-ingestion keeps the first admission's record.
            return Ok(Admission {
                artifact: existing.meta.clone(),
                is_new: false,
            });
        }

        let meta = Artifact {
            id: id.clone(),
            subject_id: subject_id.to_string(),
            kind,
            content_hash,
            size: content.len(),
            collected_at_ms,
            metadata,
        };
        storage.insert(
            id,
            StoredArtifact {
                meta: meta.clone(),
                content: content.to_vec(),
            },
        );

        Ok(Admission {
            artifact: meta,
            is_new: true,
        })
    }

    fn get(&self, artifact_id: &str) -> Result<Vec<u8>, StoreError> {
        let storage = self.storage.read().expect("lock poisoned");

        let stored = storage.get(artifact_id).ok_or_else(|| StoreError::NotFound {
            artifact_id: artifact_id.to_string(),
        })?;

        // Read-time integrity check: the only place raw bytes are trusted.
        let actual = hex::encode(content_digest(&stored.content));
        if actual != stored.meta.content_hash {
            return Err(StoreError::IntegrityFailure {
                artifact_id: artifact_id.to_string(),
                expected: stored.meta.content_hash.clone(),
                actual,
            });
        }

        Ok(stored.content.clone())
    }

    fn meta(&self, artifact_id: &str) -> Result<Artifact, StoreError> {
        let storage = self.storage.read().expect("lock poisoned");
        storage
            .get(artifact_id)
            .map(|stored| stored.meta.clone())
            .ok_or_else(|| StoreError::NotFound {
                artifact_id: artifact_id.to_string(),
            })
    }

    fn exists(&self, artifact_id: &str) -> bool {
        self.storage
            .read()
            .expect("lock poisoned")
            .contains_key(artifact_id)
    }

    fn for_subject(&self, subject_id: &str) -> Vec<Artifact> {
        let storage = self.storage.read().expect("lock poisoned");
        let mut artifacts: Vec<Artifact> = storage
            .values()
            .filter(|stored| stored.meta.subject_id == subject_id)
            .map(|stored| stored.meta.clone())
            .collect();
        // Sorted so downstream extraction order never depends on HashMap
        // iteration order.
        artifacts.sort_by(|a, b| a.id.cmp(&b.id));
        artifacts
    }
}
