//! Blake3 digests and hash-chain primitives.
//!
//! Two distinct uses share this module:
//!
//! - **Identifier digests**: artifact, evidence, and report identifiers are
//!   derived from content through [`keyed_digest`], which prefixes a domain
//!   separator so that identical bytes hashed for different purposes can
//!   never collide across namespaces.
//! - **Audit chaining**: [`EntryHasher`] links audit records so that any
//!   retroactive edit to a recorded claim transition is detectable without
//!   trusting the storage layer.

use thiserror::Error;

/// Size of a Blake3 digest in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte digest.
pub type Hash = [u8; HASH_SIZE];

/// Errors that can occur while verifying a hash chain.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ChainError {
    /// The previous-hash field does not match the prior entry's digest.
    #[error("hash chain broken at entry {index}: expected {expected}, got {actual}")]
    ChainBroken {
        /// Zero-based index of the offending entry.
        index: usize,
        /// The digest the chain required at this position.
        expected: String,
        /// The digest actually recorded.
        actual: String,
    },

    /// An entry's recorded digest does not match its recomputed digest.
    #[error("entry digest mismatch at entry {index}: expected {expected}, got {actual}")]
    DigestMismatch {
        /// Zero-based index of the offending entry.
        index: usize,
        /// The digest recorded on the entry.
        expected: String,
        /// The digest recomputed from the entry body.
        actual: String,
    },
}

/// Digest of raw content without any chain or domain context.
///
/// Used by the artifact store for read-time integrity verification, where
/// the digest must be a function of the stored bytes alone.
#[must_use]
pub fn content_digest(content: &[u8]) -> Hash {
    *blake3::hash(content).as_bytes()
}

/// Domain-separated digest over an ordered sequence of parts.
///
/// Each part is preceded by its length as a little-endian `u64`, so that
/// `["ab", "c"]` and `["a", "bc"]` produce different digests.
#[must_use]
pub fn keyed_digest(domain: &[u8], parts: &[&[u8]]) -> Hash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(domain);
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

/// Short hex prefix of a digest, for use in human-readable identifiers.
#[must_use]
pub fn short_hex(hash: &Hash, bytes: usize) -> String {
    hex::encode(&hash[..bytes.min(HASH_SIZE)])
}

/// Hasher for append-only audit entries.
///
/// Each entry digest is computed over `prev_hash || body`, linking every
/// entry to its predecessor. The first entry links to
/// [`EntryHasher::GENESIS_PREV_HASH`].
pub struct EntryHasher;

impl EntryHasher {
    /// The zero digest used as the previous hash for the first entry.
    pub const GENESIS_PREV_HASH: Hash = [0u8; HASH_SIZE];

    /// Hashes an entry body with chain linking.
    ///
    /// The digest is computed over: `prev_hash || body`.
    #[must_use]
    pub fn hash_entry(body: &[u8], prev_hash: &Hash) -> Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(prev_hash);
        hasher.update(body);
        *hasher.finalize().as_bytes()
    }

    /// Verifies that an entry digest matches its recomputed value.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::DigestMismatch`] if the recorded digest does
    /// not match the digest recomputed from `body` and `prev_hash`.
    pub fn verify_entry(
        index: usize,
        body: &[u8],
        prev_hash: &Hash,
        recorded: &Hash,
    ) -> Result<(), ChainError> {
        let computed = Self::hash_entry(body, prev_hash);
        if computed != *recorded {
            return Err(ChainError::DigestMismatch {
                index,
                expected: hex::encode(recorded),
                actual: hex::encode(computed),
            });
        }
        Ok(())
    }

    /// Verifies the link between an entry and its predecessor's digest.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::ChainBroken`] if the entry's previous-hash
    /// field does not equal the predecessor's digest.
    pub fn verify_link(
        index: usize,
        entry_prev_hash: &Hash,
        predecessor_hash: &Hash,
    ) -> Result<(), ChainError> {
        if entry_prev_hash != predecessor_hash {
            return Err(ChainError::ChainBroken {
                index,
                expected: hex::encode(predecessor_hash),
                actual: hex::encode(entry_prev_hash),
            });
        }
        Ok(())
    }

    /// Verifies an entire chain of entries from genesis.
    ///
    /// # Arguments
    ///
    /// * `entries` - Iterator of (body, `prev_hash`, `entry_hash`) tuples in
    ///   append order.
    ///
    /// # Errors
    ///
    /// Returns the first [`ChainError`] found: either a broken link or a
    /// digest that does not match its body.
    pub fn verify_chain<'a>(
        entries: impl IntoIterator<Item = (&'a [u8], &'a Hash, &'a Hash)>,
    ) -> Result<(), ChainError> {
        let mut expected_prev = Self::GENESIS_PREV_HASH;

        for (index, (body, prev_hash, entry_hash)) in entries.into_iter().enumerate() {
            Self::verify_link(index, prev_hash, &expected_prev)?;
            Self::verify_entry(index, body, prev_hash, entry_hash)?;
            expected_prev = *entry_hash;
        }

        Ok(())
    }
}
