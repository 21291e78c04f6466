//! Cryptographic primitives: content digests, identifier derivation, and
//! the audit hash chain.

mod hash;

pub use hash::{
    ChainError, EntryHasher, Hash, HASH_SIZE, content_digest, keyed_digest, short_hex,
};
