// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Content identifiers and content-addressed block storage for Echo.
//!
//! `echo-cas` provides [`Cid`], a self-describing identifier (codec + BLAKE3
//! digest), and a [`BlockStore`] port keyed by it. Two tiers ship here:
//! [`MemoryTier`] for tests and embedding, and [`DiskTier`] which keeps one file
//! per block.
//!
//! # Hash Domain Policy
//!
//! The digest is content-only: `BLAKE3(bytes)` with no domain prefix. The codec
//! lives next to the digest in the identifier, so the same bytes stored under
//! two codecs share a digest but are distinct blocks.
//!
//! # Determinism Invariant
//!
//! No public API exposes store iteration order.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::unreadable_literal,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

pub mod cid;
mod disk;
mod memory;

pub use cid::Cid;
pub use disk::DiskTier;
pub use memory::MemoryTier;

use std::sync::Arc;

/// A 32-byte BLAKE3 content hash.
///
/// The inner bytes are public for zero-cost access; the `Display` impl renders
/// lowercase hex for logging and error messages.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlobHash(pub [u8; 32]);

impl BlobHash {
    /// View the hash as a byte slice.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for BlobHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Compute the BLAKE3 content hash of `bytes`.
pub fn blob_hash(bytes: &[u8]) -> BlobHash {
    let hash = blake3::hash(bytes);
    BlobHash(*hash.as_bytes())
}

/// Errors that can occur during CAS operations.
#[derive(Debug, thiserror::Error)]
pub enum CasError {
    /// Block bytes did not match the declared hash.
    #[error("[CAS_HASH_MISMATCH] expected {expected}, computed {computed}")]
    HashMismatch {
        /// The hash that was declared/expected.
        expected: BlobHash,
        /// The hash actually computed from the bytes.
        computed: BlobHash,
    },
    /// Text or binary form is not a well-formed identifier.
    #[error("[CAS_INVALID_CID] {reason}")]
    InvalidCid {
        /// Why parsing failed.
        reason: String,
    },
    /// Backing storage failed.
    #[error("[CAS_IO] {0}")]
    Io(#[from] std::io::Error),
}

/// Content-addressed block store.
///
/// Implementations store opaque byte blocks keyed by their [`Cid`].
///
/// # Absence Semantics
///
/// [`get`](BlockStore::get) returns `Ok(None)` for missing blocks; this is
/// **not** an error. Error variants are reserved for integrity violations and
/// storage faults.
pub trait BlockStore {
    /// Hash and store `bytes` under `codec`. Returns the identifier.
    fn put(&mut self, codec: u64, bytes: &[u8]) -> Result<Cid, CasError>;

    /// Store with a pre-computed identifier. Rejects if the digest does not
    /// match; on mismatch the store is unchanged.
    fn put_verified(&mut self, cid: Cid, bytes: &[u8]) -> Result<(), CasError>;

    /// Retrieve a block. Returns `Ok(None)` if not stored.
    fn get(&self, cid: &Cid) -> Result<Option<Arc<[u8]>>, CasError>;

    /// Check existence without retrieving.
    fn has(&self, cid: &Cid) -> bool;
}
