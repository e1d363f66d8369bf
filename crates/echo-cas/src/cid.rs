// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Self-describing content identifiers.
//!
//! A [`Cid`] names a block by the BLAKE3 hash of its bytes plus the codec that
//! knows how to decode it. The binary layout follows CIDv1:
//!
//! ```text
//! VERSION(varint = 1) || CODEC(varint) || 0x1e || 0x20 || DIGEST(32)
//! ```
//!
//! where `0x1e` is the multihash code for BLAKE3 and `0x20` the digest length.
//! The text form is multibase base16-lower: `"f"` followed by the lowercase
//! hex of the binary layout.

use std::fmt;
use std::str::FromStr;

use crate::{blob_hash, BlobHash, CasError};

/// Codec for opaque byte blocks.
pub const RAW: u64 = 0x55;
/// Codec for file/directory blocks (`dag-fs`).
pub const DAG_FS: u64 = 0x70;
/// Codec for structured CBOR blocks with tag-42 links (`dag-cbor`).
pub const DAG_CBOR: u64 = 0x71;

/// Multihash code for BLAKE3-256.
const BLAKE3_CODE: u64 = 0x1e;
/// Only version this crate emits or accepts.
const CID_VERSION: u64 = 1;
/// Multibase prefix for base16-lower.
const BASE16_LOWER: char = 'f';

/// A content identifier: version, codec and BLAKE3 digest.
///
/// Equality is byte-exact over the binary form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cid {
    codec: u64,
    digest: BlobHash,
}

impl Cid {
    /// Build an identifier from a codec and a pre-computed digest.
    pub fn new(codec: u64, digest: BlobHash) -> Self {
        Self { codec, digest }
    }

    /// Hash `bytes` and name them under `codec`.
    pub fn of(codec: u64, bytes: &[u8]) -> Self {
        Self::new(codec, blob_hash(bytes))
    }

    /// The content-type discriminator.
    pub fn codec(&self) -> u64 {
        self.codec
    }

    /// The BLAKE3 digest of the block bytes.
    pub fn digest(&self) -> &BlobHash {
        &self.digest
    }

    /// Recompute the digest of `bytes` and compare it against this identifier.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), CasError> {
        let computed = blob_hash(bytes);
        if computed != self.digest {
            return Err(CasError::HashMismatch {
                expected: self.digest,
                computed,
            });
        }
        Ok(())
    }

    /// Binary CIDv1 encoding.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 32 + 4);
        write_varint(CID_VERSION, &mut out);
        write_varint(self.codec, &mut out);
        write_varint(BLAKE3_CODE, &mut out);
        write_varint(32, &mut out);
        out.extend_from_slice(self.digest.as_bytes());
        out
    }

    /// Parse the binary CIDv1 encoding. Trailing bytes are rejected.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CasError> {
        let mut idx = 0usize;
        let version = read_varint(bytes, &mut idx)?;
        if version != CID_VERSION {
            return Err(invalid(format!("unsupported version {version}")));
        }
        let codec = read_varint(bytes, &mut idx)?;
        let hash_code = read_varint(bytes, &mut idx)?;
        if hash_code != BLAKE3_CODE {
            return Err(invalid(format!("unsupported multihash 0x{hash_code:x}")));
        }
        let len = read_varint(bytes, &mut idx)?;
        if len != 32 {
            return Err(invalid(format!("digest length {len}, expected 32")));
        }
        let rest = &bytes[idx..];
        let digest: [u8; 32] = match rest.try_into() {
            Ok(d) => d,
            Err(_) => {
                return Err(invalid(format!(
                    "digest needs 32 bytes, found {}",
                    rest.len()
                )))
            }
        };
        Ok(Self::new(codec, BlobHash(digest)))
    }
}

impl fmt::Display for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{BASE16_LOWER}{}", hex::encode(self.to_bytes()))
    }
}

impl fmt::Debug for Cid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cid({self})")
    }
}

impl FromStr for Cid {
    type Err = CasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some(body) = s.strip_prefix(BASE16_LOWER) else {
            return Err(invalid(format!("unknown multibase prefix in {s:?}")));
        };
        let bytes = hex::decode(body).map_err(|err| invalid(err.to_string()))?;
        Self::from_bytes(&bytes)
    }
}

fn invalid(reason: String) -> CasError {
    CasError::InvalidCid { reason }
}

/// Unsigned LEB128, as used by multiformats.
fn write_varint(mut value: u64, out: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn read_varint(bytes: &[u8], idx: &mut usize) -> Result<u64, CasError> {
    let mut value = 0u64;
    // multiformats caps varints at 9 bytes
    for shift in (0..63).step_by(7) {
        let Some(&byte) = bytes.get(*idx) else {
            return Err(invalid("truncated varint".into()));
        };
        *idx += 1;
        value |= u64::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            if byte == 0 && shift > 0 {
                return Err(invalid("non-minimal varint".into()));
            }
            return Ok(value);
        }
    }
    Err(invalid("varint overflow".into()))
}
