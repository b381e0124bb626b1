// crates/sqlcell-core/src/hashing.rs
// ============================================================================
// Module: sqlcell Digests
// Description: Message digests exposed to SQL as scalar functions.
// Purpose: Compute lowercase hex digests over raw cell bytes.
// Dependencies: md-5, sha1, sha2
// ============================================================================

//! ## Overview
//! Digests are computed over the raw bytes handed in by the engine and
//! rendered as lowercase hex. The algorithm set matches the SQL functions
//! registered by [`crate::functions`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use md5::Md5;
use sha1::Sha1;
use sha2::Digest;
use sha2::Sha224;
use sha2::Sha256;
use sha2::Sha384;
use sha2::Sha512;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// MD5 (legacy checksums only).
    Md5,
    /// SHA-1 (legacy checksums only).
    Sha1,
    /// SHA-224.
    Sha224,
    /// SHA-256.
    Sha256,
    /// SHA-384.
    Sha384,
    /// SHA-512.
    Sha512,
}

impl HashAlgorithm {
    /// Every supported algorithm, in registration order.
    pub const ALL: [Self; 6] =
        [Self::Md5, Self::Sha1, Self::Sha224, Self::Sha256, Self::Sha384, Self::Sha512];

    /// Returns the SQL function name for the algorithm.
    #[must_use]
    pub const fn sql_name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes and returns the lowercase hex digest.
#[must_use]
pub fn hex_digest(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => hex_encode(&Md5::digest(bytes)),
        HashAlgorithm::Sha1 => hex_encode(&Sha1::digest(bytes)),
        HashAlgorithm::Sha224 => hex_encode(&Sha224::digest(bytes)),
        HashAlgorithm::Sha256 => hex_encode(&Sha256::digest(bytes)),
        HashAlgorithm::Sha384 => hex_encode(&Sha384::digest(bytes)),
        HashAlgorithm::Sha512 => hex_encode(&Sha512::digest(bytes)),
    }
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
#[must_use]
pub fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
