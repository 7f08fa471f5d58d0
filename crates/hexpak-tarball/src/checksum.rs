//! SHA-256 checksums and their hex rendering.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// A 32-byte SHA-256 digest.
///
/// Rendered as 64 uppercase hex characters when embedded in tarballs or
/// shown to users.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Checksum([u8; 32]);

impl Checksum {
    /// Compute the checksum of a byte buffer.
    pub fn of(bytes: &[u8]) -> Self {
        Self(Sha256::digest(bytes).into())
    }

    /// Finalize a running hasher into a checksum.
    pub(crate) fn from_hasher(hasher: Sha256) -> Self {
        Self(hasher.finalize().into())
    }

    /// Parse a hex rendering. Returns `None` unless the input decodes to
    /// exactly 32 bytes; both hex cases are accepted.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let bytes: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Render as 64 uppercase hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Checksum {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checksum({})", self.to_hex())
    }
}

/// Compare a tarball against the checksum a registry reported for it.
///
/// The outer checksum is the authoritative identity of a package artifact;
/// run this before trusting downloaded bytes.
pub fn verify_outer_checksum(tarball: &[u8], expected: &Checksum) -> Result<()> {
    let actual = Checksum::of(tarball);
    if actual != *expected {
        return Err(Error::ChecksumMismatch {
            expected: *expected,
            actual,
        });
    }
    Ok(())
}
