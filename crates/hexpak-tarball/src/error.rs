//! Error types for the tarball engine.
//!
//! Errors are grouped by family so callers can match on the outer variant
//! (`Tarball`, `InnerTarball`, `Metadata`, `ChecksumMismatch`) without
//! caring about the detail inside.

use crate::checksum::Checksum;

/// Tarball engine errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure validating or producing the outer tarball.
    #[error("tarball error: {0}")]
    Tarball(#[from] TarballError),

    /// Failure extracting `contents.tar.gz`.
    #[error("inner tarball error: {0}")]
    InnerTarball(String),

    /// Failure decoding `metadata.config`.
    #[error("metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// The outer checksum differs from the expected value.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        expected: Checksum,
        actual: Checksum,
    },

    /// Filesystem error during on-disk unpacking.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Outer tarball validation failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum TarballError {
    /// The outer tarball exceeds 8 MiB or the uncompressed contents
    /// exceed 64 MiB.
    #[error("tarball exceeds the size limits")]
    TooBig,

    /// The outer archive parsed but contained no entries.
    #[error("empty tarball")]
    Empty,

    /// Required members are absent.
    #[error("missing files: {}", .0.join(", "))]
    MissingFiles(Vec<String>),

    /// Unexpected members are present.
    #[error("unexpected files: {}", .0.join(", "))]
    InvalidFiles(Vec<String>),

    /// The `VERSION` member is not a supported format version.
    #[error("unsupported tarball version: {0}")]
    BadVersion(String),

    /// The `CHECKSUM` member does not decode to exactly 32 bytes.
    #[error("invalid inner checksum")]
    InvalidInnerChecksum,

    /// The recomputed inner checksum differs from the embedded one.
    #[error("inner checksum mismatch: expected {expected}, got {actual}")]
    InnerChecksumMismatch {
        expected: Checksum,
        actual: Checksum,
    },

    /// Failure bubbled up from the tar reader or writer.
    #[error("archive error: {0}")]
    Archive(String),
}

/// Metadata decoding failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// The bytes did not parse as configuration terms.
    #[error("invalid terms")]
    InvalidTerms,

    /// The parsed terms are not a sequence of key/value pairs.
    #[error("terms are not key/value pairs")]
    NotKeyValue,

    /// Tokenizer or term-reader error.
    #[error("{0}")]
    Parse(String),
}

/// Result type for tarball operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
