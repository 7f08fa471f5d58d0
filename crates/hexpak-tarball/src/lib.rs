//! Package tarball format for Hex-compatible registries.
//!
//! A package tarball is a plain (non-compressed) tar archive with exactly
//! four members, written in this order:
//!
//! - `VERSION`: the format version, currently the literal `3`
//! - `CHECKSUM`: 64 uppercase hex characters, the inner checksum
//! - `metadata.config`: package metadata as configuration terms
//! - `contents.tar.gz`: the user files, as a reproducibly gzipped tar
//!
//! # Determinism Guarantees
//!
//! Tarballs are byte-for-byte reproducible for equal input:
//!
//! - every tar header carries mtime 2000-01-01T00:00:00Z, uid 0, gid 0
//! - the gzip stream has a fixed 10-byte header with no mtime, filename,
//!   or OS byte
//! - members are written in a fixed order
//!
//! # Checksums
//!
//! Two checksums exist. The *inner* checksum covers
//! `VERSION ++ metadata.config ++ contents.tar.gz` and is stored in the
//! `CHECKSUM` member; it is kept for compatibility with existing packages
//! and re-checked during unpacking as a corruption detector. The *outer*
//! checksum is the SHA-256 of the whole tarball and is the authoritative
//! identity of the artifact; compare it against the checksum the registry
//! reports.
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//! use hexpak_tarball::{create, unpack, terms::Value, FileEntry};
//!
//! let mut metadata = BTreeMap::new();
//! metadata.insert("name".to_string(), Value::Binary("ecto".to_string()));
//! metadata.insert("version".to_string(), Value::Binary("1.0.0".to_string()));
//!
//! let files = vec![FileEntry::from_bytes("src/ecto.erl", "-module(ecto).")];
//! let created = create(&metadata, &files).unwrap();
//!
//! let unpacked = unpack(&created.tarball).unwrap();
//! assert_eq!(unpacked.outer_checksum, created.outer_checksum);
//! ```

pub mod archive;
pub mod checksum;
pub mod error;
pub mod gzip;
pub mod metadata;
pub mod package;
pub mod terms;
pub mod unpack;

pub use archive::FileEntry;
pub use checksum::{verify_outer_checksum, Checksum};
pub use error::{Error, MetadataError, Result, TarballError};
pub use package::{create, create_docs, CreateResult, FORMAT_VERSION};
pub use unpack::{unpack, unpack_docs, unpack_docs_to_dir, unpack_to_dir, Unpacked, UnpackedMemory};
