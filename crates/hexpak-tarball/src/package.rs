//! Package tarball creation.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::archive::{self, FileEntry};
use crate::checksum::Checksum;
use crate::error::{Result, TarballError};
use crate::gzip;
use crate::terms::{self, Value};

/// Current tarball format version.
pub const FORMAT_VERSION: &str = "3";

/// Maximum size of the outer tarball.
pub(crate) const OUTER_MAX_SIZE: u64 = 8 * 1024 * 1024;

/// Maximum uncompressed size of the inner contents.
pub(crate) const INNER_MAX_UNCOMPRESSED: u64 = 64 * 1024 * 1024;

/// Required members of the outer tarball, in creation order.
pub(crate) const OUTER_MEMBERS: [&str; 4] =
    ["VERSION", "CHECKSUM", "metadata.config", "contents.tar.gz"];

/// Output of [`create`].
#[derive(Debug, Clone)]
pub struct CreateResult {
    /// The package tarball, ready to publish.
    pub tarball: Vec<u8>,
    /// Checksum over `VERSION ++ metadata.config ++ contents.tar.gz`,
    /// embedded in the `CHECKSUM` member. Kept for compatibility only.
    pub inner_checksum: Checksum,
    /// Checksum of the tarball bytes; the authoritative artifact identity.
    pub outer_checksum: Checksum,
}

/// Build a package tarball from metadata and a file list.
///
/// Output is byte-for-byte reproducible for equal input. Fails with
/// [`TarballError::TooBig`] when the tarball exceeds 8 MiB or the
/// uncompressed contents exceed 64 MiB.
pub fn create(metadata: &BTreeMap<String, Value>, files: &[FileEntry]) -> Result<CreateResult> {
    let metadata_bytes = terms::encode_metadata(metadata).into_bytes();

    let inner_tar = archive::build_tar(files)?;
    let uncompressed_size = inner_tar.len() as u64;
    let contents = gzip::gzip(&inner_tar)?;

    let mut hasher = Sha256::new();
    hasher.update(FORMAT_VERSION.as_bytes());
    hasher.update(&metadata_bytes);
    hasher.update(&contents);
    let inner_checksum = Checksum::from_hasher(hasher);

    let members = [
        FileEntry::from_bytes(OUTER_MEMBERS[0], FORMAT_VERSION),
        FileEntry::from_bytes(OUTER_MEMBERS[1], inner_checksum.to_hex()),
        FileEntry::from_bytes(OUTER_MEMBERS[2], metadata_bytes),
        FileEntry::from_bytes(OUTER_MEMBERS[3], contents),
    ];
    let tarball = archive::build_tar(&members)?;
    let outer_checksum = Checksum::of(&tarball);

    if tarball.len() as u64 > OUTER_MAX_SIZE || uncompressed_size > INNER_MAX_UNCOMPRESSED {
        return Err(TarballError::TooBig.into());
    }

    Ok(CreateResult {
        tarball,
        inner_checksum,
        outer_checksum,
    })
}

/// Build a documentation tarball: a reproducibly gzipped tar of `files`
/// with the same size caps as [`create`], but no outer wrapper.
pub fn create_docs(files: &[FileEntry]) -> Result<Vec<u8>> {
    let tar = archive::build_tar(files)?;
    let tarball = gzip::gzip(&tar)?;

    if tarball.len() as u64 > OUTER_MAX_SIZE || tar.len() as u64 > INNER_MAX_UNCOMPRESSED {
        return Err(TarballError::TooBig.into());
    }

    Ok(tarball)
}
