//! Package tarball unpacking and validation.
//!
//! Validation is staged and short-circuits: size gate, outer extraction,
//! member-set check, version gate, inner checksum, metadata decode,
//! contents extraction. The first failing stage is the result.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;
use std::time::SystemTime;

use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};

use crate::archive;
use crate::checksum::Checksum;
use crate::error::{Error, Result, TarballError};
use crate::metadata;
use crate::package::{FORMAT_VERSION, INNER_MAX_UNCOMPRESSED, OUTER_MAX_SIZE, OUTER_MEMBERS};
use crate::terms::{self, Value};

/// Result of unpacking to a directory.
#[derive(Debug, Clone)]
pub struct Unpacked {
    pub inner_checksum: Checksum,
    pub outer_checksum: Checksum,
    pub metadata: BTreeMap<String, Value>,
}

/// Result of unpacking in memory.
#[derive(Debug, Clone)]
pub struct UnpackedMemory {
    pub inner_checksum: Checksum,
    pub outer_checksum: Checksum,
    pub metadata: BTreeMap<String, Value>,
    /// The user files, keyed by archive path.
    pub contents: BTreeMap<String, Vec<u8>>,
}

/// Unpack a package tarball in memory.
pub fn unpack(tarball: &[u8]) -> Result<UnpackedMemory> {
    let verified = verify_outer(tarball)?;

    let inner_tar = inflate_contents(&verified.contents)?;
    let files =
        archive::extract_tar(&inner_tar).map_err(|e| Error::InnerTarball(e.to_string()))?;

    Ok(UnpackedMemory {
        inner_checksum: verified.inner_checksum,
        outer_checksum: verified.outer_checksum,
        metadata: verified.metadata,
        contents: files.into_iter().collect(),
    })
}

/// Unpack a package tarball into `dest`.
///
/// Besides the package files this writes `hex_metadata.config` (the
/// metadata member, verbatim) into the destination. Every extracted path
/// is left with a current mtime; paths that cannot be touched, such as
/// dangling symlinks, are skipped silently.
pub fn unpack_to_dir(tarball: &[u8], dest: &Path) -> Result<Unpacked> {
    let verified = verify_outer(tarball)?;
    let inner_tar = inflate_contents(&verified.contents)?;

    fs::create_dir_all(dest)?;
    extract_into(&inner_tar, dest).map_err(|e| Error::InnerTarball(e.to_string()))?;
    fs::write(dest.join("hex_metadata.config"), &verified.metadata_bytes)?;

    Ok(Unpacked {
        inner_checksum: verified.inner_checksum,
        outer_checksum: verified.outer_checksum,
        metadata: verified.metadata,
    })
}

/// Unpack a documentation tarball in memory.
pub fn unpack_docs(tarball: &[u8]) -> Result<Vec<(String, Vec<u8>)>> {
    if tarball.len() as u64 > OUTER_MAX_SIZE {
        return Err(TarballError::TooBig.into());
    }
    let tar = gunzip_capped(tarball)?.ok_or(TarballError::TooBig)?;
    Ok(archive::extract_tar(&tar)?)
}

/// Unpack a documentation tarball into `dest`.
pub fn unpack_docs_to_dir(tarball: &[u8], dest: &Path) -> Result<()> {
    if tarball.len() as u64 > OUTER_MAX_SIZE {
        return Err(TarballError::TooBig.into());
    }
    let tar = gunzip_capped(tarball)?.ok_or(TarballError::TooBig)?;

    fs::create_dir_all(dest)?;
    extract_into(&tar, dest).map_err(|e| TarballError::Archive(e.to_string()))?;
    Ok(())
}

/// Outcome of the outer validation stages.
struct Verified {
    outer_checksum: Checksum,
    inner_checksum: Checksum,
    metadata: BTreeMap<String, Value>,
    metadata_bytes: Vec<u8>,
    /// The `contents.tar.gz` member, still compressed.
    contents: Vec<u8>,
}

fn verify_outer(tarball: &[u8]) -> Result<Verified> {
    if tarball.len() as u64 > OUTER_MAX_SIZE {
        return Err(TarballError::TooBig.into());
    }

    let entries = archive::extract_tar(tarball)?;
    if entries.is_empty() {
        return Err(TarballError::Empty.into());
    }
    let outer_checksum = Checksum::of(tarball);

    let mut members: BTreeMap<String, Vec<u8>> = entries.into_iter().collect();
    check_members(&members)?;

    let version = take_member(&mut members, OUTER_MEMBERS[0])?;
    let checksum_hex = take_member(&mut members, OUTER_MEMBERS[1])?;
    let metadata_bytes = take_member(&mut members, OUTER_MEMBERS[2])?;
    let contents = take_member(&mut members, OUTER_MEMBERS[3])?;

    check_version(&version)?;
    let inner_checksum = check_inner_checksum(&checksum_hex, &version, &metadata_bytes, &contents)?;

    let metadata = metadata::normalize(terms::decode_metadata(&metadata_bytes)?);

    Ok(Verified {
        outer_checksum,
        inner_checksum,
        metadata,
        metadata_bytes,
        contents,
    })
}

/// Member set must equal the required set. Unexpected members win over
/// missing ones when both conditions hold.
fn check_members(members: &BTreeMap<String, Vec<u8>>) -> Result<(), TarballError> {
    let invalid: Vec<String> = members
        .keys()
        .filter(|name| !OUTER_MEMBERS.contains(&name.as_str()))
        .cloned()
        .collect();
    if !invalid.is_empty() {
        return Err(TarballError::InvalidFiles(invalid));
    }

    let missing: Vec<String> = OUTER_MEMBERS
        .iter()
        .filter(|name| !members.contains_key(**name))
        .map(|name| name.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(TarballError::MissingFiles(missing));
    }

    Ok(())
}

fn take_member(members: &mut BTreeMap<String, Vec<u8>>, name: &str) -> Result<Vec<u8>> {
    members
        .remove(name)
        .ok_or_else(|| TarballError::MissingFiles(vec![name.to_string()]).into())
}

fn check_version(version: &[u8]) -> Result<(), TarballError> {
    if version != FORMAT_VERSION.as_bytes() {
        return Err(TarballError::BadVersion(
            String::from_utf8_lossy(version).into_owned(),
        ));
    }
    Ok(())
}

fn check_inner_checksum(
    checksum_hex: &[u8],
    version: &[u8],
    metadata_bytes: &[u8],
    contents: &[u8],
) -> Result<Checksum, TarballError> {
    let expected = std::str::from_utf8(checksum_hex)
        .ok()
        .and_then(Checksum::from_hex)
        .ok_or(TarballError::InvalidInnerChecksum)?;

    let mut hasher = Sha256::new();
    hasher.update(version);
    hasher.update(metadata_bytes);
    hasher.update(contents);
    let actual = Checksum::from_hasher(hasher);

    if expected != actual {
        return Err(TarballError::InnerChecksumMismatch { expected, actual });
    }
    Ok(actual)
}

fn inflate_contents(contents: &[u8]) -> Result<Vec<u8>> {
    match gunzip_capped(contents) {
        Ok(Some(tar)) => Ok(tar),
        Ok(None) => Err(TarballError::TooBig.into()),
        Err(e) => Err(Error::InnerTarball(e.to_string())),
    }
}

/// Inflate with the uncompressed cap enforced during the read, so a
/// pathological stream cannot balloon past the limit in memory. `None`
/// means the cap was exceeded.
fn gunzip_capped(data: &[u8]) -> std::io::Result<Option<Vec<u8>>> {
    let mut decoder = GzDecoder::new(data).take(INNER_MAX_UNCOMPRESSED + 1);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    if out.len() as u64 > INNER_MAX_UNCOMPRESSED {
        return Ok(None);
    }
    Ok(Some(out))
}

fn extract_into(tar: &[u8], dest: &Path) -> std::io::Result<()> {
    let mut archive = tar::Archive::new(Cursor::new(tar));
    // Freshly written files keep their write-time mtime instead of the
    // archive's fixed one.
    archive.set_preserve_mtime(false);
    archive.set_preserve_permissions(true);

    for entry in archive.entries()? {
        let mut entry = entry?;
        let path = entry.path().map(|p| p.to_path_buf()).ok();
        entry.unpack_in(dest)?;
        if let Some(path) = path {
            touch(&dest.join(path));
        }
    }
    Ok(())
}

fn touch(path: &Path) {
    if let Ok(file) = fs::File::options().write(true).open(path) {
        let _ = file.set_modified(SystemTime::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_input_fails_before_parsing() {
        let junk = vec![0u8; (OUTER_MAX_SIZE + 1) as usize];
        let err = unpack(&junk).unwrap_err();
        assert!(matches!(err, Error::Tarball(TarballError::TooBig)));
    }

    #[test]
    fn empty_archive_is_rejected() {
        // A tar stream with no entries is just the zero-filled terminator.
        let empty = tar::Builder::new(Vec::new()).into_inner().unwrap();
        let err = unpack(&empty).unwrap_err();
        assert!(matches!(err, Error::Tarball(TarballError::Empty)));
    }

    #[test]
    fn garbage_input_reports_archive_error() {
        let err = unpack(&[0x42; 2048]).unwrap_err();
        assert!(matches!(err, Error::Tarball(TarballError::Archive(_))));
    }
}
