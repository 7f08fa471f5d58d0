//! Tar assembly with a deterministic header policy.
//!
//! Every header is forced to mtime 2000-01-01T00:00:00Z and uid/gid 0 so
//! that archives reproduce byte-for-byte. Entries are written in the order
//! the caller gives them; that order is part of the reproducibility
//! contract.

use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

use tar::{Builder, EntryType, Header};

use crate::error::TarballError;

/// Forced timestamp for every entry: 2000-01-01T00:00:00Z.
pub(crate) const ENTRY_MTIME: u64 = 946_684_800;

/// Mode used for entries synthesized from in-memory bytes.
const DEFAULT_FILE_MODE: u32 = 0o644;

/// A file to include in a tarball.
#[derive(Debug, Clone)]
pub enum FileEntry {
    /// In-memory contents stored under `path`.
    Bytes { path: String, contents: Vec<u8> },

    /// A filesystem path stored under `name`.
    ///
    /// The source's mode is kept; symlinks are recorded as symlinks and
    /// never dereferenced.
    Path { name: String, source: PathBuf },
}

impl FileEntry {
    /// Entry from in-memory bytes.
    pub fn from_bytes(path: impl Into<String>, contents: impl Into<Vec<u8>>) -> Self {
        Self::Bytes {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Entry read from `source`, stored under `name`.
    pub fn from_path(name: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self::Path {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Entry whose archive name doubles as its path relative to the
    /// working directory.
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::Path {
            source: PathBuf::from(&name),
            name,
        }
    }

    /// Name of the entry within the archive.
    pub fn name(&self) -> &str {
        match self {
            Self::Bytes { path, .. } => path,
            Self::Path { name, .. } => name,
        }
    }
}

/// Write `entries` into an in-memory tar archive.
pub fn build_tar(entries: &[FileEntry]) -> Result<Vec<u8>, TarballError> {
    let mut builder = Builder::new(Vec::new());

    for entry in entries {
        match entry {
            FileEntry::Bytes { path, contents } => {
                append_bytes(&mut builder, path, contents, DEFAULT_FILE_MODE)?;
            }
            FileEntry::Path { name, source } => {
                append_path(&mut builder, name, source)?;
            }
        }
    }

    builder
        .into_inner()
        .map_err(|e| TarballError::Archive(e.to_string()))
}

fn deterministic_header() -> Header {
    let mut header = Header::new_ustar();
    header.set_mtime(ENTRY_MTIME);
    header.set_uid(0);
    header.set_gid(0);
    header
}

fn append_bytes(
    builder: &mut Builder<Vec<u8>>,
    path: &str,
    contents: &[u8],
    mode: u32,
) -> Result<(), TarballError> {
    let mut header = deterministic_header();
    header.set_size(contents.len() as u64);
    header.set_mode(mode);

    builder
        .append_data(&mut header, path, Cursor::new(contents))
        .map_err(|e| TarballError::Archive(format!("{path}: {e}")))
}

fn append_path(
    builder: &mut Builder<Vec<u8>>,
    name: &str,
    source: &Path,
) -> Result<(), TarballError> {
    let meta = fs::symlink_metadata(source)
        .map_err(|e| TarballError::Archive(format!("{}: {e}", source.display())))?;
    let file_type = meta.file_type();

    if file_type.is_symlink() {
        let target = fs::read_link(source)
            .map_err(|e| TarballError::Archive(format!("{}: {e}", source.display())))?;

        let mut header = deterministic_header();
        header.set_entry_type(EntryType::Symlink);
        header.set_size(0);
        header.set_mode(file_mode(&meta));
        builder
            .append_link(&mut header, name, &target)
            .map_err(|e| TarballError::Archive(format!("{name}: {e}")))
    } else if file_type.is_dir() {
        // Only empty directories get an entry; a populated directory's
        // files are expected in the caller's list already.
        let mut children = fs::read_dir(source)
            .map_err(|e| TarballError::Archive(format!("{}: {e}", source.display())))?;
        if children.next().is_some() {
            return Ok(());
        }

        let mut header = deterministic_header();
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        header.set_mode(file_mode(&meta));
        builder
            .append_data(&mut header, name, std::io::empty())
            .map_err(|e| TarballError::Archive(format!("{name}: {e}")))
    } else {
        let file = fs::File::open(source)
            .map_err(|e| TarballError::Archive(format!("{}: {e}", source.display())))?;

        let mut header = deterministic_header();
        header.set_size(meta.len());
        header.set_mode(file_mode(&meta));
        builder
            .append_data(&mut header, name, file)
            .map_err(|e| TarballError::Archive(format!("{name}: {e}")))
    }
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        DEFAULT_FILE_MODE
    }
}

/// Read an archive into an ordered list of regular files.
///
/// Directory and link entries are iterated but not returned; errors from
/// the tar reader bubble up as [`TarballError::Archive`].
pub fn extract_tar(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, TarballError> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    let mut files = Vec::new();

    let entries = archive
        .entries()
        .map_err(|e| TarballError::Archive(e.to_string()))?;
    for entry in entries {
        let mut entry = entry.map_err(|e| TarballError::Archive(e.to_string()))?;
        let path = entry
            .path()
            .map_err(|e| TarballError::Archive(e.to_string()))?
            .to_string_lossy()
            .into_owned();

        if entry.header().entry_type().is_file() {
            let mut contents = Vec::with_capacity(entry.size() as usize);
            entry
                .read_to_end(&mut contents)
                .map_err(|e| TarballError::Archive(format!("{path}: {e}")))?;
            files.push((path, contents));
        }
    }

    Ok(files)
}
