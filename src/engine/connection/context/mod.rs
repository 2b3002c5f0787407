//! Image build context archives.
//!
//! The repository working copy is packed into an uncompressed tar stream with
//! paths relative to the repository root, which is the layout the engine's
//! build endpoint expects. Version-control metadata is left out, and entries
//! that are neither files nor directories are skipped.

use std::io;

use camino::Utf8Path;
use cap_std::ambient_authority;
use cap_std::fs::{FileType, Metadata};
use cap_std::fs_utf8::Dir;
use tar::{Builder, EntryType, Header};

use crate::error::{FilesystemError, VccpmError};

/// Entry names skipped at every level of the context.
const EXCLUDED_NAMES: &[&str] = &[".git"];

/// Pack `context_dir` into a tar archive suitable for an image build.
///
/// Entries are written in name order so the same tree always yields the same
/// archive.
///
/// # Errors
///
/// Returns `FilesystemError::NotFound` when the directory does not exist,
/// `FilesystemError::PermissionDenied` when it cannot be read, and
/// `FilesystemError::IoError` for any other failure while archiving.
pub fn build_context_archive(context_dir: &Utf8Path) -> Result<Vec<u8>, VccpmError> {
    let as_filesystem_error = |error: io::Error| filesystem_error(context_dir, &error);

    let root = Dir::open_ambient_dir(context_dir, ambient_authority())
        .map_err(as_filesystem_error)?;
    let mut archive = Builder::new(Vec::new());
    pack_directory(&mut archive, &root, Utf8Path::new("")).map_err(as_filesystem_error)?;
    archive.into_inner().map_err(as_filesystem_error)
}

fn filesystem_error(path: &Utf8Path, error: &io::Error) -> VccpmError {
    let std_path = path.as_std_path().to_path_buf();
    VccpmError::from(match error.kind() {
        io::ErrorKind::NotFound => FilesystemError::NotFound { path: std_path },
        io::ErrorKind::PermissionDenied => FilesystemError::PermissionDenied { path: std_path },
        _ => FilesystemError::IoError {
            path: std_path,
            message: error.to_string(),
        },
    })
}

/// List the archivable children of `directory`, sorted by name.
fn children(directory: &Dir) -> io::Result<Vec<(String, FileType)>> {
    let mut listed = Vec::new();
    for listed_entry in directory.entries()? {
        let entry = listed_entry?;
        let name = entry.file_name()?;
        if !EXCLUDED_NAMES.contains(&name.as_str()) {
            listed.push((name, entry.file_type()?));
        }
    }
    listed.sort_unstable_by(|(left, _), (right, _)| left.cmp(right));
    Ok(listed)
}

fn pack_directory(
    archive: &mut Builder<Vec<u8>>,
    directory: &Dir,
    prefix: &Utf8Path,
) -> io::Result<()> {
    for (name, file_type) in children(directory)? {
        let archived = prefix.join(&name);
        let archived_path = archived.as_str().replace('\\', "/");

        if file_type.is_dir() {
            let metadata = directory.metadata(&name)?;
            let mut header = entry_header(EntryType::Directory, 0, mode_of(&metadata, 0o755));
            archive.append_data(&mut header, format!("{archived_path}/"), io::empty())?;
            pack_directory(archive, &directory.open_dir(&name)?, &archived)?;
        } else if file_type.is_file() {
            let metadata = directory.metadata(&name)?;
            let mut header =
                entry_header(EntryType::Regular, metadata.len(), mode_of(&metadata, 0o644));
            archive.append_data(&mut header, archived_path, directory.open(&name)?)?;
        }
    }
    Ok(())
}

fn entry_header(kind: EntryType, size: u64, mode: u32) -> Header {
    let mut header = Header::new_gnu();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode);
    header.set_cksum();
    header
}

#[cfg(unix)]
fn mode_of(metadata: &Metadata, _fallback: u32) -> u32 {
    use cap_std::fs::PermissionsExt;

    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
const fn mode_of(_metadata: &Metadata, fallback: u32) -> u32 {
    fallback
}
