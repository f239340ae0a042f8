use crate::error::{DirectoryError, FileOperationError};
use filetime::FileTime;
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// List top-level files in `directory` whose name ends with one of
/// `extensions` and, if given, contains a match for `pattern`.
///
/// Subdirectories are never returned or descended into. Paths are absolute
/// and sorted by file name.
pub fn list_matching_files<P: AsRef<Path>>(
    directory: P,
    extensions: &[String],
    pattern: Option<&Regex>,
) -> Result<Vec<PathBuf>, DirectoryError> {
    let dir_path = directory.as_ref();

    if !dir_path.exists() {
        return Err(DirectoryError::Missing(dir_path.to_path_buf()));
    }

    let base = fs::canonicalize(dir_path).unwrap_or_else(|_| dir_path.to_path_buf());
    let entries = fs::read_dir(&base).map_err(|source| DirectoryError::Unreadable {
        path: dir_path.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| is_file(&t, &entry.path())).unwrap_or(false))
        .filter(|entry| match entry.file_name().to_str() {
            Some(name) => matches_name(name, extensions, pattern),
            None => {
                warn!("Skipping file with non UTF-8 name: {:?}", entry.path());
                false
            }
        })
        .map(|entry| entry.path())
        .collect();

    files.sort();
    Ok(files)
}

// Symlinks count as files when they point at one.
fn is_file(file_type: &fs::FileType, path: &Path) -> bool {
    file_type.is_file() || (file_type.is_symlink() && path.is_file())
}

/// Plain case-sensitive suffix match plus optional regex search
pub fn matches_name(name: &str, extensions: &[String], pattern: Option<&Regex>) -> bool {
    extensions.iter().any(|ext| name.ends_with(ext.as_str()))
        && pattern.map_or(true, |re| re.is_match(name))
}

/// Names of every entry (files and directories) currently in `directory`
pub fn existing_entry_names<P: AsRef<Path>>(
    directory: P,
) -> Result<HashSet<String>, DirectoryError> {
    let dir_path = directory.as_ref();
    let entries = fs::read_dir(dir_path).map_err(|source| DirectoryError::Unreadable {
        path: dir_path.to_path_buf(),
        source,
    })?;

    Ok(entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect())
}

/// Create `directory` and its parents. Returns `true` if it had to be created.
pub fn ensure_directory<P: AsRef<Path>>(directory: P) -> Result<bool, DirectoryError> {
    let dir_path = directory.as_ref();
    if dir_path.exists() {
        return Ok(false);
    }

    fs::create_dir_all(dir_path).map_err(|source| DirectoryError::Uncreatable {
        path: dir_path.to_path_buf(),
        source,
    })?;
    Ok(true)
}

/// Copy content, permissions and access/modification times.
///
/// A failed content copy leaves no file behind at `destination`. Failing to
/// carry the timestamps over only produces a warning.
pub fn copy_with_metadata<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    destination: Q,
) -> Result<(), FileOperationError> {
    let src_path = source.as_ref();
    let dest_path = destination.as_ref();
    let copy_error = |source: std::io::Error| FileOperationError::Copy {
        source_path: src_path.to_path_buf(),
        destination: dest_path.to_path_buf(),
        source,
    };

    // fs::copy carries the permission bits over
    if let Err(e) = fs::copy(src_path, dest_path) {
        discard_partial_copy(dest_path);
        return Err(copy_error(e));
    }

    let times = fs::metadata(src_path).and_then(|metadata| {
        filetime::set_file_times(
            dest_path,
            FileTime::from_last_access_time(&metadata),
            FileTime::from_last_modification_time(&metadata),
        )
    });
    if let Err(e) = times {
        warn!("Copied {:?} without its timestamps: {}", dest_path, e);
    }

    Ok(())
}

// A leftover file would block every later cycle through the name check.
fn discard_partial_copy(dest_path: &Path) {
    match fs::remove_file(dest_path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial copy {:?}: {}", dest_path, e),
    }
}

pub fn remove_file<P: AsRef<Path>>(path: P) -> Result<(), FileOperationError> {
    let path = path.as_ref();
    fs::remove_file(path).map_err(|source| FileOperationError::Delete {
        path: path.to_path_buf(),
        source,
    })
}
