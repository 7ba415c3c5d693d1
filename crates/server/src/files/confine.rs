//! Root directory resolution and path confinement.
//!
//! Every path handed to a file handler is resolved through [`confine`], which
//! guarantees the result stays inside a jail directory. Escapes are rejected
//! both lexically (`..` climbing above the root) and physically (symlinks,
//! including dangling ones, whose target leaves the jail).

use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Reasons a configured directory cannot serve as a root.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RootError {
    /// Nothing exists at the path.
    #[error("does not exist")]
    NotFound,

    /// The path exists but is not a directory.
    #[error("is not a directory")]
    NotADirectory,

    /// The directory exists but cannot be listed.
    #[error("is not readable")]
    NotReadable,

    /// Any other filesystem failure.
    #[error("{0}")]
    Io(String),
}

/// Errors produced while confining a request path.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfinementError {
    /// `..` components climb above the session root.
    #[error("path traversal detected: {0}")]
    Traversal(String),

    /// The path resolves outside the jail, typically through a symlink.
    #[error("path escapes its root: {0}")]
    OutsideRoot(PathBuf),

    /// Filesystem error while resolving the path.
    #[error("IO error resolving {path}: {message}")]
    Io {
        /// Path being resolved.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },
}

/// Resolve a configured directory to its canonical absolute form.
///
/// The directory must exist, be a directory, and be listable.
pub fn resolve_root(path: &Path) -> Result<PathBuf, RootError> {
    let canonical = fs::canonicalize(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RootError::NotFound,
        ErrorKind::PermissionDenied => RootError::NotReadable,
        _ => RootError::Io(e.to_string()),
    })?;

    let metadata = fs::metadata(&canonical).map_err(|e| RootError::Io(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(RootError::NotADirectory);
    }

    fs::read_dir(&canonical).map_err(|e| match e.kind() {
        ErrorKind::PermissionDenied => RootError::NotReadable,
        _ => RootError::Io(e.to_string()),
    })?;

    Ok(canonical)
}

/// Lexically normalise a request path into components relative to a root.
///
/// Leading `/` is accepted and means "the root". `.` is dropped, `..` pops a
/// component and fails if nothing is left to pop.
pub fn normalize_relative(path: &str) -> Result<PathBuf, ConfinementError> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();

    for component in Path::new(path).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                if parts.pop().is_none() {
                    return Err(ConfinementError::Traversal(path.to_string()));
                }
            }
            Component::Prefix(_) => {
                return Err(ConfinementError::Traversal(path.to_string()));
            }
        }
    }

    Ok(parts.iter().collect())
}

/// Resolve `relative` beneath `root`, refusing anything that leaves `jail`.
///
/// `root` must be `jail` or a directory below it. The target does not need to
/// exist: the deepest existing ancestor is canonicalised and checked, and the
/// missing tail is appended, so upload destinations resolve too.
pub fn confine(jail: &Path, root: &Path, relative: &str) -> Result<PathBuf, ConfinementError> {
    let jail = fs::canonicalize(jail).map_err(|e| ConfinementError::Io {
        path: jail.to_path_buf(),
        message: e.to_string(),
    })?;

    let candidate = root.join(normalize_relative(relative)?);

    let mut existing = candidate.as_path();
    let mut missing: Vec<&std::ffi::OsStr> = Vec::new();
    let canonical = loop {
        match fs::canonicalize(existing) {
            Ok(canonical) => break canonical,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // A dangling symlink canonicalises as missing but would be
                // followed on write.
                if let Ok(meta) = fs::symlink_metadata(existing) {
                    if meta.file_type().is_symlink() {
                        return Err(ConfinementError::OutsideRoot(existing.to_path_buf()));
                    }
                }
                match (existing.parent(), existing.file_name()) {
                    (Some(parent), Some(name)) => {
                        missing.push(name);
                        existing = parent;
                    }
                    _ => {
                        return Err(ConfinementError::Io {
                            path: candidate.clone(),
                            message: e.to_string(),
                        })
                    }
                }
            }
            Err(e) => {
                return Err(ConfinementError::Io {
                    path: existing.to_path_buf(),
                    message: e.to_string(),
                })
            }
        }
    };

    if !canonical.starts_with(&jail) {
        return Err(ConfinementError::OutsideRoot(candidate.clone()));
    }

    Ok(missing.iter().rev().fold(canonical, |acc, part| acc.join(part)))
}
