//! The static virtual namespace.
//!
//! A [`DirectoryMappingTable`] is a validated, ordered list of
//! `(source, virtual)` pairs built once at startup. After construction it is
//! never mutated and is shared read-only by every request.

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::confine::{resolve_root, RootError};

/// Errors found while validating directory mappings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    /// A `SRC[:VIRTUAL]` string has nothing before the colon.
    #[error("invalid directory mapping {value:?}: source path is empty")]
    EmptyFlagSource {
        /// The rejected mapping string.
        value: String,
    },

    /// A `SRC:VIRTUAL` string has nothing after the colon.
    #[error("invalid directory mapping {value:?}: virtual path is empty")]
    EmptyFlagVirtual {
        /// The rejected mapping string.
        value: String,
    },

    /// A table entry has an empty source.
    #[error("directories[{index}]: source path is empty")]
    EmptySource {
        /// Position in the merged list.
        index: usize,
    },

    /// A table entry has an empty virtual path.
    #[error("directories[{index}]: virtual path is empty")]
    EmptyVirtual {
        /// Position in the merged list.
        index: usize,
    },

    /// The source directory cannot be used.
    #[error("directory source {path:?} {reason}")]
    InvalidSource {
        /// Source as configured.
        path: String,
        /// Why it was rejected.
        reason: RootError,
    },

    /// The virtual path does not start with `/`.
    #[error("virtual path {path:?} must start with '/'")]
    VirtualNotAbsolute {
        /// Virtual path as configured.
        path: String,
    },

    /// Two entries share a virtual path.
    #[error("duplicate virtual path {path:?}")]
    DuplicateVirtual {
        /// The repeated virtual path.
        path: String,
    },
}

/// One entry of the static namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryMapping {
    /// Real directory on the host.
    pub source: PathBuf,

    /// Client-facing path, always starting with `/`.
    #[serde(rename = "virtual")]
    pub virtual_path: String,
}

impl DirectoryMapping {
    /// Create a mapping without validating it.
    pub fn new(source: impl Into<PathBuf>, virtual_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            virtual_path: virtual_path.into(),
        }
    }

    /// If `path` lies under this mapping's virtual path, return the remainder.
    ///
    /// Matching is on whole segments: `/web` covers `/web` and `/web/a` but
    /// not `/website`. The returned remainder has no leading `/`.
    pub fn strip_virtual<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.virtual_path == "/" {
            return Some(path.trim_start_matches('/'));
        }

        let rest = path.strip_prefix(self.virtual_path.as_str())?;
        if rest.is_empty() {
            Some("")
        } else {
            rest.strip_prefix('/')
        }
    }
}

/// Validated, immutable set of directory mappings.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DirectoryMappingTable {
    mappings: Vec<DirectoryMapping>,
}

impl DirectoryMappingTable {
    /// Validate raw mappings and build the table.
    ///
    /// Each source is resolved to its canonical absolute form; each virtual
    /// path is trimmed and loses any trailing `/`. Checks run in order and the
    /// first failure is returned.
    pub fn build(entries: Vec<DirectoryMapping>) -> Result<Self, MappingError> {
        let mut mappings = Vec::with_capacity(entries.len());
        let mut seen = HashSet::new();

        for (index, DirectoryMapping { source, virtual_path }) in entries.into_iter().enumerate() {
            // Non-UTF-8 paths are taken as given.
            let source = match source.to_str() {
                Some(text) => PathBuf::from(text.trim()),
                None => source,
            };
            let virtual_path = virtual_path.trim();

            if source.as_os_str().is_empty() {
                return Err(MappingError::EmptySource { index });
            }
            if virtual_path.is_empty() {
                return Err(MappingError::EmptyVirtual { index });
            }

            let resolved = resolve_root(&source).map_err(|reason| {
                MappingError::InvalidSource {
                    path: source.to_string_lossy().into_owned(),
                    reason,
                }
            })?;

            if !virtual_path.starts_with('/') {
                return Err(MappingError::VirtualNotAbsolute {
                    path: virtual_path.to_string(),
                });
            }
            let virtual_path = normalize_virtual(virtual_path);

            if !seen.insert(virtual_path.clone()) {
                return Err(MappingError::DuplicateVirtual { path: virtual_path });
            }

            tracing::debug!("Mapped {} -> {}", virtual_path, resolved.display());
            mappings.push(DirectoryMapping {
                source: resolved,
                virtual_path,
            });
        }

        Ok(Self { mappings })
    }

    /// Iterate mappings in configuration order.
    pub fn iter(&self) -> std::slice::Iter<'_, DirectoryMapping> {
        self.mappings.iter()
    }

    /// Number of mappings.
    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    /// Whether the table has no mappings.
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Mappings as a slice, in configuration order.
    pub fn as_slice(&self) -> &[DirectoryMapping] {
        &self.mappings
    }

    /// Find the mapping with the longest virtual prefix covering `path`.
    ///
    /// Returns the mapping and the remainder of `path` relative to it.
    pub fn lookup<'a>(&self, path: &'a str) -> Option<(&DirectoryMapping, &'a str)> {
        let path = if path.is_empty() { "/" } else { path };

        self.mappings
            .iter()
            .filter_map(|m| m.strip_virtual(path).map(|rest| (m, rest)))
            .max_by_key(|(m, _)| m.virtual_path.len())
    }
}

impl<'a> IntoIterator for &'a DirectoryMappingTable {
    type Item = &'a DirectoryMapping;
    type IntoIter = std::slice::Iter<'a, DirectoryMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.mappings.iter()
    }
}

/// Drop trailing slashes, keeping a lone `/`.
fn normalize_virtual(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
