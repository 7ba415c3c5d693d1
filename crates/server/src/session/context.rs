//! Per-request access scope.
//!
//! A [`SessionContext`] reduces the server's access mode into one root
//! directory and one quota ceiling for a single request. It is built fresh
//! for every request and dropped with it.

use std::path::{Component, Path, PathBuf};

use access::{parse_quota, AuthError, Claims};

use crate::files::{confine, ConfinementError, DirectoryMapping};

/// How the session was established.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMode {
    /// Selected from the static directory table.
    Static {
        /// Virtual path of the matched mapping.
        virtual_prefix: String,
    },
    /// Derived from a verified bearer token.
    Token {
        /// Scope segment beneath the base directory, possibly empty.
        scope: PathBuf,
    },
}

/// Resolved root directory and quota ceiling for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    root: PathBuf,
    jail: PathBuf,
    quota: u64,
    mode: SessionMode,
}

impl SessionContext {
    /// Session for a static-mode mapping.
    pub fn for_mapping(mapping: &DirectoryMapping, quota: u64) -> Self {
        Self {
            root: mapping.source.clone(),
            jail: mapping.source.clone(),
            quota,
            mode: SessionMode::Static {
                virtual_prefix: mapping.virtual_path.clone(),
            },
        }
    }

    /// Session for verified token claims.
    ///
    /// The root is always `base_dir`; the claim's scope directory is only
    /// ever appended beneath it. The quota ceiling is the claim's quota,
    /// bounded by `server_quota` when that is set.
    pub fn for_claims(
        claims: &Claims,
        base_dir: &Path,
        server_quota: u64,
    ) -> Result<Self, AuthError> {
        let scope = scope_segment(&claims.scope_dir)?;
        let claim_quota = parse_quota(&claims.quota)
            .map_err(|e| AuthError::InvalidClaims(e.to_string()))?;

        let root = if scope.as_os_str().is_empty() {
            base_dir.to_path_buf()
        } else {
            base_dir.join(&scope)
        };

        Ok(Self {
            root,
            jail: base_dir.to_path_buf(),
            quota: bound_quota(claim_quota, server_quota),
            mode: SessionMode::Token { scope },
        })
    }

    /// The directory requests operate in.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory nothing may escape.
    pub fn jail(&self) -> &Path {
        &self.jail
    }

    /// Quota ceiling in bytes; zero means unlimited.
    pub fn quota(&self) -> u64 {
        self.quota
    }

    /// How the session was established.
    pub fn mode(&self) -> &SessionMode {
        &self.mode
    }

    /// Resolve a request path beneath the session root.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, ConfinementError> {
        confine(&self.jail, &self.root, relative)
    }

    /// Whether `additional` more bytes fit when `used` are already stored.
    pub fn allows(&self, used: u64, additional: u64) -> bool {
        self.quota == 0 || used.saturating_add(additional) <= self.quota
    }
}

/// Reduce a scope claim to a relative path with only normal components.
///
/// Leading separators and `.` are dropped; `..` or a drive prefix makes the
/// claim invalid rather than being resolved.
fn scope_segment(scope_dir: &str) -> Result<PathBuf, AuthError> {
    let mut segment = PathBuf::new();
    for component in Path::new(scope_dir.trim()).components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => segment.push(part),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(AuthError::InvalidClaims(format!(
                    "scope directory {:?} leaves the base directory",
                    scope_dir
                )));
            }
        }
    }
    Ok(segment)
}

/// Combine a token quota with the server maximum. Zero means unlimited.
fn bound_quota(claim: u64, server: u64) -> u64 {
    match (claim, server) {
        (0, s) => s,
        (c, 0) => c,
        (c, s) => c.min(s),
    }
}
