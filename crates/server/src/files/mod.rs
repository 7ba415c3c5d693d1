//! Filesystem access boundaries.
//!
//! This module provides the pieces that decide which real directories a
//! request may reach:
//! - The static directory mapping table (virtual path -> real directory)
//! - Root directory resolution for configured sources and base directories
//! - Path confinement for everything resolved beneath a root
//!
//! # Security
//!
//! Every path resolved for a request goes through [`confine`], which rejects
//! `..` traversal above the root and symlinks that lead outside the jail.

pub mod confine;
pub mod mapping;

pub use confine::{confine, normalize_relative, resolve_root, ConfinementError, RootError};
pub use mapping::{DirectoryMapping, DirectoryMappingTable, MappingError};
