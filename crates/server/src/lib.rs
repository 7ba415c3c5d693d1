//! # Filegate Server Library
//!
//! Access control and configuration resolution for the filegate file
//! manager.
//!
//! ## Overview
//!
//! The server exposes host directories over HTTP in one of two modes:
//!
//! - **Static Mode**: a fixed table maps virtual paths such as `/web` to real
//!   directories, and every client sees the same namespace
//! - **Token Mode**: each request carries a signed bearer token naming a
//!   directory beneath a configured base directory and a storage quota
//!
//! The two modes are mutually exclusive and chosen once at startup.
//!
//! ## Architecture
//!
//! ```text
//!  flags ─┐
//!  env   ─┼─► ConfigResolver ─► Config ─► AppState ─► require_session ─► handlers
//!  file  ─┘                      │                        │
//!                                ├─ DirectoryMappingTable ┤
//!                                └─ TokenSettings ────────┴─► SessionContext
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use server::{build_router, AppState, ConfigResolver, Overrides};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigResolver::new(Overrides {
//!         dirs: vec!["/srv/www:/web".to_string()],
//!         ..Overrides::default()
//!     })
//!     .load()?;
//!
//!     let listener = tokio::net::TcpListener::bind(&config.listen).await?;
//!     axum::serve(listener, build_router(Arc::new(AppState::new(config)))).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`config`]: Layered configuration resolution
//! - [`files`]: Directory mappings and path confinement
//! - [`session`]: Per-request root and quota
//! - [`router`]: HTTP routes and the session middleware

pub mod config;
pub mod files;
pub mod router;
pub mod session;

// Re-export access for convenience
pub use access;

// Re-export config types for convenience
pub use config::{
    parse_dir_mapping, AccessMode, Config, ConfigError, ConfigResolver, Environment, FileConfig,
    Overrides, TokenSettings,
};

// Re-export files types for convenience
pub use files::{confine, ConfinementError, DirectoryMapping, DirectoryMappingTable, MappingError};

// Re-export session types for convenience
pub use session::{SessionContext, SessionMode};

// Re-export router types for convenience
pub use router::{build_router, require_session, AppState, SessionInfo};
