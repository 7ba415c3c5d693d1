//! Per-request session scope.
//!
//! A session is the `(root directory, quota ceiling)` pair a single request
//! runs under, derived from either the static directory table or a verified
//! bearer token.

pub mod context;

pub use context::{SessionContext, SessionMode};
