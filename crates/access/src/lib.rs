//! # Filegate Access Library
//!
//! Pure, I/O-free primitives used by the filegate server to decide what a
//! request may touch.
//!
//! ## Overview
//!
//! - **Quota Parsing**: `500MB` / `1.5GB` / `2TB` style strings into byte counts
//! - **Token Verification**: shared-secret JWTs carrying a scope directory,
//!   a quota and two independent expiries
//! - **Header Extraction**: `Authorization: Bearer <token>` handling
//!
//! Nothing in this crate touches the filesystem or the network, and nothing
//! holds mutable state, so every type here can be shared freely between
//! request tasks.
//!
//! ## Example Usage
//!
//! ```rust
//! use access::{bearer_token, issue, parse_quota, TokenAuthority, TokenClaims};
//!
//! let secret = b"an-example-secret-of-32-bytes!!!";
//! let token = issue(&TokenClaims::new("alice", "10GB"), secret).unwrap();
//!
//! let header = format!("Bearer {}", token);
//! let authority = TokenAuthority::new(secret);
//! let claims = authority.verify(bearer_token(Some(&header)).unwrap()).unwrap();
//!
//! assert_eq!(claims.scope_dir, "alice");
//! assert_eq!(parse_quota(&claims.quota).unwrap(), 10 << 30);
//! ```
//!
//! ## Modules
//!
//! - [`quota`]: Quota string parsing and formatting
//! - [`token`]: Bearer token verification and claims
//! - [`error`]: Error types

pub mod error;
pub mod quota;
pub mod token;

pub use error::{
    AuthError, QuotaFormatError, Result, INVALID_TOKEN, MALFORMED_AUTHORIZATION,
    MISSING_AUTHORIZATION,
};
pub use quota::{format_bytes, parse_quota, GB, MB, TB};
pub use token::{
    bearer_token, issue, verify, Claims, RegisteredClaims, TokenAuthority, TokenClaims,
    ACCEPTED_ALGORITHMS, MIN_SECRET_LENGTH,
};
