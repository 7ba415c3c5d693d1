//! Error types for the access crate.

use thiserror::Error;

/// Authentication failure kinds produced while checking a bearer token.
///
/// The variants are precise so verification can be tested in isolation. Only
/// [`AuthError::Missing`] and [`AuthError::MalformedHeader`] are meant to be
/// distinguishable by a remote caller; everything past the header collapses
/// into one public message (see [`AuthError::public_message`]).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No `Authorization` header was sent.
    #[error("authorization header missing")]
    Missing,

    /// The header is present but does not carry a `Bearer` token.
    #[error("authorization header is not a bearer token")]
    MalformedHeader,

    /// The token is not signed with the shared secret, uses a non-HMAC
    /// algorithm, or cannot be parsed far enough to check the signature.
    #[error("invalid token signature")]
    InvalidSignature,

    /// The signature is fine but the claims could not be decoded or accepted.
    #[error("invalid token claims: {0}")]
    InvalidClaims(String),

    /// The `expires_at` claim is not an RFC 3339 timestamp.
    #[error("invalid expires_at format: {0}")]
    InvalidExpiryFormat(String),

    /// Either the registered `exp` or the `expires_at` claim is in the past.
    #[error("token expired")]
    Expired,
}

/// Public body for a missing header.
pub const MISSING_AUTHORIZATION: &str = "missing authorization";

/// Public body for a header that is not `Bearer <token>`.
pub const MALFORMED_AUTHORIZATION: &str = "malformed authorization header";

/// Public body for every failure after the header was accepted.
pub const INVALID_TOKEN: &str = "invalid token";

impl AuthError {
    /// The fixed, non-diagnostic message that may be shown to a client.
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Missing => MISSING_AUTHORIZATION,
            AuthError::MalformedHeader => MALFORMED_AUTHORIZATION,
            AuthError::InvalidSignature
            | AuthError::InvalidClaims(_)
            | AuthError::InvalidExpiryFormat(_)
            | AuthError::Expired => INVALID_TOKEN,
        }
    }
}

/// A quota string that does not match `<number>(MB|GB|TB)`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid quota format: {value:?} (expected e.g. 500MB, 1.5GB, 2TB)")]
pub struct QuotaFormatError {
    /// The rejected input, untrimmed.
    pub value: String,
}

impl QuotaFormatError {
    pub(crate) fn new(value: &str) -> Self {
        Self {
            value: value.to_string(),
        }
    }
}

/// Result type alias for token operations.
pub type Result<T> = std::result::Result<T, AuthError>;

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            ErrorKind::Json(_)
            | ErrorKind::MissingRequiredClaim(_)
            | ErrorKind::ImmatureSignature
            | ErrorKind::InvalidIssuer
            | ErrorKind::InvalidAudience
            | ErrorKind::InvalidSubject => AuthError::InvalidClaims(err.to_string()),
            // Bad segments, wrong algorithm family, bad MAC and key errors all
            // mean the signature could not be established.
            _ => AuthError::InvalidSignature,
        }
    }
}
