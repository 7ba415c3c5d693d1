//! Bearer token verification.
//!
//! Tokens are JWTs signed with a shared secret by an external issuer. A token
//! carries a scope directory, a quota, and up to two expiries: the registered
//! `exp` claim and a free-form `expires_at` RFC 3339 string. Both must hold
//! for the token to be accepted.
//!
//! [`TokenAuthority`] is immutable after construction and performs no I/O, so
//! a single instance can be shared behind an `Arc` by every request task.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, Result};

/// Minimum length in bytes of the shared secret.
pub const MIN_SECRET_LENGTH: usize = 32;

/// Signature algorithms accepted by the authority. All are keyed by the
/// shared secret; anything asymmetric is rejected.
pub const ACCEPTED_ALGORITHMS: [Algorithm; 3] =
    [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// The registered JWT claims the authority understands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Expiry as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issue time as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not-before as seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// Subject the token was issued for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Issuer name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

/// Claims as they appear inside a token.
///
/// The registered claims live in their own named field and are flattened into
/// the same JSON object on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Scope directory, relative to the server's base directory.
    #[serde(default)]
    pub dir: String,

    /// Quota string, e.g. `10GB`. Empty means no per-token quota.
    #[serde(default)]
    pub quota: String,

    /// Secondary RFC 3339 expiry. Empty means unset.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expires_at: String,

    /// Registered claims (`exp`, `iat`, ...).
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

impl TokenClaims {
    /// Create claims for a scope directory and quota with no expiry set.
    pub fn new(dir: impl Into<String>, quota: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            quota: quota.into(),
            ..Self::default()
        }
    }

    /// Set the registered `exp` claim.
    pub fn with_exp(mut self, exp: DateTime<Utc>) -> Self {
        self.registered.exp = Some(exp.timestamp());
        self
    }

    /// Set the secondary `expires_at` claim.
    pub fn with_expires_at(mut self, expires_at: impl Into<String>) -> Self {
        self.expires_at = expires_at.into();
        self
    }
}

/// The result of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Advisory scope directory as sent by the issuer.
    pub scope_dir: String,
    /// Quota string as sent by the issuer.
    pub quota: String,
    /// Secondary expiry string as sent by the issuer.
    pub expires_at: String,
    /// The registered `exp` claim, if the token had one.
    pub expiry: Option<DateTime<Utc>>,
}

impl Claims {
    fn project(claims: TokenClaims) -> Result<Self> {
        let expiry = match claims.registered.exp {
            Some(exp) => Some(DateTime::from_timestamp(exp, 0).ok_or_else(|| {
                AuthError::InvalidClaims(format!("exp out of range: {}", exp))
            })?),
            None => None,
        };

        Ok(Self {
            scope_dir: claims.dir,
            quota: claims.quota,
            expires_at: claims.expires_at,
            expiry,
        })
    }
}

/// Stateless verifier for shared-secret bearer tokens.
#[derive(Clone)]
pub struct TokenAuthority {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for TokenAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenAuthority")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenAuthority {
    /// Create an authority for the given shared secret.
    ///
    /// The secret length is checked at configuration time, not here.
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ACCEPTED_ALGORITHMS.to_vec();
        // `exp` is optional; when present it is checked in `verify_at`
        // against the caller's clock.
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Verify a token against the current time.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as of `now`.
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Claims> {
        // An unreadable header or unknown `alg` means no scheme to verify
        // against, regardless of what the claims look like.
        let header = jsonwebtoken::decode_header(token).map_err(|_| AuthError::InvalidSignature)?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::InvalidSignature);
        }

        let data =
            jsonwebtoken::decode::<TokenClaims>(token, &self.decoding_key, &self.validation)?;
        let claims = data.claims;

        let now_ts = now.timestamp();
        if let Some(exp) = claims.registered.exp {
            if exp < now_ts {
                return Err(AuthError::Expired);
            }
        }
        if let Some(nbf) = claims.registered.nbf {
            if nbf > now_ts {
                return Err(AuthError::InvalidClaims("token not yet valid".to_string()));
            }
        }

        check_expires_at(&claims.expires_at, now)?;

        Claims::project(claims)
    }
}

/// Check the secondary expiry string. Empty means unset.
fn check_expires_at(expires_at: &str, now: DateTime<Utc>) -> Result<()> {
    if expires_at.is_empty() {
        return Ok(());
    }

    let deadline = DateTime::parse_from_rfc3339(expires_at)
        .map_err(|_| AuthError::InvalidExpiryFormat(expires_at.to_string()))?;

    if deadline.with_timezone(&Utc) < now {
        return Err(AuthError::Expired);
    }

    Ok(())
}

/// Verify `token` with a one-off authority for `secret`.
pub fn verify(token: &str, secret: &[u8]) -> Result<Claims> {
    TokenAuthority::new(secret).verify(token)
}

/// Sign `claims` with `secret` using HS256.
///
/// Issuance belongs to an external service; this exists for tooling and
/// tests that need tokens the authority will accept.
pub fn issue(
    claims: &TokenClaims,
    secret: &[u8],
) -> std::result::Result<String, jsonwebtoken::errors::Error> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Extract the token from an `Authorization` header value.
///
/// An absent or blank header is [`AuthError::Missing`]; anything that is not
/// `Bearer <token>` is [`AuthError::MalformedHeader`].
pub fn bearer_token(header: Option<&str>) -> Result<&str> {
    let value = match header.map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => return Err(AuthError::Missing),
    };

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() || token.contains(char::is_whitespace) {
        return Err(AuthError::MalformedHeader);
    }

    Ok(token)
}
