//! HTTP routing and the per-request session middleware.
//!
//! [`require_session`] runs in front of every file route. It turns the
//! server's access mode into a [`SessionContext`] for the request and stores
//! it as a request extension, together with the verified
//! [`access::Claims`] in token mode. Handlers never see a request that failed
//! authentication.

use std::sync::Arc;

use access::{bearer_token, format_bytes, AuthError, TokenAuthority};
use axum::extract::{Query, Request, State};
use axum::http::Uri;
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::{AccessMode, Config};
use crate::session::{SessionContext, SessionMode};

/// Shared, read-only state handed to every request.
#[derive(Debug)]
pub struct AppState {
    config: Config,
    authority: Option<TokenAuthority>,
}

impl AppState {
    /// Build state for a resolved configuration.
    pub fn new(config: Config) -> Self {
        let authority = match &config.mode {
            AccessMode::Token(settings) => Some(TokenAuthority::new(settings.secret.as_bytes())),
            AccessMode::Static(_) => None,
        };
        Self { config, authority }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Query parameters understood by the session middleware.
#[derive(Debug, Default, Deserialize)]
pub struct PathQuery {
    /// Virtual path the request targets; static mode only.
    pub path: Option<String>,
}

impl PathQuery {
    /// Parse the request's query string; a missing query is the default.
    pub fn from_uri(uri: &Uri) -> Result<Self, String> {
        Query::<Self>::try_from_uri(uri)
            .map(|Query(query)| query)
            .map_err(|e| e.body_text())
    }
}

/// Body of `GET /api/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub root: String,
    pub quota: u64,
    pub quota_display: String,
    pub mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub virtual_prefix: Option<String>,
}

impl From<&SessionContext> for SessionInfo {
    fn from(session: &SessionContext) -> Self {
        let (mode, virtual_prefix) = match session.mode() {
            SessionMode::Static { virtual_prefix } => ("static", Some(virtual_prefix.clone())),
            SessionMode::Token { .. } => ("token", None),
        };
        Self {
            root: session.root().to_string_lossy().into_owned(),
            quota: session.quota(),
            quota_display: format_bytes(session.quota()),
            mode: mode.to_string(),
            virtual_prefix,
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/session", get(session_info))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_session));

    Router::new()
        .route("/healthz", get(healthz))
        .merge(api)
        .with_state(state)
}

/// Resolve the request's session or reject it.
///
/// Token mode: the `Authorization` header must carry a valid bearer token.
/// Static mode: `?path=` picks the mapping by longest virtual prefix and
/// defaults to `/`. The query is only read in static mode, so token mode
/// answers 401 before anything else about the request is inspected.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Response {
    match &state.config.mode {
        AccessMode::Token(settings) => {
            let Some(authority) = state.authority.as_ref() else {
                warn!("Token mode active without a token authority");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            };

            let authorization = req
                .headers()
                .get(header::AUTHORIZATION)
                .map(|value| value.to_str().map_err(|_| AuthError::MalformedHeader));

            let result = match authorization {
                None => Err(AuthError::Missing),
                Some(Err(e)) => Err(e),
                Some(Ok(value)) => bearer_token(Some(value))
                    .and_then(|token| authority.verify(token))
                    .and_then(|claims| {
                        SessionContext::for_claims(
                            &claims,
                            &settings.base_dir,
                            state.config.quota_bytes,
                        )
                        .map(|session| (claims, session))
                    }),
            };

            match result {
                Ok((claims, session)) => {
                    debug!(
                        "Token session for {:?} (quota {})",
                        session.root(),
                        format_bytes(session.quota())
                    );
                    req.extensions_mut().insert(claims);
                    req.extensions_mut().insert(session);
                }
                Err(e) => return unauthorized(&e),
            }
        }
        AccessMode::Static(table) => {
            let query = match PathQuery::from_uri(req.uri()) {
                Ok(query) => query,
                Err(reason) => {
                    debug!("Rejected query {:?}: {}", req.uri().query(), reason);
                    return (StatusCode::BAD_REQUEST, "invalid path query").into_response();
                }
            };
            let path = query.path.as_deref().unwrap_or("/");
            let Some((mapping, _)) = table.lookup(path) else {
                debug!("No directory mapped for {:?}", path);
                return (StatusCode::NOT_FOUND, "no directory mapped for path").into_response();
            };
            req.extensions_mut()
                .insert(SessionContext::for_mapping(mapping, state.config.quota_bytes));
        }
    }

    next.run(req).await
}

/// 401 with one of the fixed public bodies.
fn unauthorized(error: &AuthError) -> Response {
    debug!("Rejected request: {}", error);
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        error.public_message(),
    )
        .into_response()
}

async fn session_info(Extension(session): Extension<SessionContext>) -> Json<SessionInfo> {
    Json(SessionInfo::from(&session))
}

async fn healthz() -> &'static str {
    "ok"
}
