use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use tracing::warn;

use crate::error::AppError;
use crate::models::Identity;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const API_KEY_HEADER: &str = "apikey";
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// A request carrying a valid session cookie.
pub struct CurrentUser(pub Identity);

/// The session identity, if any. Never rejects.
pub struct MaybeUser(pub Option<Identity>);

/// Writer tag for change events, from the `X-Client-Id` header.
pub struct Origin(pub Option<String>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match session_identity(parts, state)? {
            Some(identity) => Ok(CurrentUser(identity)),
            None => {
                warn!("Unauthorized API access attempt");
                Err(AppError::Unauthorized)
            }
        }
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(session_identity(parts, state).ok().flatten()))
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Origin {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let origin = parts
            .headers
            .get(CLIENT_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Ok(Origin(origin))
    }
}

fn session_identity(parts: &Parts, state: &AppState) -> Result<Option<Identity>, AppError> {
    let jar = CookieJar::from_headers(&parts.headers);
    match jar.get(SESSION_COOKIE) {
        Some(cookie) => Ok(state.backend.identity_for(cookie.value())?),
        None => Ok(None),
    }
}

/// Rejects `/api` requests without the public API key, when one is configured.
/// The key travels in the `apikey` header, or in an `apikey` query parameter
/// for plain browser navigations such as the OAuth redirect.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(expected) = state.api_key.as_deref() {
        let header = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|h| h.to_str().ok());
        let provided = match header {
            Some(key) => Some(key.to_string()),
            None => query_api_key(req.uri().query()),
        };
        if provided.as_deref() != Some(expected) {
            warn!(path = %req.uri().path(), "Request without valid API key");
            return Err(AppError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

fn query_api_key(query: Option<&str>) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == API_KEY_HEADER)
        .map(|(_, value)| value.into_owned())
}
