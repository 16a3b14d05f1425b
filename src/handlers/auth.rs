use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect};
use axum::{http::StatusCode, Json};
use axum_extra::extract::{
    cookie::{Cookie, SameSite},
    CookieJar,
};
use serde_json::json;
use tracing::{info, warn};

use crate::error::AppError;
use crate::middleware::{MaybeUser, SESSION_COOKIE};
use crate::models::{Identity, Session, SessionResponse, SignInRequest, SignUpRequest};
use crate::validate;
use crate::AppState;

fn session_cookie(session: Session) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::days(7))
        .build()
}

pub async fn sign_up(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, CookieJar, Json<Identity>), AppError> {
    validate::sign_up(&req.email, &req.password, &req.username)?;

    let (identity, session) = state
        .backend
        .sign_up(&req.email, &req.password, &req.username)
        .map_err(|err| {
            warn!(error = %err, "Sign-up failed");
            AppError::AuthFailed
        })?;

    Ok((
        StatusCode::CREATED,
        jar.add(session_cookie(session)),
        Json(identity),
    ))
}

pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<SignInRequest>,
) -> Result<(CookieJar, Json<Identity>), AppError> {
    validate::sign_in(&req.email, &req.password)?;

    let (identity, session) = state
        .backend
        .sign_in(&req.email, &req.password)
        .map_err(|err| {
            warn!(error = %err, "Sign-in failed");
            AppError::AuthFailed
        })?;

    Ok((jar.add(session_cookie(session)), Json(identity)))
}

pub async fn sign_out(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, impl IntoResponse), AppError> {
    if let Some(session_cookie) = jar.get(SESSION_COOKIE) {
        state.backend.sign_out(session_cookie.value())?;
    }

    let cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(0));

    Ok((jar.remove(cookie), Json(json!({ "success": true }))))
}

pub async fn session(MaybeUser(user): MaybeUser) -> Json<SessionResponse> {
    Json(SessionResponse { user })
}

pub async fn oauth(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> Result<Redirect, AppError> {
    let url = state.backend.oauth_authorize_url(&provider)?;
    info!(provider = %provider, "Redirecting to OAuth provider");
    Ok(Redirect::to(&url))
}
