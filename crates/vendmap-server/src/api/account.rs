//! Account handlers: register, login, logout, current user.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap, HeaderValue},
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::{clear_session_cookie, hash_password, verify_password, Claims};
use crate::middleware::RequestId;

use super::{map_db_error, ApiError, AppState, MessageResponse};

#[derive(Debug, Default, Deserialize)]
pub(in crate::api) struct RegisterRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(in crate::api) struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct MeResponse {
    pub id: Option<i64>,
    pub email: String,
    pub username: String,
}

fn required(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn session_headers(
    rid: &str,
    state: &AppState,
    user_id: i64,
    email: &str,
    username: &str,
) -> Result<HeaderMap, ApiError> {
    let token = state.sessions.issue(user_id, email, username).map_err(|e| {
        tracing::error!(error = %e, "failed to issue session token");
        ApiError::internal(rid)
    })?;
    let cookie = HeaderValue::from_str(&state.sessions.session_cookie(&token)).map_err(|e| {
        tracing::error!(error = %e, "session cookie is not a valid header value");
        ApiError::internal(rid)
    })?;

    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, cookie);
    Ok(headers)
}

/// POST /api/register: create an account and start a session.
pub(in crate::api) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))?;

    let (Some(email), Some(password)) = (required(body.email.as_ref()), body.password.as_deref())
    else {
        return Err(ApiError::new(rid, "bad_request", "Missing fields"));
    };
    if password.is_empty() {
        return Err(ApiError::new(rid, "bad_request", "Missing fields"));
    }
    let username = required(body.username.as_ref()).map_or_else(
        || format!("user{}", Utc::now().timestamp_micros()),
        ToOwned::to_owned,
    );

    let password = password.to_owned();
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing task failed");
            ApiError::internal(rid)
        })?
        .map_err(|e| {
            tracing::error!(error = %e, "password hashing failed");
            ApiError::internal(rid)
        })?;

    let user = match vendmap_db::create_user(&state.pool, &username, email, &password_hash).await {
        Ok(user) => user,
        Err(e) if e.is_unique_violation() => {
            return Err(ApiError::new(rid, "conflict", "Email already registered"));
        }
        Err(e) => return Err(map_db_error(rid.clone(), &e)),
    };

    tracing::info!(user_id = user.id, username = %user.username, "user registered");
    let headers = session_headers(rid, &state, user.id, &user.email, &user.username)?;
    Ok((
        headers,
        Json(MessageResponse {
            message: "User registered",
        }),
    ))
}

/// POST /api/login
pub(in crate::api) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(HeaderMap, Json<MessageResponse>), ApiError> {
    let rid = &req_id.0;
    let Json(body) = body.map_err(|e| ApiError::new(rid, "bad_request", e.body_text()))?;

    let (Some(email), Some(password)) = (
        required(body.email.as_ref()),
        body.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::new(rid, "bad_request", "Missing fields"));
    };

    let user = vendmap_db::get_user_by_email(&state.pool, email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::new(rid, "not_found", "User not found"))?;

    let stored_hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "password verification task failed");
            ApiError::internal(rid)
        })?;
    if !matches {
        tracing::info!(user_id = user.id, "login rejected: wrong password");
        return Err(ApiError::new(rid, "unauthorized", "Invalid password"));
    }

    let headers = session_headers(rid, &state, user.id, &user.email, &user.username)?;
    Ok((
        headers,
        Json(MessageResponse {
            message: "Login successful",
        }),
    ))
}

/// POST /api/logout: expire the session cookie.
pub(in crate::api) async fn logout() -> (HeaderMap, Json<MessageResponse>) {
    let mut headers = HeaderMap::new();
    headers.insert(header::SET_COOKIE, clear_session_cookie());
    (
        headers,
        Json(MessageResponse {
            message: "Logged out",
        }),
    )
}

/// GET /api/me
pub(in crate::api) async fn me(Extension(claims): Extension<Claims>) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.user_id(),
        email: claims.email,
        username: claims.username,
    })
}
