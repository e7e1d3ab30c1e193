use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::ApiError;
use crate::auth::{token_from_headers, SessionKeys};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

#[derive(Debug, Clone)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Sliding fixed-window limiter for simple API protection.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    state: Arc<Mutex<RateLimitWindow>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            state: Arc::new(Mutex::new(RateLimitWindow {
                started_at: Instant::now(),
                count: 0,
            })),
        }
    }
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Routes reachable without a session.
pub(crate) fn is_public(method: &Method, path: &str) -> bool {
    match *method {
        Method::OPTIONS => true,
        Method::POST => matches!(path, "/api/login" | "/api/register" | "/api/logout"),
        Method::GET => match path {
            "/api/health" | "/api/map-key" | "/api/buildings" | "/api/vending-machine" => true,
            _ => path
                .strip_prefix("/api/vending-machine/")
                .is_some_and(|id| !id.is_empty() && !id.contains('/')),
        },
        _ => false,
    }
}

/// Session gate for everything under `/api`.
///
/// A token that is present but fails verification is rejected on every
/// route, public or not. Verified [`crate::auth::Claims`] are inserted as a
/// request extension.
pub async fn require_session(
    State(sessions): State<SessionKeys>,
    mut req: Request,
    next: Next,
) -> Response {
    let rid = req
        .extensions()
        .get::<RequestId>()
        .map_or_else(String::new, |r| r.0.clone());

    match token_from_headers(req.headers()) {
        Some(token) => match sessions.verify(&token) {
            Ok(claims) => {
                req.extensions_mut().insert(claims);
                next.run(req).await
            }
            Err(e) => {
                tracing::debug!(error = %e, "session token rejected");
                ApiError::new(rid, "unauthorized", "Invalid or expired token").into_response()
            }
        },
        None if is_public(req.method(), req.uri().path()) => next.run(req).await,
        None => ApiError::new(rid, "unauthorized", "Unauthorized, user not logged in")
            .into_response(),
    }
}

/// Middleware enforcing a fixed request-per-window limit.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let mut window = rate_limit.state.lock().await;
    let elapsed = window.started_at.elapsed();

    if elapsed >= rate_limit.window {
        window.started_at = Instant::now();
        window.count = 0;
    }

    if window.count >= rate_limit.max_requests {
        drop(window);
        let rid = req
            .extensions()
            .get::<RequestId>()
            .map_or_else(String::new, |r| r.0.clone());
        tracing::warn!(path = %req.uri().path(), "rate limit exceeded");
        return ApiError::new(rid, "rate_limited", "rate limit exceeded").into_response();
    }

    window.count += 1;
    drop(window);

    next.run(req).await
}
