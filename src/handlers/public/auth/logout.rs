// handlers/public/auth/logout.rs - POST /api/logout handler

use axum::extract::State;
use axum::http::{header, HeaderName};
use axum_extra::extract::cookie::SignedCookieJar;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{removal_cookie, short_sid, SESSION_COOKIE};
use crate::error::ApiError;
use crate::middleware::ApiResponse;

/// POST /api/logout - Destroy the server-side session
///
/// Works with or without a valid cookie and always answers with a removal
/// cookie. Once this returns, the old session id no longer authenticates.
pub async fn logout_post(
    State(state): State<AppState>,
    jar: SignedCookieJar,
) -> Result<([(HeaderName, String); 1], ApiResponse<Value>), ApiError> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(cookie.value()).await?;
        tracing::info!("Session {} destroyed", short_sid(cookie.value()));
    }

    // Set directly rather than through the jar, which only clears cookies it verified
    Ok((
        [(header::SET_COOKIE, removal_cookie().to_string())],
        ApiResponse::success(json!({ "message": "Logged out" })),
    ))
}
