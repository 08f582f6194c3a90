// handlers/public/auth/login.rs - POST /api/login handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::password;
use crate::database::models::PublicUser;
use crate::error::ApiError;
use crate::middleware::ApiResponse;

use super::validation::{required, FieldErrors};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// POST /api/login - Verify credentials and start a session
///
/// Input: `{ "username": "alice", "password": "Secret123" }`
///
/// Success: 200 with the public profile and a signed `desk.sid` cookie.
/// An unknown username and a wrong password produce the same 401 body and
/// cost the same key derivation.
pub async fn login_post(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, ApiResponse<PublicUser>), ApiError> {
    let Json(request) = payload?;

    let mut errors = FieldErrors::new();
    errors.check("username", required(&request.username, "Username"));
    errors.check("password", required(&request.password, "Password"));
    errors.into_result()?;

    let found = state.users.find_by_username(&request.username).await?;
    let stored = found.as_ref().map(|user| user.password.clone());
    let verified = password::verify_in_background(stored, request.password).await?;

    let mut user = match found {
        Some(user) if verified => user,
        _ => {
            tracing::info!("Failed login attempt for '{}'", request.username);
            return Err(ApiError::invalid_credentials());
        }
    };

    let jar = super::start_session(&state, jar, &mut user).await?;
    Ok((jar, ApiResponse::success(PublicUser::from(&user))))
}
