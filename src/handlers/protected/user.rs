// handlers/protected/user.rs - GET /api/user and PUT /api/user/password handlers

use axum::extract::{rejection::JsonRejection, State};
use axum::{Extension, Json};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::auth::{password, session_cookie, Identity};
use crate::database::models::PublicUser;
use crate::error::ApiError;
use crate::handlers::public::auth::validation::{self, FieldErrors};
use crate::middleware::{ApiResponse, ApiResult};

/// GET /api/user - Profile of the authenticated caller
pub async fn user_get(Extension(identity): Extension<Identity>) -> ApiResult<PublicUser> {
    Ok(ApiResponse::success(PublicUser::from(&identity.user)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChangeRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub new_password: String,
}

/// PUT /api/user/password - Change the caller's password
///
/// Requires the current password. Every existing session of the user is
/// destroyed; the caller gets a fresh one in the response cookie.
pub async fn password_put(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    jar: SignedCookieJar,
    payload: Result<Json<PasswordChangeRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, ApiResponse<Value>), ApiError> {
    let Json(request) = payload?;

    let mut errors = FieldErrors::new();
    errors.check("currentPassword", validation::required(&request.current_password, "Current password"));
    errors.check("newPassword", validation::password(&request.new_password));
    errors.into_result()?;

    let user = identity.user;
    let verified = password::verify_in_background(Some(user.password.clone()), request.current_password).await?;
    if !verified {
        let mut errors = FieldErrors::new();
        errors.add("currentPassword", "Current password is incorrect");
        errors.into_result()?;
    }

    let new_hash = password::hash_in_background(request.new_password).await?;
    state.users.update_password(user.id, &new_hash).await?;

    let revoked = state.sessions.destroy_for_user(user.id).await?;
    tracing::info!("Password changed for {}; {} sessions revoked", user.username, revoked);

    // Sessionless callers (fixed test user) have nothing to replace
    let jar = match identity.session {
        Some(_) => {
            let ttl = state.config.security.session_ttl();
            let session = state.sessions.create(user.id, ttl).await?;
            jar.add(session_cookie(&session, &state.config.security))
        }
        None => jar,
    };

    Ok((jar, ApiResponse::success(json!({ "message": "Password updated" }))))
}
