// handlers/public/auth/register.rs - POST /api/register handler

use axum::extract::{rejection::JsonRejection, State};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;

use crate::app::AppState;
use crate::auth::password;
use crate::database::models::{NewUser, PublicUser};
use crate::error::ApiError;
use crate::middleware::ApiResponse;

use super::validation::{self, FieldErrors};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub display_name: Option<String>,
}

/// POST /api/register - Create an account and log it in
///
/// Input: `{ "username": "alice", "password": "Secret123", "displayName": "Alice" }`
/// (`displayName` optional, defaults to the username)
///
/// Success: 201 with the public profile and a session cookie.
/// Errors: 400 with `field_errors`, 409 when the username is taken.
pub async fn register_post(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(SignedCookieJar, ApiResponse<PublicUser>), ApiError> {
    let Json(request) = payload?;

    let display_name = request
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(&request.username)
        .to_string();

    let mut errors = FieldErrors::new();
    errors.check("username", validation::username(&request.username));
    errors.check("password", validation::password(&request.password));
    errors.check("displayName", validation::display_name(&display_name));
    errors.into_result()?;

    let password_hash = password::hash_in_background(request.password).await?;

    let mut user = state
        .users
        .create(NewUser {
            username: request.username,
            password_hash,
            display_name,
        })
        .await?;
    tracing::info!("Registered user {} ({})", user.username, user.id);

    let jar = super::start_session(&state, jar, &mut user).await?;
    Ok((jar, ApiResponse::created(PublicUser::from(&user))))
}
