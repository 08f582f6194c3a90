use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::SignedCookieJar;

use crate::app::AppState;
use crate::auth::{short_sid, AuthError, SESSION_COOKIE};
use crate::error::ApiError;

/// Session middleware for every protected route.
///
/// Checks the signed session cookie, resolves it to a credential record through
/// the configured `AuthProvider` and injects the resulting `Identity`. Any
/// failure ends the request here with 401; the handler never runs.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // A cookie with a bad signature is indistinguishable from no cookie
    let sid = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string());

    let identity = state
        .config
        .auth
        .provider
        .resolve(state.users.as_ref(), state.sessions.as_ref(), sid.as_deref())
        .await
        .map_err(|e| {
            if let AuthError::Unauthenticated = e {
                tracing::debug!(
                    "Rejected {} {}: no valid session (cookie {})",
                    request.method(),
                    request.uri().path(),
                    sid.as_deref().map(short_sid).unwrap_or("absent")
                );
            }
            ApiError::from(e)
        })?;

    tracing::debug!("Authenticated {} for {}", identity.user.username, request.uri().path());
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}
