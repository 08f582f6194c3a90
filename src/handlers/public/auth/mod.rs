// handlers/public/auth/mod.rs - Session acquisition and release

pub mod login; // POST /api/login - verify credentials, start a session
pub mod logout; // POST /api/logout - end the session
pub mod register; // POST /api/register - create an account, start a session
pub mod validation;

pub use login::login_post;
pub use logout::logout_post;
pub use register::register_post;

use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;

use crate::app::AppState;
use crate::auth::{session_cookie, short_sid, SESSION_COOKIE};
use crate::database::models::User;
use crate::error::ApiError;

/// Start a fresh session for `user`, replacing whatever session the jar held.
/// Records the login time on `user` as well as in the repository.
pub(crate) async fn start_session(
    state: &AppState,
    jar: SignedCookieJar,
    user: &mut User,
) -> Result<SignedCookieJar, ApiError> {
    if let Some(previous) = jar.get(SESSION_COOKIE) {
        state.sessions.destroy(previous.value()).await?;
    }

    let ttl = state.config.security.session_ttl();
    let session = state.sessions.create(user.id, ttl).await?;

    let now = Utc::now();
    state.users.record_login(user.id, now).await?;
    user.last_login_at = Some(now);

    tracing::info!("Session {} started for {}", short_sid(&session.sid), user.username);
    Ok(jar.add(session_cookie(&session, &state.config.security)))
}
