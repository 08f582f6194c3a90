pub mod password;
pub mod session;

use axum_extra::extract::cookie::{Cookie, SameSite};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SecurityConfig;
use crate::database::models::User;
use crate::database::{RepositoryError, UserRepository};

pub use session::{MemorySessionStore, PgSessionStore, Session, SessionStore};

pub const SESSION_COOKIE: &str = "desk.sid";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// How requests are mapped to a credential record.
///
/// `Real` requires a live server-side session. `FixedTestUser` resolves every
/// request to one named, pre-seeded user; it is chosen by deployment
/// configuration only and refused in production.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthProvider {
    Real,
    FixedTestUser { username: String },
}

impl AuthProvider {
    /// Resolve the caller. `sid` is the session id from a cookie whose
    /// signature has already been checked.
    pub async fn resolve(
        &self,
        users: &dyn UserRepository,
        sessions: &dyn SessionStore,
        sid: Option<&str>,
    ) -> Result<Identity, AuthError> {
        match self {
            AuthProvider::Real => {
                let sid = sid.ok_or(AuthError::Unauthenticated)?;
                let session = sessions.find(sid).await?.ok_or(AuthError::Unauthenticated)?;

                let user = match users.find_by_id(session.user_id).await? {
                    Some(user) => user,
                    None => {
                        tracing::warn!("Session {} points at missing user {}", short_sid(sid), session.user_id);
                        sessions.destroy(sid).await?;
                        return Err(AuthError::Unauthenticated);
                    }
                };

                Ok(Identity {
                    user,
                    session: Some(session),
                })
            }
            AuthProvider::FixedTestUser { username } => {
                let user = users
                    .find_by_username(username)
                    .await?
                    .ok_or(AuthError::Unauthenticated)?;
                Ok(Identity { user, session: None })
            }
        }
    }
}

/// The resolved caller attached to a request
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: User,
    pub session: Option<Session>,
}

/// Session cookie for a freshly created session
pub fn session_cookie(session: &Session, security: &SecurityConfig) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.sid.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(security.cookie_secure)
        .max_age(cookie::time::Duration::hours(security.session_ttl_hours()))
        .build()
}

/// Empty, already-expired session cookie with the same path and flags
pub fn removal_cookie() -> Cookie<'static> {
    let mut removal = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    removal.make_removal();
    removal
}

/// Enough of a session id to correlate log lines without leaking it
pub fn short_sid(sid: &str) -> &str {
    sid.get(..8).unwrap_or(sid)
}
