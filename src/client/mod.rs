//! HTTP client for the Digital Desk API.
//!
//! The session cookie handed out by the server is kept in an
//! [`ExpiringCache`], so a client that sits idle past the cache TTL starts
//! over from the login prompt even if the server session is still alive.

pub mod gate;

use std::time::Duration;

use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::auth::SESSION_COOKIE;
use crate::cache::{Clock, ExpiringCache, Storage, SystemClock};
use crate::database::models::{BrainDump, PublicUser};

pub use gate::{AuthGate, GateView, IdentitySource};

/// Cache key holding the signed session cookie value
pub const SESSION_KEY: &str = "session";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },

    #[error("Server did not issue a session cookie")]
    MissingSession,
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub struct DeskClient<S, C = SystemClock> {
    http: reqwest::Client,
    base: Url,
    cache: ExpiringCache<S, C>,
}

impl<S: Storage, C: Clock> DeskClient<S, C> {
    pub fn new(base_url: &str, cache: ExpiringCache<S, C>) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { http, base, cache })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn cache(&self) -> &ExpiringCache<S, C> {
        &self.cache
    }

    /// Whether a session cookie is cached. Says nothing about server validity.
    pub fn has_session(&mut self) -> bool {
        self.cache.get::<String>(SESSION_KEY).is_some()
    }

    /// How long the cached session cookie stays usable locally
    pub fn session_time_remaining(&self) -> Duration {
        self.cache.time_remaining(SESSION_KEY)
    }

    pub async fn health(&mut self) -> Result<Value, ClientError> {
        let response = self.request(Method::GET, "health")?.send().await?;
        Self::json(response).await
    }

    pub async fn register(
        &mut self,
        username: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> Result<PublicUser, ClientError> {
        let body = json!({
            "username": username,
            "password": password,
            "displayName": display_name,
        });
        self.authenticate("api/register", &body).await
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<PublicUser, ClientError> {
        let body = json!({ "username": username, "password": password });
        self.authenticate("api/login", &body).await
    }

    /// End the session on the server. The local copy is dropped even when
    /// the server cannot be reached.
    pub async fn logout(&mut self) -> Result<(), ClientError> {
        let result = self.request(Method::POST, "api/logout")?.send().await;
        self.cache.remove(SESSION_KEY);
        Self::json::<Value>(result?).await.map(|_| ())
    }

    /// The server's view of who we are. `None` when the server answers 401,
    /// in which case the cached cookie is discarded.
    pub async fn current_user(&mut self) -> Result<Option<PublicUser>, ClientError> {
        let response = self.request(Method::GET, "api/user")?.send().await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            self.cache.remove(SESSION_KEY);
            return Ok(None);
        }
        Self::json(response).await.map(Some)
    }

    pub async fn change_password(&mut self, current: &str, new: &str) -> Result<(), ClientError> {
        let body = json!({ "currentPassword": current, "newPassword": new });
        let response = self
            .request(Method::PUT, "api/user/password")?
            .json(&body)
            .send()
            .await?;
        self.capture_session(&response);
        Self::json::<Value>(response).await.map(|_| ())
    }

    pub async fn list_brain_dumps(&mut self) -> Result<Vec<BrainDump>, ClientError> {
        let response = self.request(Method::GET, "api/brain-dumps")?.send().await?;
        Self::json(response).await
    }

    pub async fn add_brain_dump(&mut self, content: &str) -> Result<BrainDump, ClientError> {
        let response = self
            .request(Method::POST, "api/brain-dumps")?
            .json(&json!({ "content": content }))
            .send()
            .await?;
        Self::json(response).await
    }

    pub async fn delete_brain_dump(&mut self, id: Uuid) -> Result<(), ClientError> {
        let path = format!("api/brain-dumps/{}", id);
        let response = self.request(Method::DELETE, &path)?.send().await?;
        Self::check(response).await.map(|_| ())
    }

    async fn authenticate<B: Serialize>(&mut self, path: &str, body: &B) -> Result<PublicUser, ClientError> {
        let response = self.request(Method::POST, path)?.json(body).send().await?;
        let captured = self.capture_session(&response);
        let user = Self::json(response).await?;
        if !captured {
            return Err(ClientError::MissingSession);
        }
        Ok(user)
    }

    fn request(&mut self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let url = self.base.join(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(value) = self.cache.get::<String>(SESSION_KEY) {
            builder = builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, value));
        }
        Ok(builder)
    }

    /// Store or clear the session cookie from `Set-Cookie`. Returns whether a
    /// new session was stored.
    fn capture_session(&mut self, response: &Response) -> bool {
        for header in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = header.to_str() else { continue };
            let Ok(parsed) = cookie::Cookie::parse(raw) else {
                tracing::debug!("Ignoring unparseable Set-Cookie header");
                continue;
            };
            if parsed.name() != SESSION_COOKIE {
                continue;
            }

            let removal = parsed.value().is_empty()
                || parsed.max_age().is_some_and(|age| age.is_zero() || age.is_negative());
            if removal {
                self.cache.remove(SESSION_KEY);
                return false;
            }
            self.cache.set(SESSION_KEY, &parsed.value().to_string());
            return true;
        }
        false
    }

    async fn check(response: Response) -> Result<Response, ClientError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<Value>()
            .await
            .ok()
            .and_then(|body| body.get("message").and_then(Value::as_str).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Request failed").to_string());
        Err(ClientError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        let response = Self::check(response).await?;
        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryStorage, DEFAULT_TTL};

    fn client(base: &str) -> DeskClient<MemoryStorage, ManualClock> {
        let cache = ExpiringCache::with_options(
            MemoryStorage::new(),
            ManualClock::starting_at(0),
            "test:",
            DEFAULT_TTL,
        );
        DeskClient::new(base, cache).unwrap()
    }

    #[test]
    fn base_url_gains_trailing_slash() {
        let c = client("http://localhost:3000/desk");
        assert_eq!(c.base_url().as_str(), "http://localhost:3000/desk/");
        assert_eq!(c.base_url().join("api/login").unwrap().path(), "/desk/api/login");
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let cache = ExpiringCache::new(MemoryStorage::new());
        assert!(matches!(
            DeskClient::new("not a url", cache),
            Err(ClientError::InvalidUrl(_))
        ));
    }

    #[test]
    fn no_cached_session_means_no_time_remaining() {
        let mut c = client("http://localhost:3000");
        assert!(!c.has_session());
        assert_eq!(c.session_time_remaining(), Duration::ZERO);
    }
}
