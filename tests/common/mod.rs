#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::FromRef;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::IntoResponse;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, Key, SignedCookieJar};
use serde_json::{json, Value};
use tower::ServiceExt;

use digital_desk::app::{router, AppState};
use digital_desk::auth::{AuthProvider, SESSION_COOKIE};
use digital_desk::config::{AppConfig, Secret};

pub const SESSION_SECRET: &str = "integration-test-session-secret-0123456789";
pub const PASSWORD: &str = "Secret123";

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.url = "postgres://localhost/unused".to_string();
    config.security.session_secret = Secret::new(SESSION_SECRET);
    config
}

pub fn fixed_user_config(username: &str) -> AppConfig {
    let mut config = test_config();
    config.auth.provider = AuthProvider::FixedTestUser {
        username: username.to_string(),
    };
    config
}

/// In-process app over the in-memory repositories, driven with `oneshot`
pub struct TestApp {
    pub state: AppState,
    router: Router,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub set_cookies: Vec<String>,
}

impl TestResponse {
    /// `desk.sid=<signed value>` from Set-Cookie, ready for a Cookie header
    pub fn session_cookie(&self) -> Option<String> {
        self.set_cookies.iter().find_map(|raw| {
            let parsed = cookie::Cookie::parse(raw.as_str()).ok()?;
            (parsed.name() == SESSION_COOKIE && !parsed.value().is_empty())
                .then(|| format!("{}={}", parsed.name(), parsed.value()))
        })
    }

    pub fn raw_session_set_cookie(&self) -> Option<&str> {
        self.set_cookies
            .iter()
            .map(String::as_str)
            .find(|raw| raw.starts_with(&format!("{}=", SESSION_COOKIE)))
    }
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: AppConfig) -> Result<Self> {
        let state = AppState::in_memory(config);
        state.prepare().await?;
        let router = router(state.clone());
        Ok(Self { state, router })
    }

    pub async fn request(&self, method: Method, path: &str, cookie: Option<&str>, body: Option<Value>) -> Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let set_cookies = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok().map(str::to_string))
            .collect();

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(TestResponse { status, body, set_cookies })
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Result<TestResponse> {
        self.request(Method::GET, path, cookie, None).await
    }

    pub async fn post(&self, path: &str, cookie: Option<&str>, body: Value) -> Result<TestResponse> {
        self.request(Method::POST, path, cookie, Some(body)).await
    }

    pub async fn register(&self, username: &str, display_name: &str) -> Result<TestResponse> {
        self.post(
            "/api/register",
            None,
            json!({ "username": username, "password": PASSWORD, "displayName": display_name }),
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<TestResponse> {
        self.post("/api/login", None, json!({ "username": username, "password": password }))
            .await
    }

    /// Sign `sid` with the app's cookie key, as the server would
    pub fn signed_session_cookie(&self, sid: &str) -> Result<String> {
        let jar = SignedCookieJar::new(Key::from_ref(&self.state)).add(Cookie::new(SESSION_COOKIE, sid.to_string()));
        let response = jar.into_response();
        let raw = response
            .headers()
            .get(header::SET_COOKIE)
            .context("jar set no cookie")?
            .to_str()?;
        let parsed = cookie::Cookie::parse(raw)?;
        Ok(format!("{}={}", parsed.name(), parsed.value()))
    }

    /// Register `username` and return its session cookie
    pub async fn session_for(&self, username: &str) -> Result<String> {
        let res = self.register(username, username).await?;
        anyhow::ensure!(res.status == StatusCode::CREATED, "register failed: {} {}", res.status, res.body);
        res.session_cookie().context("register set no session cookie")
    }
}

/// Real server on a free port, for tests that go through reqwest
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
}

impl TestServer {
    pub async fn spawn(config: AppConfig) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let state = AppState::in_memory(config);
        state.prepare().await?;

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .with_context(|| format!("failed to bind {}", base_url))?;
        let app = router(state.clone());
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self { port, base_url, state };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        let url = format!("{}/health", self.base_url);
        while Instant::now() < deadline {
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}
