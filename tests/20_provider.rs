mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{fixed_user_config, TestApp};

#[tokio::test]
async fn fixed_test_user_is_seeded_and_resolved_without_a_cookie() -> Result<()> {
    let app = TestApp::with_config(fixed_user_config("demo")).await?;

    let res = app.get("/api/user", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["username"], "demo");
    assert_eq!(res.body["displayName"], "Test User");
    assert_eq!(res.body["initials"], "TU");
    Ok(())
}

#[tokio::test]
async fn fixed_test_user_has_no_usable_password() -> Result<()> {
    let app = TestApp::with_config(fixed_user_config("demo")).await?;

    for password in ["", "demo", "password", "Secret123"] {
        let res = app.login("demo", password).await?;
        assert_ne!(res.status, StatusCode::OK, "password {:?} logged in", password);
    }
    Ok(())
}

#[tokio::test]
async fn seeding_is_idempotent() -> Result<()> {
    let app = TestApp::with_config(fixed_user_config("demo")).await?;
    app.state.prepare().await?;

    let res = app.get("/api/user", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn fixed_test_user_can_use_guarded_resources() -> Result<()> {
    let app = TestApp::with_config(fixed_user_config("demo")).await?;

    let res = app.post("/api/brain-dumps", None, json!({ "content": "from the demo user" })).await?;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app.get("/api/brain-dumps", None).await?;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body.as_array().map(Vec::len), Some(1));
    Ok(())
}

#[tokio::test]
async fn real_provider_has_no_bypass() -> Result<()> {
    let app = TestApp::new().await?;
    // Even a registered "demo" user needs a session under the real provider
    app.register("demo", "Demo").await?;

    let res = app.get("/api/user", None).await?;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    Ok(())
}
