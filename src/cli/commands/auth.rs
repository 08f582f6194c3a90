use serde_json::json;

use crate::cli::config::CliClient;
use crate::cli::utils::{format_remaining, output_success, value_or_prompt};
use crate::cli::OutputFormat;
use crate::client::{AuthGate, GateView};
use crate::database::models::PublicUser;

fn user_json(user: &PublicUser) -> serde_json::Value {
    json!({ "user": user })
}

pub async fn register(
    client: &mut CliClient,
    username: &str,
    password: Option<String>,
    display_name: Option<String>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let password = value_or_prompt(password, "Password")?;
    let user = client.register(username, &password, display_name.as_deref()).await?;

    output_success(
        output_format,
        &format!("Registered and logged in as {} ({})", user.username, user.display_name),
        Some(user_json(&user)),
    )
}

pub async fn login(
    client: &mut CliClient,
    username: &str,
    password: Option<String>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let password = value_or_prompt(password, "Password")?;
    let user = client.login(username, &password).await?;

    output_success(
        output_format,
        &format!("Logged in as {} ({})", user.username, user.display_name),
        Some(user_json(&user)),
    )
}

pub async fn logout(client: &mut CliClient, output_format: &OutputFormat) -> anyhow::Result<()> {
    client.logout().await?;
    output_success(output_format, "Logged out", None)
}

/// Goes through the gate so the answer always comes from the server
pub async fn whoami(client: CliClient, output_format: &OutputFormat) -> anyhow::Result<()> {
    let mut gate = AuthGate::new(client);
    match gate.render(|user| user.clone()).await {
        GateView::Protected(user) => output_success(
            output_format,
            &format!("{} ({}, {} plan)", user.username, user.display_name, user.plan),
            Some(user_json(&user)),
        ),
        GateView::LoginPrompt => anyhow::bail!("Not logged in. Run `desk login <username>`."),
    }
}

pub async fn status(client: &mut CliClient, output_format: &OutputFormat) -> anyhow::Result<()> {
    let server = match client.health().await {
        Ok(health) => health
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("unknown")
            .to_string(),
        Err(e) => {
            tracing::debug!("Health check failed: {}", e);
            "unreachable".to_string()
        }
    };

    let has_session = client.has_session();
    let remaining = client.session_time_remaining();

    match output_format {
        OutputFormat::Json => {
            let body = json!({
                "server": client.base_url().as_str(),
                "server_status": server,
                "session_cached": has_session,
                "session_remaining_secs": remaining.as_secs(),
                "storage": client.cache().storage().path(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            println!("Server:  {} ({})", client.base_url(), server);
            if has_session {
                println!("Session: cached, {} left locally", format_remaining(remaining));
            } else {
                println!("Session: none");
            }
            println!("Storage: {}", client.cache().storage().path().display());
        }
    }
    Ok(())
}

pub async fn passwd(
    client: &mut CliClient,
    current: Option<String>,
    new: Option<String>,
    output_format: &OutputFormat,
) -> anyhow::Result<()> {
    let current = value_or_prompt(current, "Current password")?;
    let new = value_or_prompt(new, "New password")?;
    client.change_password(&current, &new).await?;
    output_success(output_format, "Password changed; other sessions were logged out", None)
}
