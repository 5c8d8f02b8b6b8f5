// ABOUTME: Matrix client initialization and authentication
// ABOUTME: Creates the client with its sqlite crypto store and logs in via password or token

use anyhow::{Context, Result};
use matrix_sdk::{ruma::OwnedUserId, Client};
use quatbot_core::config::MatrixConfig;
use std::path::Path;

pub async fn create_client(homeserver: &str, store_dir: &Path) -> Result<Client> {
    std::fs::create_dir_all(store_dir)
        .with_context(|| format!("Failed to create {}", store_dir.display()))?;
    let client = Client::builder()
        .homeserver_url(homeserver)
        .sqlite_store(store_dir, None)
        .build()
        .await
        .context("Failed to create Matrix client")?;

    tracing::info!(homeserver = %homeserver, store = %store_dir.display(), "Matrix client created");

    Ok(client)
}

/// Log in with the access token if there is one, otherwise with the password
pub async fn login(client: &Client, matrix: &MatrixConfig) -> Result<()> {
    if let Some(token) = matrix.access_token.as_deref() {
        tracing::info!("Logging in with access token");
        let user_id: OwnedUserId = matrix
            .user_id
            .parse()
            .with_context(|| format!("Invalid user id {}", matrix.user_id))?;
        let session = matrix_sdk::AuthSession::Matrix(matrix_sdk::authentication::matrix::MatrixSession {
            meta: matrix_sdk::SessionMeta {
                user_id,
                device_id: matrix.device_name.clone().into(),
            },
            tokens: matrix_sdk::SessionTokens {
                access_token: token.to_string(),
                refresh_token: None,
            },
        });
        client
            .restore_session(session)
            .await
            .context("Failed to restore session")?;
    } else if let Some(pwd) = matrix.password.as_deref() {
        tracing::info!("Logging in with password");
        client
            .matrix_auth()
            .login_username(&matrix.user_id, pwd)
            .device_id(&matrix.device_name)
            .initial_device_display_name("quatbot")
            .send()
            .await
            .context("Failed to log in")?;
    } else {
        anyhow::bail!("Either MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN is required");
    }

    let user_id = client
        .user_id()
        .context("Logged in but the client has no user id")?;
    tracing::info!(user_id = %user_id, "Logged in successfully");

    Ok(())
}
