use anyhow::{Context, Result};
use jwt_simple::prelude::*;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::session::{remove_session, write_session, StoredSession};

/// Outcome of the pre-flight session probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Allowed,
    RedirectToLogin,
}

/// Ask the server whether the current cookies are good for protected work.
///
/// Exactly one probe, no retries, and the gate fails closed: any failure,
/// network trouble included, reads as "not signed in".
pub async fn check_access(api: &ApiClient) -> Gate {
    match api.probe_home().await {
        Ok(()) => Gate::Allowed,
        Err(e) => {
            info!("session probe rejected: {}", e);
            Gate::RedirectToLogin
        }
    }
}

/// Log in and persist the issued cookie pair as the local session.
pub async fn perform_login(api: &ApiClient, email: &str, password: &str) -> Result<StoredSession> {
    let tokens = api
        .login(email, password)
        .await
        .context("login request failed")?;

    let access = tokens
        .access_token
        .context("login response did not set an access token")?;
    if tokens.refresh_token.is_none() {
        warn!("login response did not set a refresh token; session will not be refreshable");
    }

    let session = StoredSession::new(email.to_string(), access, tokens.refresh_token);
    write_session(&session).await?;
    Ok(session)
}

/// Trade the refresh cookie for a new access token and persist it.
///
/// A 401 means the refresh token itself is dead; the stored session is
/// useless at that point and gets dropped.
pub async fn perform_refresh(api: &ApiClient, mut session: StoredSession) -> Result<StoredSession> {
    match api.refresh().await {
        Ok(access) => {
            session.rotate_access_token(access);
            write_session(&session).await?;
            Ok(session)
        }
        Err(e) if e.status() == Some(StatusCode::UNAUTHORIZED) => {
            let _ = remove_session().await;
            anyhow::bail!(
                "Refresh token has expired or been revoked. Run `farewatch login` to authenticate again."
            );
        }
        Err(e) => Err(e).context("auth/refresh request failed"),
    }
}

/// Revoke the server session when possible; always drop the local one.
pub async fn perform_logout(api: &ApiClient) -> Result<()> {
    if let Err(e) = api.logout().await {
        warn!("server logout failed: {}", e);
    }
    remove_session().await
}

/// Extracts the expiry timestamp from a JWT without verifying it.
pub fn extract_exp_from_jwt(jwt: &str) -> Option<u64> {
    let parts: Vec<&str> = jwt.split('.').collect();
    if parts.len() != 3 {
        warn!("malformed JWT");
        return None;
    }
    let payload_bytes = match Base64UrlSafeNoPadding::decode_to_vec(parts[1], None) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("decode JWT payload failed: {:?}", e);
            return None;
        }
    };
    match serde_json::from_slice::<serde_json::Value>(&payload_bytes) {
        Ok(payload) => payload.get("exp").and_then(|v| v.as_u64()),
        Err(e) => {
            warn!("parse JWT payload failed: {}", e);
            None
        }
    }
}
