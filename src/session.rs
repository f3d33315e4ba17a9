use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

use crate::auth::extract_exp_from_jwt;
use crate::config::{CONFIG_OVERRIDE_ENV, SERVICE_NAME};

/// Credentials persisted between CLI invocations.
///
/// The backend authenticates through a cookie pair: a short-lived access
/// token plus a long-lived refresh token. Both are kept here and replayed
/// as a `Cookie` header on later requests.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StoredSession {
    pub email: String,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub access_exp: Option<u64>, // epoch seconds
}

impl StoredSession {
    pub fn new(email: String, access_token: String, refresh_token: Option<String>) -> Self {
        let access_exp = extract_exp_from_jwt(&access_token);
        Self {
            email,
            access_token,
            refresh_token,
            access_exp,
        }
    }

    /// Value for the `Cookie` header on authenticated requests.
    pub fn cookie_header(&self) -> String {
        match &self.refresh_token {
            Some(refresh) => format!(
                "access_token={}; refresh_token={}",
                self.access_token, refresh
            ),
            None => format!("access_token={}", self.access_token),
        }
    }

    pub fn is_near_expiry(&self, buffer_secs: u64) -> bool {
        if let Some(exp) = self.access_exp {
            let now = std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_secs();
            exp <= now + buffer_secs
        } else {
            false
        }
    }

    /// Swap in a freshly issued access token, recomputing its expiry.
    pub fn rotate_access_token(&mut self, access_token: String) {
        self.access_exp = extract_exp_from_jwt(&access_token);
        self.access_token = access_token;
    }
}

pub async fn cfg_dir() -> Result<PathBuf> {
    if let Ok(override_dir) = std::env::var(CONFIG_OVERRIDE_ENV) {
        let mut p = PathBuf::from(override_dir);
        tokio::fs::create_dir_all(&p)
            .await
            .context("create override config dir")?;
        p.push(SERVICE_NAME);
        tokio::fs::create_dir_all(&p)
            .await
            .context("create service config dir")?;
        return Ok(p);
    }

    let mut p = dirs::config_dir().context("could not determine config directory")?;
    p.push(SERVICE_NAME);
    tokio::fs::create_dir_all(&p)
        .await
        .context("create config dir")?;
    Ok(p)
}

pub async fn session_file() -> Result<PathBuf> {
    Ok(cfg_dir().await?.join("session.json"))
}

pub async fn write_session(session: &StoredSession) -> Result<()> {
    let path = session_file().await?;
    let data = serde_json::to_vec_pretty(session)?;

    tokio::fs::write(&path, &data)
        .await
        .context("write session file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) =
            tokio::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600)).await
        {
            warn!("Failed to set strict permissions on session file: {}", e);
        }
    }

    Ok(())
}

pub async fn read_session() -> Result<StoredSession> {
    let path = session_file().await?;
    let bytes = tokio::fs::read(&path).await.context("read session file")?;
    let session: StoredSession = serde_json::from_slice(&bytes).context("parse session json")?;
    Ok(session)
}

pub async fn remove_session() -> Result<()> {
    let path = session_file().await?;
    match tokio::fs::remove_file(path).await {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context("remove session file"),
    }
}
