//! OAuth refresh-token exchange.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::Settings;
use crate::error::{PrismError, Result};

/// Lifetime assumed when the token endpoint does not report `expires_in`.
pub const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(900);

/// A short-lived access token for one client session. Never persisted.
#[derive(Clone)]
pub struct BearerToken {
    access_token: String,
    expires_at: Instant,
}

impl std::fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerToken")
            .field("access_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl BearerToken {
    pub fn new(access_token: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Instant::now() + lifetime,
        }
    }

    pub fn secret(&self) -> &str {
        &self.access_token
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Exchange the configured refresh token for a bearer token.
///
/// Issues exactly one POST; never retries. Safe to call again at any time to
/// obtain a fresh token.
pub async fn acquire_token(http: &reqwest::Client, settings: &Settings) -> Result<BearerToken> {
    let url = settings.token_endpoint();
    info!(url = %url, client_id = %settings.client_id, "Requesting bearer token");

    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", settings.refresh_token.as_str()),
        ("client_id", settings.client_id.as_str()),
        ("client_secret", settings.client_secret.as_str()),
    ];

    let response = http.post(&url).form(&form).send().await.map_err(|e| {
        error!(error = ?e, url = %url, "Token request could not be sent");
        PrismError::Auth {
            status: None,
            message: e.to_string(),
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), body = %body, "Token exchange rejected");
        return Err(PrismError::Auth {
            status: Some(status.as_u16()),
            message: if body.is_empty() {
                status.to_string()
            } else {
                body
            },
        });
    }

    let token: TokenResponse = response.json().await.map_err(|e| PrismError::Auth {
        status: Some(status.as_u16()),
        message: format!("malformed token response: {e}"),
    })?;

    let lifetime = token
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);
    debug!(lifetime_secs = lifetime.as_secs(), "Obtained bearer token");
    Ok(BearerToken::new(token.access_token, lifetime))
}
