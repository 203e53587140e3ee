use crate::credentials::{Credentials, TokenStore};
use crate::error::AuthError;
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

/// True when the access token must be refreshed before use: expiry unknown,
/// or `now` is within `margin_secs` of it.
pub fn needs_refresh(creds: &Credentials, now: i64, margin_secs: i64) -> bool {
    match creds.expires_at {
        None => true,
        Some(expires_at) => creds.access_token.is_empty() || now >= expires_at - margin_secs,
    }
}

/// Owns the access-token lifecycle. The only writer of token fields in the
/// [`TokenStore`].
pub struct TokenRefresher {
    client: Client,
    auth_base: String,
    store: Arc<TokenStore>,
    margin_secs: i64,
    // serializes token-endpoint exchanges
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TokenRefresher {
    pub fn new(client: Client, auth_base: String, store: Arc<TokenStore>, margin_secs: i64) -> Self {
        Self {
            client,
            auth_base: auth_base.trim_end_matches('/').to_string(),
            store,
            margin_secs,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    /// Credentials with an access token that is good for at least the margin.
    pub async fn ensure_valid(&self) -> Result<Credentials, AuthError> {
        let creds = self.store.credentials();
        if !creds.can_refresh() {
            return Err(AuthError::Unconfigured);
        }
        if !needs_refresh(&creds, Utc::now().timestamp(), self.margin_secs) {
            return Ok(creds);
        }
        let _guard = self.refresh_lock.lock().await;
        // another caller may have refreshed while we waited
        let creds = self.store.credentials();
        if !needs_refresh(&creds, Utc::now().timestamp(), self.margin_secs) {
            return Ok(creds);
        }
        debug!("access token missing or near expiry, refreshing");
        self.exchange(creds).await
    }

    /// Refresh after the API rejected `rejected_token`. If the store already
    /// holds a different access token, someone refreshed in the meantime and
    /// that token is returned without another exchange.
    pub async fn refresh_rejected(&self, rejected_token: &str) -> Result<Credentials, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let creds = self.store.credentials();
        if !creds.can_refresh() {
            return Err(AuthError::Unconfigured);
        }
        if creds.access_token != rejected_token && !creds.access_token.is_empty() {
            debug!("token already refreshed by a concurrent caller");
            return Ok(creds);
        }
        self.exchange(creds).await
    }

    /// Unconditional refresh (background timer, CLI).
    pub async fn force_refresh(&self) -> Result<Credentials, AuthError> {
        let _guard = self.refresh_lock.lock().await;
        let creds = self.store.credentials();
        if !creds.can_refresh() {
            return Err(AuthError::Unconfigured);
        }
        self.exchange(creds).await
    }

    /// Periodic forced refresh, independent of request activity. The first
    /// run happens one `period` after spawning.
    pub fn spawn_background(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match me.force_refresh().await {
                    Ok(c) => info!("background token refresh ok (expires_at {:?})", c.expires_at),
                    Err(AuthError::Unconfigured) => debug!("background token refresh skipped: unconfigured"),
                    Err(e) => warn!("background token refresh failed: {}", e),
                }
            }
        })
    }

    // Caller holds refresh_lock.
    async fn exchange(&self, mut creds: Credentials) -> Result<Credentials, AuthError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", creds.refresh_token.as_str()),
        ];
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD.encode(format!("{}:{}", creds.client_id, creds.client_secret))
        );
        let url = format!("{}/api/token", self.auth_base);
        let resp = self
            .client
            .post(&url)
            .header(AUTHORIZATION, auth_header)
            .form(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!("token refresh rejected: {}", status);
            return Err(AuthError::Rejected { status: status.as_u16(), body });
        }
        let tr: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AuthError::Malformed(e.to_string()))?;
        let access_token = tr
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::Malformed("no access_token".into()))?;

        creds.access_token = access_token;
        if let Some(rt) = tr.refresh_token.filter(|t| !t.is_empty()) {
            creds.refresh_token = rt;
        }
        creds.expires_at = Some(Utc::now().timestamp() + tr.expires_in.unwrap_or(3600));

        let updated = creds.clone();
        if let Err(e) = self.store.update(move |c| {
            c.access_token = updated.access_token;
            c.refresh_token = updated.refresh_token;
            c.expires_at = updated.expires_at;
        })
        .await
        {
            warn!("refreshed token could not be persisted: {:#}", e);
        }
        info!("access token refreshed (expires_at {:?})", creds.expires_at);
        Ok(creds)
    }
}
