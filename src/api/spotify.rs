use super::auth::TokenRefresher;
use super::client::ApiClient;
use super::Provider;
use crate::config::Config;
use crate::error::ApiError;
use crate::models::{PlayerSnapshot, PlayerStateResponse, PlaylistSummary, RepeatMode};
use crate::util;
use async_trait::async_trait;
use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

/// Spotify provider backed by the Spotify Web API.
/// Endpoints come from `Config::api_base` / `Config::auth_base`, which default
/// to SPOTIFY_API_BASE and SPOTIFY_AUTH_BASE env vars when set (useful for tests).
pub struct SpotifyProvider {
    api: ApiClient,
    // unauthenticated client for artwork downloads
    http: Client,
}

impl SpotifyProvider {
    pub fn new(api: ApiClient, http: Client) -> Self {
        Self { api, http }
    }

    /// Build the whole stack (http client, refresher, api client) from config.
    pub fn from_config(cfg: &Config, store: Arc<crate::credentials::TokenStore>) -> anyhow::Result<(Self, Arc<TokenRefresher>)> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        let tokens = Arc::new(TokenRefresher::new(
            http.clone(),
            cfg.auth_base.clone(),
            store,
            cfg.token_expiry_margin_secs,
        ));
        let api = ApiClient::new(http.clone(), cfg.api_base.clone(), Arc::clone(&tokens));
        Ok((Self::new(api, http), tokens))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    fn name(&self) -> &str {
        "spotify"
    }

    fn is_authenticated(&self) -> bool {
        self.api.tokens().store().is_configured()
    }
}

#[derive(Deserialize)]
struct PlaylistPage {
    #[serde(default)]
    items: Vec<PlaylistSummary>,
}

#[async_trait]
impl Provider for SpotifyProvider {
    fn name(&self) -> &str {
        SpotifyProvider::name(self)
    }

    fn is_authenticated(&self) -> bool {
        SpotifyProvider::is_authenticated(self)
    }

    async fn player_state(&self) -> Result<PlayerSnapshot, ApiError> {
        // /me/player rather than /me/player/currently-playing: one call
        // carries device volume, shuffle and repeat as well.
        let resp = self.api.get("/me/player").await?;
        match resp.decode::<PlayerStateResponse>()? {
            None => {
                debug!("player state: nothing playing (no content)");
                Ok(PlayerSnapshot::idle())
            }
            Some(state) => Ok(state.into_snapshot()),
        }
    }

    async fn play(&self) -> Result<(), ApiError> {
        self.api.put("/me/player/play", None).await.map(|_| ())
    }

    async fn pause(&self) -> Result<(), ApiError> {
        self.api.put("/me/player/pause", None).await.map(|_| ())
    }

    async fn next_track(&self) -> Result<(), ApiError> {
        self.api.post("/me/player/next", None).await.map(|_| ())
    }

    async fn previous_track(&self) -> Result<(), ApiError> {
        self.api.post("/me/player/previous", None).await.map(|_| ())
    }

    async fn set_shuffle(&self, enabled: bool) -> Result<(), ApiError> {
        let endpoint = format!("/me/player/shuffle?state={}", enabled);
        self.api.put(&endpoint, None).await.map(|_| ())
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<(), ApiError> {
        let endpoint = format!("/me/player/repeat?state={}", urlencoding::encode(mode.as_str()));
        self.api.put(&endpoint, None).await.map(|_| ())
    }

    async fn set_volume(&self, percent: u8) -> Result<(), ApiError> {
        let endpoint = format!("/me/player/volume?volume_percent={}", percent.min(100));
        self.api.put(&endpoint, None).await.map(|_| ())
    }

    async fn save_track(&self, track_id: &str) -> Result<(), ApiError> {
        let body = json!({ "ids": [track_id] });
        self.api.put("/me/tracks", Some(&body)).await.map(|_| ())
    }

    async fn play_playlist(&self, playlist_id: &str) -> Result<(), ApiError> {
        let body = json!({ "context_uri": format!("spotify:playlist:{}", playlist_id) });
        info!("starting playlist {}", playlist_id);
        self.api.put("/me/player/play", Some(&body)).await.map(|_| ())
    }

    async fn fetch_artwork(&self, url: &str) -> Result<String, ApiError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::Remote { status: status.as_u16(), body: format!("artwork fetch {}", url) });
        }
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        debug!("artwork {} bytes from {}", bytes.len(), url);
        Ok(util::data_uri(content_type.as_deref(), &bytes))
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        let page = self.api.get("/me/playlists?limit=50").await?.decode::<PlaylistPage>()?;
        Ok(page.map(|p| p.items).unwrap_or_default())
    }
}
