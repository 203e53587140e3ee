pub mod auth;
pub mod client;
pub mod mock;
pub mod spotify;

use crate::error::ApiError;
use crate::models::{PlayerSnapshot, PlaylistSummary, RepeatMode};

/// Provider trait: the playback operations the cache and the widgets need.
/// Implementations: spotify::SpotifyProvider, mock::MockProvider.
#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Full player state in one round trip (track, device volume, shuffle, repeat).
    async fn player_state(&self) -> Result<PlayerSnapshot, ApiError>;

    async fn play(&self) -> Result<(), ApiError>;

    async fn pause(&self) -> Result<(), ApiError>;

    async fn next_track(&self) -> Result<(), ApiError>;

    async fn previous_track(&self) -> Result<(), ApiError>;

    async fn set_shuffle(&self, enabled: bool) -> Result<(), ApiError>;

    async fn set_repeat(&self, mode: RepeatMode) -> Result<(), ApiError>;

    /// Absolute device volume, 0..=100.
    async fn set_volume(&self, percent: u8) -> Result<(), ApiError>;

    /// Save a track (by id) to the user's library.
    async fn save_track(&self, track_id: &str) -> Result<(), ApiError>;

    /// Start playback of a playlist context.
    async fn play_playlist(&self, playlist_id: &str) -> Result<(), ApiError>;

    /// Download artwork and return it as an inline `data:` URI.
    async fn fetch_artwork(&self, url: &str) -> Result<String, ApiError>;

    /// The user's playlists. Default implementation returns none.
    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        Ok(Vec::new())
    }

        /// Return the provider's name (for logging, UI, etc)
        fn name(&self) -> &str;

        /// Return true if credentials are configured and remote calls may be attempted
        fn is_authenticated(&self) -> bool;
}
