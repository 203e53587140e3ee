use super::Provider;
use crate::error::{ApiError, AuthError};
use crate::models::{PlayerSnapshot, PlaylistSummary, RepeatMode, TrackInfo};
use crate::util::lock;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// An in-memory player used by `run --mock` and in tests.
/// Mutations change its state the way the real service would and every call
/// is recorded as "op" or "op:arg".
pub struct MockProvider {
    state: Mutex<PlayerSnapshot>,
    calls: Mutex<Vec<String>>,
    authenticated: AtomicBool,
    failing: AtomicBool,
    rate_limited: Mutex<Option<u64>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    player_state_calls: AtomicUsize,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockProvider {
    pub fn new() -> Self {
        Self::with_state(PlayerSnapshot::idle())
    }

    pub fn with_state(state: PlayerSnapshot) -> Self {
        Self {
            state: Mutex::new(state),
            calls: Mutex::new(Vec::new()),
            authenticated: AtomicBool::new(true),
            failing: AtomicBool::new(false),
            rate_limited: Mutex::new(None),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            player_state_calls: AtomicUsize::new(0),
        }
    }

    /// A small demo library so `run --mock` has something to show.
    pub fn demo() -> Self {
        Self::with_state(PlayerSnapshot {
            is_playing: true,
            track: Some(demo_track("Windowlicker", "Aphex Twin", "spotify:track:demo0001")),
            volume_percent: Some(40),
            shuffle: false,
            repeat: RepeatMode::Off,
        })
    }

    pub fn set_state(&self, state: PlayerSnapshot) {
        *lock(&self.state) = state;
    }

    pub fn state(&self) -> PlayerSnapshot {
        lock(&self.state).clone()
    }

    pub fn set_authenticated(&self, yes: bool) {
        self.authenticated.store(yes, Ordering::SeqCst);
    }

    /// While set, every call fails with a remote 502.
    pub fn set_failing(&self, yes: bool) {
        self.failing.store(yes, Ordering::SeqCst);
    }

    /// While `Some(secs)`, every call answers 429 with that Retry-After.
    pub fn set_rate_limited(&self, retry_after: Option<u64>) {
        *lock(&self.rate_limited) = retry_after;
    }

    /// Artificial latency applied to every call.
    pub fn set_latency(&self, latency: Duration) {
        *lock(&self.latency) = latency;
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn player_state_calls(&self) -> usize {
        self.player_state_calls.load(Ordering::SeqCst)
    }

    /// Highest number of overlapping calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn enter(&self, op: String) -> Result<InFlight<'_>, ApiError> {
        lock(&self.calls).push(op);
        if !self.authenticated.load(Ordering::SeqCst) {
            return Err(ApiError::Auth(AuthError::Unconfigured));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let guard = InFlight(&self.in_flight);
        let latency = *lock(&self.latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(ApiError::Remote { status: 502, body: "mock failure".into() });
        }
        if let Some(secs) = *lock(&self.rate_limited) {
            return Err(ApiError::RateLimited { retry_after: Some(secs) });
        }
        Ok(guard)
    }

    fn mutate(&self, f: impl FnOnce(&mut PlayerSnapshot)) {
        f(&mut *lock(&self.state));
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub fn demo_track(name: &str, artist: &str, uri: &str) -> TrackInfo {
    TrackInfo {
        name: name.into(),
        artists: vec![artist.into()],
        album: "Mock Album".into(),
        artwork_url: Some(format!("mock://art/{}", uri)),
        uri: uri.into(),
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    async fn player_state(&self) -> Result<PlayerSnapshot, ApiError> {
        self.player_state_calls.fetch_add(1, Ordering::SeqCst);
        let _g = self.enter("player_state".into()).await?;
        Ok(self.state())
    }

    async fn play(&self) -> Result<(), ApiError> {
        let _g = self.enter("play".into()).await?;
        self.mutate(|s| s.is_playing = s.track.is_some());
        Ok(())
    }

    async fn pause(&self) -> Result<(), ApiError> {
        let _g = self.enter("pause".into()).await?;
        self.mutate(|s| s.is_playing = false);
        Ok(())
    }

    async fn next_track(&self) -> Result<(), ApiError> {
        let _g = self.enter("next".into()).await?;
        info!("MockProvider: next track");
        self.mutate(|s| {
            let n = s.track.as_ref().map(|t| t.uri.len()).unwrap_or(0);
            s.track = Some(demo_track("Next Song", "Mock Artist", &format!("spotify:track:next{}", n)));
        });
        Ok(())
    }

    async fn previous_track(&self) -> Result<(), ApiError> {
        let _g = self.enter("previous".into()).await?;
        Ok(())
    }

    async fn set_shuffle(&self, enabled: bool) -> Result<(), ApiError> {
        let _g = self.enter(format!("set_shuffle:{}", enabled)).await?;
        self.mutate(|s| s.shuffle = enabled);
        Ok(())
    }

    async fn set_repeat(&self, mode: RepeatMode) -> Result<(), ApiError> {
        let _g = self.enter(format!("set_repeat:{}", mode)).await?;
        self.mutate(|s| s.repeat = mode);
        Ok(())
    }

    async fn set_volume(&self, percent: u8) -> Result<(), ApiError> {
        let _g = self.enter(format!("set_volume:{}", percent)).await?;
        self.mutate(|s| s.volume_percent = Some(percent.min(100)));
        Ok(())
    }

    async fn save_track(&self, track_id: &str) -> Result<(), ApiError> {
        let _g = self.enter(format!("save_track:{}", track_id)).await?;
        Ok(())
    }

    async fn play_playlist(&self, playlist_id: &str) -> Result<(), ApiError> {
        let _g = self.enter(format!("play_playlist:{}", playlist_id)).await?;
        self.mutate(|s| {
            s.is_playing = true;
            s.track = Some(demo_track("Playlist Opener", "Mock Artist", &format!("spotify:track:{}", playlist_id)));
        });
        Ok(())
    }

    async fn fetch_artwork(&self, url: &str) -> Result<String, ApiError> {
        let _g = self.enter(format!("fetch_artwork:{}", url)).await?;
        Ok(crate::util::data_uri(Some("image/png"), url.as_bytes()))
    }

    async fn user_playlists(&self) -> Result<Vec<PlaylistSummary>, ApiError> {
        let _g = self.enter("user_playlists".into()).await?;
        Ok(vec![PlaylistSummary {
            id: "mockplaylist".into(),
            name: "Mock Mix".into(),
            uri: "spotify:playlist:mockplaylist".into(),
        }])
    }
}
