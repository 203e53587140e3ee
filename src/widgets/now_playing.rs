//! Now-playing key: album artwork with a scrolling "artist - title" line.
//!
//! Two timers per instance. The slow one checks the shared snapshot for a
//! track change and swaps artwork; the fast one only scrolls the marquee.
//! Both run as critical sections over the instance state.

use super::{lock_open, spawn_ticker, Registry, SlotRef, Widget, WidgetContext, WidgetKind, NOT_CONFIGURED};
use crate::marquee::Marquee;
use crate::models::TrackInfo;
use crate::settings::ActionSettings;
use async_trait::async_trait;
use tracing::{debug, info, warn};

pub const NO_TRACK: &str = "No Track\nPlaying";
pub const ERROR: &str = "Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Face {
    #[default]
    Blank,
    NotConfigured,
    Error,
    NoTrack,
    Track,
}

#[derive(Default)]
pub struct NowPlayingState {
    face: Face,
    track_uri: Option<String>,
    artwork_url: Option<String>,
    marquee: Marquee,
    // last title sent to the key
    title: String,
}

pub struct NowPlaying {
    ctx: WidgetContext,
    instances: Registry<NowPlayingState>,
}

impl NowPlaying {
    pub fn new(ctx: WidgetContext) -> Self {
        Self { ctx, instances: Registry::new() }
    }

    pub fn instances(&self) -> &Registry<NowPlayingState> {
        &self.instances
    }

    async fn set_title(ctx: &WidgetContext, id: &str, st: &mut NowPlayingState, text: &str) {
        if st.title != text {
            ctx.title(id, text).await;
            st.title = text.to_string();
        }
    }

    /// Slow tick: compare the shared snapshot against what is on the key.
    async fn check(ctx: &WidgetContext, id: &str, st: &mut NowPlayingState) {
        if !ctx.is_configured() {
            if st.face != Face::NotConfigured {
                Self::set_title(ctx, id, st, NOT_CONFIGURED).await;
                ctx.image(id, "").await;
            }
            Self::forget_track(st, Face::NotConfigured);
            return;
        }

        let Some(snapshot) = ctx.snapshot().await else {
            if st.face != Face::Error {
                Self::set_title(ctx, id, st, ERROR).await;
                ctx.image(id, "").await;
            }
            Self::forget_track(st, Face::Error);
            return;
        };

        let Some(track) = snapshot.track.as_ref() else {
            if st.face != Face::NoTrack {
                Self::set_title(ctx, id, st, NO_TRACK).await;
                ctx.image(id, "").await;
            }
            Self::forget_track(st, Face::NoTrack);
            return;
        };

        if st.track_uri.as_deref() != Some(track.uri.as_str()) {
            Self::show_new_track(ctx, id, st, track).await;
        } else if track.artwork_url.is_some() && track.artwork_url != st.artwork_url {
            debug!("{}: artwork changed for {}", id, track.uri);
            if let Some(url) = track.artwork_url.as_deref() {
                match ctx.provider.fetch_artwork(url).await {
                    Ok(image) => {
                        ctx.image(id, &image).await;
                        st.artwork_url = track.artwork_url.clone();
                    }
                    Err(e) => warn!("{}: artwork update failed: {}", id, e),
                }
            }
        }
    }

    async fn show_new_track(ctx: &WidgetContext, id: &str, st: &mut NowPlayingState, track: &TrackInfo) {
        info!("{}: new track {} ({})", id, track.name, track.uri);
        // blank title first so old text never sits on new artwork
        Self::set_title(ctx, id, st, "").await;
        match track.artwork_url.as_deref() {
            Some(url) => match ctx.provider.fetch_artwork(url).await {
                Ok(image) => ctx.image(id, &image).await,
                Err(e) => {
                    warn!("{}: artwork fetch failed: {}", id, e);
                    ctx.image(id, "").await;
                }
            },
            None => ctx.image(id, "").await,
        }

        st.face = Face::Track;
        st.track_uri = Some(track.uri.clone());
        st.artwork_url = track.artwork_url.clone();
        st.marquee = Marquee::new(&track.marquee_text());
        let frame = st.marquee.advance();
        Self::set_title(ctx, id, st, &frame).await;
    }

    /// Fast tick: next marquee frame.
    async fn scroll(ctx: &WidgetContext, id: &str, st: &mut NowPlayingState) {
        if st.face != Face::Track || !st.marquee.is_scrolling() {
            return;
        }
        let frame = st.marquee.advance();
        Self::set_title(ctx, id, st, &frame).await;
    }

    fn forget_track(st: &mut NowPlayingState, face: Face) {
        st.face = face;
        st.track_uri = None;
        st.artwork_url = None;
        st.marquee = Marquee::default();
    }

    fn start_timers(&self, id: &str, slot: &SlotRef<NowPlayingState>) {
        let (ctx, sid, s) = (self.ctx.clone(), id.to_string(), slot.clone());
        let slow = spawn_ticker(self.ctx.timings.track_check, move || {
            let (ctx, id, slot) = (ctx.clone(), sid.clone(), s.clone());
            async move {
                if let Some(mut guard) = lock_open(&slot).await {
                    Self::check(&ctx, &id, &mut guard.state).await;
                }
            }
        });
        self.instances.attach(id, slot, slow);

        let (ctx, sid, s) = (self.ctx.clone(), id.to_string(), slot.clone());
        let fast = spawn_ticker(self.ctx.timings.marquee_tick, move || {
            let (ctx, id, slot) = (ctx.clone(), sid.clone(), s.clone());
            async move {
                if let Some(mut guard) = lock_open(&slot).await {
                    Self::scroll(&ctx, &id, &mut guard.state).await;
                }
            }
        });
        self.instances.attach(id, slot, fast);
    }
}

#[async_trait]
impl Widget for NowPlaying {
    fn kind(&self) -> WidgetKind {
        WidgetKind::NowPlaying
    }

    async fn on_visible(&self, id: &str, _settings: &ActionSettings) {
        let slot = self.instances.insert(id, NowPlayingState::default()).await;
        if let Some(mut guard) = lock_open(&slot).await {
            Self::check(&self.ctx, id, &mut guard.state).await;
        }
        self.start_timers(id, &slot);
    }

    async fn on_hidden(&self, id: &str) {
        if self.instances.remove(id).await {
            debug!("now-playing {} torn down", id);
        }
    }

    async fn on_key_press(&self, id: &str, _settings: &ActionSettings) {
        // press forces an immediate re-check
        self.ctx.cache.refresh_now().await;
        if let Some(slot) = self.instances.get(id) {
            if let Some(mut guard) = lock_open(&slot).await {
                Self::check(&self.ctx, id, &mut guard.state).await;
            }
        }
    }
}
