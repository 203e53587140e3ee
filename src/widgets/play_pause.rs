use super::{lock_open, spawn_after, spawn_ticker, Registry, SlotRef, Widget, WidgetContext, WidgetKind, NOT_CONFIGURED};
use crate::settings::ActionSettings;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Key state index: 0 shows the play icon, 1 the pause icon.
pub const STATE_PAUSED: u8 = 0;
pub const STATE_PLAYING: u8 = 1;

#[derive(Debug, Default)]
pub struct PlayPauseState {
    not_configured_shown: bool,
    last_state: Option<u8>,
}

pub struct PlayPause {
    ctx: WidgetContext,
    instances: Registry<PlayPauseState>,
}

impl PlayPause {
    pub fn new(ctx: WidgetContext) -> Self {
        Self { ctx, instances: Registry::new() }
    }

    pub fn instances(&self) -> &Registry<PlayPauseState> {
        &self.instances
    }

    /// Render from the cache. Without a snapshot the last good face stays.
    async fn render(ctx: &WidgetContext, id: &str, st: &mut PlayPauseState) {
        if !ctx.is_configured() {
            if !st.not_configured_shown {
                ctx.title(id, NOT_CONFIGURED).await;
                ctx.state(id, STATE_PAUSED).await;
                st.not_configured_shown = true;
                st.last_state = Some(STATE_PAUSED);
            }
            return;
        }
        let Some(snapshot) = ctx.snapshot().await else {
            debug!("{}: no player state yet, keeping face", id);
            return;
        };
        if st.not_configured_shown {
            ctx.title(id, "").await;
            st.not_configured_shown = false;
        }
        let state = if snapshot.is_playing { STATE_PLAYING } else { STATE_PAUSED };
        // the device flips the state on press by itself, so always re-assert
        ctx.state(id, state).await;
        st.last_state = Some(state);
    }

    fn settle(&self, id: &str, slot: Option<SlotRef<PlayPauseState>>) {
        let ctx = self.ctx.clone();
        let Some(slot) = slot else {
            self.ctx.cache.refresh_after(self.ctx.timings.settle_delay);
            return;
        };
        let (sid, s) = (id.to_string(), slot.clone());
        let handle = spawn_after(self.ctx.timings.settle_delay, async move {
            ctx.cache.refresh_now().await;
            if let Some(mut guard) = lock_open(&s).await {
                Self::render(&ctx, &sid, &mut guard.state).await;
            }
        });
        self.instances.attach(id, &slot, handle);
    }
}

#[async_trait]
impl Widget for PlayPause {
    fn kind(&self) -> WidgetKind {
        WidgetKind::PlayPause
    }

    async fn on_visible(&self, id: &str, _settings: &ActionSettings) {
        let slot = self.instances.insert(id, PlayPauseState::default()).await;
        if let Some(mut guard) = lock_open(&slot).await {
            Self::render(&self.ctx, id, &mut guard.state).await;
        }
        let (ctx, sid, s) = (self.ctx.clone(), id.to_string(), slot.clone());
        let ticker = spawn_ticker(self.ctx.timings.passive_refresh, move || {
            let (ctx, id, slot) = (ctx.clone(), sid.clone(), s.clone());
            async move {
                if let Some(mut guard) = lock_open(&slot).await {
                    Self::render(&ctx, &id, &mut guard.state).await;
                }
            }
        });
        self.instances.attach(id, &slot, ticker);
    }

    async fn on_hidden(&self, id: &str) {
        self.instances.remove(id).await;
    }

    async fn on_key_press(&self, id: &str, _settings: &ActionSettings) {
        let slot = self.instances.get(id);
        if !self.ctx.is_configured() {
            self.ctx.alert(id).await;
            if let Some(slot) = &slot {
                if let Some(mut guard) = lock_open(slot).await {
                    Self::render(&self.ctx, id, &mut guard.state).await;
                }
            }
            return;
        }

        let playing = self.ctx.snapshot().await.map(|s| s.is_playing).unwrap_or(false);
        let result = if playing {
            self.ctx.provider.pause().await
        } else {
            self.ctx.provider.play().await
        };
        match result {
            Ok(()) => {
                info!("{}: {}", id, if playing { "paused" } else { "playing" });
                self.ctx.ok(id).await;
                self.settle(id, slot);
            }
            Err(e) => {
                warn!("{}: toggle playback failed: {}", id, e);
                self.ctx.alert(id).await;
            }
        }
    }
}
