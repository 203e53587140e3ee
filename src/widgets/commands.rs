use super::{lock_open, spawn_ticker, Registry, Widget, WidgetContext, WidgetKind, NOT_CONFIGURED};
use crate::models::RepeatMode;
use crate::settings::ActionSettings;
use crate::util::extract_playlist_id;
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Kinds served by [`CommandWidget`].
pub const KINDS: [WidgetKind; 6] = [
    WidgetKind::Next,
    WidgetKind::Previous,
    WidgetKind::Shuffle,
    WidgetKind::Repeat,
    WidgetKind::Like,
    WidgetKind::PlayPlaylist,
];

#[derive(Debug, Default)]
pub struct CommandState {
    not_configured_shown: bool,
}

/// One-shot keys: a press issues a single call and flashes the result.
/// Nothing is polled; decisions that need current state (shuffle toggle,
/// repeat cycle, which track to like) read the shared snapshot. The only
/// timer is the passive face check that swaps the "not configured" face
/// out once credentials show up.
pub struct CommandWidget {
    kind: WidgetKind,
    ctx: WidgetContext,
    instances: Registry<CommandState>,
}

impl CommandWidget {
    pub fn new(kind: WidgetKind, ctx: WidgetContext) -> Self {
        Self { kind, ctx, instances: Registry::new() }
    }

    pub fn instances(&self) -> &Registry<CommandState> {
        &self.instances
    }

    async fn render(ctx: &WidgetContext, id: &str, st: &mut CommandState) {
        let configured = ctx.is_configured();
        if !configured && !st.not_configured_shown {
            ctx.title(id, NOT_CONFIGURED).await;
            st.not_configured_shown = true;
        } else if configured && st.not_configured_shown {
            debug!("{}: credentials available, clearing face", id);
            ctx.title(id, "").await;
            st.not_configured_shown = false;
        }
    }

    /// Run the command. Returns a short description for the log.
    async fn execute(&self, settings: &ActionSettings) -> Result<String> {
        let provider = &self.ctx.provider;
        match self.kind {
            WidgetKind::Next => {
                provider.next_track().await?;
                Ok("skipped to next track".into())
            }
            WidgetKind::Previous => {
                provider.previous_track().await?;
                Ok("back to previous track".into())
            }
            WidgetKind::Shuffle => {
                let current = self.ctx.snapshot().await.map(|s| s.shuffle).unwrap_or(false);
                provider.set_shuffle(!current).await?;
                Ok(format!("shuffle {}", if current { "off" } else { "on" }))
            }
            WidgetKind::Repeat => {
                let mode = match settings.repeat_mode() {
                    Some(fixed) => fixed,
                    None => {
                        let current = self.ctx.snapshot().await.map(|s| s.repeat).unwrap_or(RepeatMode::Off);
                        current.next()
                    }
                };
                provider.set_repeat(mode).await?;
                Ok(format!("repeat {}", mode))
            }
            WidgetKind::Like => {
                let snapshot = self.ctx.snapshot().await.ok_or_else(|| anyhow!("player state unavailable"))?;
                let Some(track) = snapshot.track.as_ref() else {
                    bail!("nothing playing to save");
                };
                let id = track.track_id().ok_or_else(|| anyhow!("'{}' is not a track", track.uri))?;
                provider.save_track(id).await?;
                Ok(format!("saved {}", track.name))
            }
            WidgetKind::PlayPlaylist => {
                let raw = settings.playlist().ok_or_else(|| anyhow!("no playlist configured"))?;
                let id = extract_playlist_id(raw).ok_or_else(|| anyhow!("unrecognized playlist '{}'", raw))?;
                provider.play_playlist(&id).await?;
                Ok(format!("playing playlist {}", id))
            }
            other => bail!("{} is not a command key", other),
        }
    }
}

#[async_trait]
impl Widget for CommandWidget {
    fn kind(&self) -> WidgetKind {
        self.kind
    }

    async fn on_visible(&self, id: &str, _settings: &ActionSettings) {
        let slot = self.instances.insert(id, CommandState::default()).await;
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

    async fn on_key_press(&self, id: &str, settings: &ActionSettings) {
        if !self.ctx.is_configured() {
            warn!("{} {}: credentials not configured", self.kind, id);
            self.ctx.alert(id).await;
            return;
        }
        if let Some(slot) = self.instances.get(id) {
            if let Some(mut guard) = lock_open(&slot).await {
                Self::render(&self.ctx, id, &mut guard.state).await;
            }
        }

        match self.execute(settings).await {
            Ok(what) => {
                info!("{} {}: {}", self.kind, id, what);
                self.ctx.ok(id).await;
                self.ctx.cache.refresh_after(self.ctx.timings.settle_delay);
            }
            Err(e) => {
                warn!("{} {}: {:#}", self.kind, id, e);
                self.ctx.alert(id).await;
            }
        }
    }
}
