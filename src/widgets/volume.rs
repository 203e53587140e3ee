//! Volume keys: relative up/down and an absolute "set to N%" preset.
//! Both show the current device volume from the shared cache.

use super::{lock_open, spawn_after, spawn_ticker, Registry, SlotRef, Widget, WidgetContext, WidgetKind, NOT_CONFIGURED};
use crate::models::PlayerSnapshot;
use crate::settings::ActionSettings;
use crate::util::{adjusted_volume, clamp_volume};
use async_trait::async_trait;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
enum Mode {
    Adjust { sign: i32 },
    Absolute,
}

#[derive(Debug, Default)]
pub struct VolumeState {
    // last title sent to the key
    face: Option<String>,
    // preset for set-volume keys
    target: Option<u8>,
}

struct VolumeKey {
    kind: WidgetKind,
    mode: Mode,
    ctx: WidgetContext,
    instances: Registry<VolumeState>,
}

impl VolumeKey {
    fn requested_volume(&self, settings: &ActionSettings, st: Option<&VolumeState>, current: Option<u8>) -> u8 {
        match self.mode {
            Mode::Adjust { sign } => {
                let step = settings.volume_step(self.ctx.defaults.volume_step);
                adjusted_volume(current, sign * step)
            }
            Mode::Absolute => {
                let fallback = st.and_then(|s| s.target).unwrap_or(self.ctx.defaults.target_volume);
                clamp_volume(settings.target_volume(fallback) as i32)
            }
        }
    }

    async fn visible(&self, id: &str, settings: &ActionSettings) {
        let target = matches!(self.mode, Mode::Absolute)
            .then(|| settings.target_volume(self.ctx.defaults.target_volume));
        let slot = self.instances.insert(id, VolumeState { face: None, target }).await;
        if let Some(mut guard) = lock_open(&slot).await {
            render_with(self.mode, &self.ctx, id, &mut guard.state).await;
        }
        let (mode, ctx, sid, s) = (self.mode, self.ctx.clone(), id.to_string(), slot.clone());
        let ticker = spawn_ticker(self.ctx.timings.passive_refresh, move || {
            let (ctx, id, slot) = (ctx.clone(), sid.clone(), s.clone());
            async move {
                if let Some(mut guard) = lock_open(&slot).await {
                    render_with(mode, &ctx, &id, &mut guard.state).await;
                }
            }
        });
        self.instances.attach(id, &slot, ticker);
    }

    async fn key_press(&self, id: &str, settings: &ActionSettings) {
        let slot = self.instances.get(id);
        if !self.ctx.is_configured() {
            warn!("{} {}: credentials not configured", self.kind, id);
            self.ctx.alert(id).await;
            return;
        }

        let current = self.ctx.snapshot().await.and_then(|s| s.volume_percent);
        let requested = match &slot {
            Some(slot) => match lock_open(slot).await {
                Some(mut guard) => {
                    let v = self.requested_volume(settings, Some(&guard.state), current);
                    if matches!(self.mode, Mode::Absolute) {
                        guard.state.target = Some(v);
                    }
                    v
                }
                None => self.requested_volume(settings, None, current),
            },
            None => self.requested_volume(settings, None, current),
        };

        match self.ctx.provider.set_volume(requested).await {
            Ok(()) => {
                info!("{} {}: volume {:?} -> {}", self.kind, id, current, requested);
                self.ctx.ok(id).await;
                self.settle(id, slot);
            }
            Err(e) => {
                warn!("{} {}: set volume failed: {}", self.kind, id, e);
                self.ctx.alert(id).await;
            }
        }
    }

    fn settle(&self, id: &str, slot: Option<SlotRef<VolumeState>>) {
        let Some(slot) = slot else {
            self.ctx.cache.refresh_after(self.ctx.timings.settle_delay);
            return;
        };
        let (mode, ctx, sid, s) = (self.mode, self.ctx.clone(), id.to_string(), slot.clone());
        let handle = spawn_after(self.ctx.timings.settle_delay, async move {
            ctx.cache.refresh_now().await;
            if let Some(mut guard) = lock_open(&s).await {
                render_with(mode, &ctx, &sid, &mut guard.state).await;
            }
        });
        self.instances.attach(id, &slot, handle);
    }
}

async fn render_with(mode: Mode, ctx: &WidgetContext, id: &str, st: &mut VolumeState) {
    let text = if !ctx.is_configured() {
        NOT_CONFIGURED.to_string()
    } else {
        match ctx.snapshot().await {
            Some(snapshot) => face_text(mode, ctx.defaults.target_volume, st, &snapshot),
            // keep the last good face
            None => return,
        }
    };
    if st.face.as_deref() != Some(text.as_str()) {
        ctx.title(id, &text).await;
        st.face = Some(text);
    }
}

fn face_text(mode: Mode, target_default: u8, st: &VolumeState, snapshot: &PlayerSnapshot) -> String {
    let current = snapshot.volume_percent;
    match mode {
        Mode::Adjust { .. } => match current {
            Some(v) => format!("{}%", v),
            None => "--".to_string(),
        },
        Mode::Absolute => {
            let target = st.target.unwrap_or(target_default);
            match current {
                Some(v) => format!("→{}%\n({}%)", target, v),
                None => format!("→{}%", target),
            }
        }
    }
}

/// volume-up / volume-down: step the current volume by `volumeStep`.
pub struct VolumeAdjust(VolumeKey);

impl VolumeAdjust {
    pub fn up(ctx: WidgetContext) -> Self {
        Self::with_sign(WidgetKind::VolumeUp, 1, ctx)
    }

    pub fn down(ctx: WidgetContext) -> Self {
        Self::with_sign(WidgetKind::VolumeDown, -1, ctx)
    }

    fn with_sign(kind: WidgetKind, sign: i32, ctx: WidgetContext) -> Self {
        Self(VolumeKey { kind, mode: Mode::Adjust { sign }, ctx, instances: Registry::new() })
    }

    pub fn instances(&self) -> &Registry<VolumeState> {
        &self.0.instances
    }
}

#[async_trait]
impl Widget for VolumeAdjust {
    fn kind(&self) -> WidgetKind {
        self.0.kind
    }

    async fn on_visible(&self, id: &str, settings: &ActionSettings) {
        self.0.visible(id, settings).await
    }

    async fn on_hidden(&self, id: &str) {
        self.0.instances.remove(id).await;
    }

    async fn on_key_press(&self, id: &str, settings: &ActionSettings) {
        self.0.key_press(id, settings).await
    }
}

/// set-volume: jump to `targetVolume`.
pub struct SetVolume(VolumeKey);

impl SetVolume {
    pub fn new(ctx: WidgetContext) -> Self {
        Self(VolumeKey { kind: WidgetKind::SetVolume, mode: Mode::Absolute, ctx, instances: Registry::new() })
    }

    pub fn instances(&self) -> &Registry<VolumeState> {
        &self.0.instances
    }
}

#[async_trait]
impl Widget for SetVolume {
    fn kind(&self) -> WidgetKind {
        WidgetKind::SetVolume
    }

    async fn on_visible(&self, id: &str, settings: &ActionSettings) {
        self.0.visible(id, settings).await
    }

    async fn on_hidden(&self, id: &str) {
        self.0.instances.remove(id).await;
    }

    async fn on_key_press(&self, id: &str, settings: &ActionSettings) {
        self.0.key_press(id, settings).await
    }
}
