//! Key widgets and the per-instance registry they share.
//!
//! A widget type is one long-lived controller; each visible key is an
//! instance in that controller's [`Registry`], owning its render state and
//! timers. Removing an instance aborts its timers and marks its state
//! closed under the instance lock, so a timer body that was already waiting
//! on the lock sees the flag and returns without touching the face.

pub mod commands;
pub mod now_playing;
pub mod play_pause;
pub mod volume;

use crate::api::Provider;
use crate::config::{Timings, WidgetDefaults};
use crate::models::PlayerSnapshot;
use crate::player_state::PlayerStateCache;
use crate::settings::ActionSettings;
use crate::util::lock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::warn;

pub const NOT_CONFIGURED: &str = "Not\nConfigured";

/// Output side of the device transport.
#[async_trait]
pub trait Surface: Send + Sync {
    async fn set_title(&self, id: &str, title: &str) -> anyhow::Result<()>;

    /// `image` is a `data:` URI, or empty to clear.
    async fn set_image(&self, id: &str, image: &str) -> anyhow::Result<()>;

    async fn set_state(&self, id: &str, state: u8) -> anyhow::Result<()>;

    /// Transient success indicator.
    async fn show_ok(&self, id: &str) -> anyhow::Result<()>;

    /// Transient failure indicator.
    async fn show_alert(&self, id: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WidgetKind {
    NowPlaying,
    PlayPause,
    Next,
    Previous,
    Shuffle,
    Repeat,
    Like,
    PlayPlaylist,
    VolumeUp,
    VolumeDown,
    SetVolume,
}

impl WidgetKind {
    pub const ALL: [WidgetKind; 11] = [
        WidgetKind::NowPlaying,
        WidgetKind::PlayPause,
        WidgetKind::Next,
        WidgetKind::Previous,
        WidgetKind::Shuffle,
        WidgetKind::Repeat,
        WidgetKind::Like,
        WidgetKind::PlayPlaylist,
        WidgetKind::VolumeUp,
        WidgetKind::VolumeDown,
        WidgetKind::SetVolume,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::NowPlaying => "now-playing",
            WidgetKind::PlayPause => "play-pause",
            WidgetKind::Next => "next",
            WidgetKind::Previous => "previous",
            WidgetKind::Shuffle => "shuffle",
            WidgetKind::Repeat => "repeat",
            WidgetKind::Like => "like",
            WidgetKind::PlayPlaylist => "play-playlist",
            WidgetKind::VolumeUp => "volume-up",
            WidgetKind::VolumeDown => "volume-down",
            WidgetKind::SetVolume => "set-volume",
        }
    }
}

impl fmt::Display for WidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One widget type. Errors never escape these hooks; they end up as a
/// face or an alert on the key.
#[async_trait]
pub trait Widget: Send + Sync {
    fn kind(&self) -> WidgetKind;

    async fn on_visible(&self, id: &str, settings: &ActionSettings);

    async fn on_hidden(&self, id: &str);

    async fn on_key_press(&self, id: &str, settings: &ActionSettings);
}

/// Everything a widget needs from the rest of the process.
#[derive(Clone)]
pub struct WidgetContext {
    pub provider: Arc<dyn Provider>,
    pub cache: Arc<PlayerStateCache>,
    pub surface: Arc<dyn Surface>,
    pub timings: Timings,
    pub defaults: WidgetDefaults,
}

impl WidgetContext {
    pub fn is_configured(&self) -> bool {
        self.provider.is_authenticated()
    }

    pub async fn snapshot(&self) -> Option<Arc<PlayerSnapshot>> {
        self.cache.get_snapshot(self.timings.snapshot_max_age).await
    }

    // Surface failures are logged and dropped: a face that failed to update
    // is refreshed by the next render anyway.

    pub async fn title(&self, id: &str, text: &str) {
        if let Err(e) = self.surface.set_title(id, text).await {
            warn!("set_title failed for {}: {}", id, e);
        }
    }

    pub async fn image(&self, id: &str, image: &str) {
        if let Err(e) = self.surface.set_image(id, image).await {
            warn!("set_image failed for {}: {}", id, e);
        }
    }

    pub async fn state(&self, id: &str, state: u8) {
        if let Err(e) = self.surface.set_state(id, state).await {
            warn!("set_state failed for {}: {}", id, e);
        }
    }

    pub async fn ok(&self, id: &str) {
        if let Err(e) = self.surface.show_ok(id).await {
            warn!("show_ok failed for {}: {}", id, e);
        }
    }

    pub async fn alert(&self, id: &str) {
        if let Err(e) = self.surface.show_alert(id).await {
            warn!("show_alert failed for {}: {}", id, e);
        }
    }
}

pub struct Slot<S> {
    closed: bool,
    pub state: S,
}

pub type SlotRef<S> = Arc<tokio::sync::Mutex<Slot<S>>>;

/// Lock an instance's state; `None` once the instance is torn down.
pub async fn lock_open<S>(slot: &SlotRef<S>) -> Option<tokio::sync::MutexGuard<'_, Slot<S>>> {
    let guard = slot.lock().await;
    if guard.closed {
        None
    } else {
        Some(guard)
    }
}

struct Instance<S> {
    slot: SlotRef<S>,
    timers: Vec<JoinHandle<()>>,
}

/// Live instances of one widget type, keyed by instance id.
pub struct Registry<S> {
    instances: Mutex<HashMap<String, Instance<S>>>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self { instances: Mutex::new(HashMap::new()) }
    }
}

impl<S: Send + 'static> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh instance. An existing instance with the same id is
    /// torn down first.
    pub async fn insert(&self, id: &str, state: S) -> SlotRef<S> {
        let slot = Arc::new(tokio::sync::Mutex::new(Slot { closed: false, state }));
        let previous = lock(&self.instances).insert(
            id.to_string(),
            Instance { slot: Arc::clone(&slot), timers: Vec::new() },
        );
        if let Some(prev) = previous {
            teardown(prev).await;
        }
        slot
    }

    /// Hand a timer to the instance that owns `slot`. If that instance is
    /// already gone (or replaced) the timer is aborted on the spot.
    pub fn attach(&self, id: &str, slot: &SlotRef<S>, handle: JoinHandle<()>) {
        let mut map = lock(&self.instances);
        match map.get_mut(id) {
            Some(inst) if Arc::ptr_eq(&inst.slot, slot) => {
                inst.timers.retain(|h| !h.is_finished());
                inst.timers.push(handle);
            }
            _ => handle.abort(),
        }
    }

    /// Tear down an instance. Returns false if it was not registered.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = lock(&self.instances).remove(id);
        match removed {
            Some(inst) => {
                teardown(inst).await;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<SlotRef<S>> {
        lock(&self.instances).get(id).map(|i| Arc::clone(&i.slot))
    }

    pub fn len(&self) -> usize {
        lock(&self.instances).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timers still attached to an instance.
    pub fn timer_count(&self, id: &str) -> usize {
        lock(&self.instances)
            .get(id)
            .map(|i| i.timers.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }
}

async fn teardown<S>(inst: Instance<S>) {
    for handle in &inst.timers {
        handle.abort();
    }
    inst.slot.lock().await.closed = true;
}

/// Run `f` every `period`, first after one full period.
pub fn spawn_ticker<F, Fut>(period: Duration, mut f: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            f().await;
        }
    })
}

pub fn spawn_after<Fut>(delay: Duration, fut: Fut) -> JoinHandle<()>
where
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        fut.await;
    })
}

/// Every widget type, ready for the dispatcher.
pub fn all(ctx: &WidgetContext) -> Vec<Arc<dyn Widget>> {
    let mut widgets: Vec<Arc<dyn Widget>> = vec![
        Arc::new(now_playing::NowPlaying::new(ctx.clone())),
        Arc::new(play_pause::PlayPause::new(ctx.clone())),
        Arc::new(volume::VolumeAdjust::up(ctx.clone())),
        Arc::new(volume::VolumeAdjust::down(ctx.clone())),
        Arc::new(volume::SetVolume::new(ctx.clone())),
    ];
    for kind in commands::KINDS {
        widgets.push(Arc::new(commands::CommandWidget::new(kind, ctx.clone())));
    }
    widgets
}
