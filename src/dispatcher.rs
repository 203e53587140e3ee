use crate::credentials::{Credentials, TokenStore};
use crate::player_state::PlayerStateCache;
use crate::settings::ActionSettings;
use crate::util::lock;
use crate::widgets::{self, Widget, WidgetContext, WidgetKind};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// Events delivered by the device transport, one JSON object per line.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DeviceEvent {
    Visible {
        #[serde(default = "new_instance_id")]
        id: String,
        kind: WidgetKind,
        #[serde(default)]
        settings: ActionSettings,
    },
    Hidden {
        id: String,
    },
    KeyPress {
        id: String,
        #[serde(default)]
        settings: ActionSettings,
    },
    GlobalSettings {
        credentials: Credentials,
    },
}

fn new_instance_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

impl DeviceEvent {
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line.trim()).with_context(|| format!("invalid device event: {}", line.trim()))
    }
}

/// Routes device events to the widget type owning the instance and keeps
/// the set of visible instances.
pub struct CommandDispatcher {
    widgets: HashMap<WidgetKind, Arc<dyn Widget>>,
    visible: Mutex<HashMap<String, WidgetKind>>,
    cache: Arc<PlayerStateCache>,
    store: Arc<TokenStore>,
}

impl CommandDispatcher {
    pub fn new(ctx: &WidgetContext, store: Arc<TokenStore>) -> Self {
        let widgets = widgets::all(ctx).into_iter().map(|w| (w.kind(), w)).collect();
        Self {
            widgets,
            visible: Mutex::new(HashMap::new()),
            cache: Arc::clone(&ctx.cache),
            store,
        }
    }

    pub async fn dispatch(&self, event: DeviceEvent) -> Result<()> {
        match event {
            DeviceEvent::Visible { id, kind, settings } => {
                let widget = self.widget(kind)?;
                let previous = lock(&self.visible).insert(id.clone(), kind);
                if let Some(old) = previous.filter(|old| *old != kind) {
                    // same key re-bound to a different kind
                    self.widget(old)?.on_hidden(&id).await;
                }
                self.cache.ensure_running().await;
                debug!("{} {} visible", kind, id);
                widget.on_visible(&id, &settings).await;
            }
            DeviceEvent::Hidden { id } => {
                let kind = lock(&self.visible).remove(&id);
                match kind {
                    Some(kind) => {
                        debug!("{} {} hidden", kind, id);
                        self.widget(kind)?.on_hidden(&id).await;
                    }
                    None => debug!("hidden event for unknown instance {}", id),
                }
            }
            DeviceEvent::KeyPress { id, settings } => {
                let kind = lock(&self.visible).get(&id).copied();
                match kind {
                    Some(kind) => {
                        debug!("{} {} pressed", kind, id);
                        self.widget(kind)?.on_key_press(&id, &settings).await;
                    }
                    None => warn!("key press for unknown instance {}", id),
                }
            }
            DeviceEvent::GlobalSettings { credentials } => {
                let revision = self.store.replace(credentials).await?;
                info!("credentials updated (revision {})", revision);
                self.cache.ensure_running().await;
            }
        }
        Ok(())
    }

    /// Parse and dispatch one line. Bad lines are logged and skipped.
    pub async fn dispatch_line(&self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        let result = match DeviceEvent::parse(line) {
            Ok(event) => self.dispatch(event).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!("{:#}", e);
        }
    }

    /// Hide every visible instance and stop polling.
    pub async fn shutdown(&self) {
        let instances: Vec<(String, WidgetKind)> = lock(&self.visible).drain().collect();
        let hides = instances.iter().filter_map(|(id, kind)| {
            self.widgets.get(kind).map(|w| {
                let w = Arc::clone(w);
                async move { w.on_hidden(id).await }
            })
        });
        futures::future::join_all(hides).await;
        self.cache.stop();
        info!("dispatcher shut down ({} instances hidden)", instances.len());
    }

    pub fn visible_count(&self) -> usize {
        lock(&self.visible).len()
    }

    pub fn visible_kind(&self, id: &str) -> Option<WidgetKind> {
        lock(&self.visible).get(id).copied()
    }

    fn widget(&self, kind: WidgetKind) -> Result<&Arc<dyn Widget>> {
        self.widgets
            .get(&kind)
            .with_context(|| format!("no widget registered for {}", kind))
    }
}
