#![allow(dead_code)]

use async_trait::async_trait;
use spotify_deck_remote as lib;
use lib::api::mock::MockProvider;
use lib::api::Provider;
use lib::config::{Timings, WidgetDefaults};
use lib::player_state::PlayerStateCache;
use lib::widgets::{Surface, WidgetContext};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Face {
    Title(String),
    Image(String),
    State(u8),
    Ok,
    Alert,
}

/// Surface that records every update, per instance id.
#[derive(Default)]
pub struct RecordingSurface {
    events: Mutex<Vec<(String, Face)>>,
}

impl RecordingSurface {
    pub fn events(&self, id: &str) -> Vec<Face> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(i, _)| i == id)
            .map(|(_, f)| f.clone())
            .collect()
    }

    pub fn titles(&self, id: &str) -> Vec<String> {
        self.events(id)
            .into_iter()
            .filter_map(|f| match f {
                Face::Title(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    pub fn last_title(&self, id: &str) -> Option<String> {
        self.titles(id).pop()
    }

    pub fn last_state(&self, id: &str) -> Option<u8> {
        self.events(id)
            .into_iter()
            .filter_map(|f| match f {
                Face::State(s) => Some(s),
                _ => None,
            })
            .last()
    }

    pub fn count(&self, id: &str, face: &Face) -> usize {
        self.events(id).iter().filter(|f| *f == face).count()
    }

    pub fn total(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn push(&self, id: &str, face: Face) {
        self.events.lock().unwrap().push((id.to_string(), face));
    }
}

#[async_trait]
impl Surface for RecordingSurface {
    async fn set_title(&self, id: &str, title: &str) -> anyhow::Result<()> {
        self.push(id, Face::Title(title.to_string()));
        Ok(())
    }

    async fn set_image(&self, id: &str, image: &str) -> anyhow::Result<()> {
        self.push(id, Face::Image(image.to_string()));
        Ok(())
    }

    async fn set_state(&self, id: &str, state: u8) -> anyhow::Result<()> {
        self.push(id, Face::State(state));
        Ok(())
    }

    async fn show_ok(&self, id: &str) -> anyhow::Result<()> {
        self.push(id, Face::Ok);
        Ok(())
    }

    async fn show_alert(&self, id: &str) -> anyhow::Result<()> {
        self.push(id, Face::Alert);
        Ok(())
    }
}

pub struct Harness {
    pub mock: Arc<MockProvider>,
    pub surface: Arc<RecordingSurface>,
    pub ctx: WidgetContext,
}

pub fn harness(mock: MockProvider) -> Harness {
    let mock = Arc::new(mock);
    let surface = Arc::new(RecordingSurface::default());
    let provider: Arc<dyn Provider> = mock.clone();
    let timings = Timings::default();
    let cache = Arc::new(PlayerStateCache::new(Arc::clone(&provider), timings.poll_interval));
    let ctx = WidgetContext {
        provider,
        cache,
        surface: surface.clone(),
        timings,
        defaults: WidgetDefaults::default(),
    };
    Harness { mock, surface, ctx }
}
