mod common;

use common::{harness, Face};
use spotify_deck_remote as lib;
use lib::api::mock::{demo_track, MockProvider};
use lib::models::{PlayerSnapshot, RepeatMode};
use lib::settings::ActionSettings;
use lib::widgets::play_pause::{PlayPause, STATE_PAUSED, STATE_PLAYING};
use lib::widgets::{Widget, NOT_CONFIGURED};
use std::time::Duration;

fn snapshot(is_playing: bool) -> PlayerSnapshot {
    PlayerSnapshot {
        is_playing,
        track: Some(demo_track("Song", "Artist", "spotify:track:s1")),
        volume_percent: Some(60),
        shuffle: false,
        repeat: RepeatMode::Off,
    }
}

#[tokio::test(start_paused = true)]
async fn renders_state_on_visible_and_every_two_seconds() {
    let h = harness(MockProvider::with_state(snapshot(true)));
    h.ctx.cache.initialize().await.expect("init");
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PLAYING));

    // paused from another device
    h.mock.set_state(snapshot(false));
    tokio::time::sleep(Duration::from_millis(4100)).await;
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PAUSED));

    widget.on_hidden("pp").await;
    h.ctx.cache.stop();
}

#[tokio::test(start_paused = true)]
async fn press_while_playing_pauses_and_rerenders_after_settle() {
    let h = harness(MockProvider::with_state(snapshot(true)));
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;

    widget.on_key_press("pp", &ActionSettings::default()).await;
    assert!(h.mock.calls().contains(&"pause".to_string()));
    assert_eq!(h.surface.count("pp", &Face::Ok), 1);
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PLAYING));

    // forced refresh lands after the settle delay, well before a passive tick
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PAUSED));
    assert_eq!(h.mock.player_state_calls(), 2);

    widget.on_hidden("pp").await;
}

#[tokio::test(start_paused = true)]
async fn press_while_paused_plays() {
    let h = harness(MockProvider::with_state(snapshot(false)));
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;
    widget.on_key_press("pp", &ActionSettings::default()).await;

    let calls = h.mock.calls();
    assert!(calls.contains(&"play".to_string()));
    assert!(!calls.contains(&"pause".to_string()));
    widget.on_hidden("pp").await;
}

#[tokio::test(start_paused = true)]
async fn failed_toggle_alerts_and_keeps_face() {
    let h = harness(MockProvider::with_state(snapshot(true)));
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;
    let before = h.surface.events("pp");

    h.mock.set_failing(true);
    widget.on_key_press("pp", &ActionSettings::default()).await;
    let after = h.surface.events("pp");
    assert_eq!(after.len(), before.len() + 1);
    assert_eq!(after.last(), Some(&Face::Alert));
    assert_eq!(h.surface.count("pp", &Face::Ok), 0);

    // passive render keeps the last good face while the cache has nothing new
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PLAYING));
    widget.on_hidden("pp").await;
}

#[tokio::test(start_paused = true)]
async fn unconfigured_press_alerts_without_network() {
    let h = harness(MockProvider::with_state(snapshot(true)));
    h.mock.set_authenticated(false);
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("pp").as_deref(), Some(NOT_CONFIGURED));

    widget.on_key_press("pp", &ActionSettings::default()).await;
    assert_eq!(h.surface.count("pp", &Face::Alert), 1);
    assert!(h.mock.calls().is_empty());

    // credentials arrive: face switches to the live state
    h.mock.set_authenticated(true);
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(h.surface.last_title("pp").as_deref(), Some(""));
    assert_eq!(h.surface.last_state("pp"), Some(STATE_PLAYING));
    widget.on_hidden("pp").await;
}

#[tokio::test(start_paused = true)]
async fn hidden_instance_drops_pending_settle_render() {
    let h = harness(MockProvider::with_state(snapshot(true)));
    let widget = PlayPause::new(h.ctx.clone());
    widget.on_visible("pp", &ActionSettings::default()).await;
    widget.on_key_press("pp", &ActionSettings::default()).await;
    widget.on_hidden("pp").await;
    let frozen = h.surface.total();

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.surface.total(), frozen);
}
