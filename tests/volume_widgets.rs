mod common;

use common::{harness, Face};
use serde_json::json;
use spotify_deck_remote as lib;
use lib::api::mock::{demo_track, MockProvider};
use lib::models::{PlayerSnapshot, RepeatMode};
use lib::settings::ActionSettings;
use lib::widgets::volume::{SetVolume, VolumeAdjust};
use lib::widgets::{Widget, NOT_CONFIGURED};
use std::time::Duration;

fn at_volume(volume: Option<u8>) -> PlayerSnapshot {
    PlayerSnapshot {
        is_playing: true,
        track: Some(demo_track("Song", "Artist", "spotify:track:v1")),
        volume_percent: volume,
        shuffle: false,
        repeat: RepeatMode::Off,
    }
}

fn settings(v: serde_json::Value) -> ActionSettings {
    ActionSettings::from_value(v)
}

#[tokio::test(start_paused = true)]
async fn volume_up_is_clamped_to_100() {
    let h = harness(MockProvider::with_state(at_volume(Some(95))));
    let widget = VolumeAdjust::up(h.ctx.clone());
    widget.on_visible("vu", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("vu").as_deref(), Some("95%"));

    widget.on_key_press("vu", &settings(json!({"volumeStep": 10}))).await;
    assert!(h.mock.calls().contains(&"set_volume:100".to_string()));
    assert_eq!(h.surface.count("vu", &Face::Ok), 1);

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.surface.last_title("vu").as_deref(), Some("100%"));
    widget.on_hidden("vu").await;
}

#[tokio::test(start_paused = true)]
async fn volume_down_uses_instance_step() {
    let h = harness(MockProvider::with_state(at_volume(Some(40))));
    let widget = VolumeAdjust::down(h.ctx.clone());
    widget.on_visible("vd", &ActionSettings::default()).await;
    widget.on_key_press("vd", &settings(json!({"volumeStep": 5}))).await;
    assert!(h.mock.calls().contains(&"set_volume:35".to_string()));

    // default step, floor at zero
    h.mock.set_state(at_volume(Some(4)));
    h.ctx.cache.refresh_now().await;
    widget.on_key_press("vd", &ActionSettings::default()).await;
    assert!(h.mock.calls().contains(&"set_volume:0".to_string()));
    widget.on_hidden("vd").await;
}

#[tokio::test(start_paused = true)]
async fn unknown_volume_shows_placeholder() {
    let h = harness(MockProvider::with_state(at_volume(None)));
    let widget = VolumeAdjust::up(h.ctx.clone());
    widget.on_visible("vu", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("vu").as_deref(), Some("--"));
    widget.on_hidden("vu").await;
}

#[tokio::test(start_paused = true)]
async fn set_volume_face_and_press() {
    let h = harness(MockProvider::with_state(at_volume(Some(40))));
    let widget = SetVolume::new(h.ctx.clone());
    widget.on_visible("sv", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("sv").as_deref(), Some("→50%\n(40%)"));

    widget.on_key_press("sv", &settings(json!({"targetVolume": "75"}))).await;
    assert!(h.mock.calls().contains(&"set_volume:75".to_string()));

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(h.surface.last_title("sv").as_deref(), Some("→75%\n(75%)"));
    widget.on_hidden("sv").await;
}

#[tokio::test(start_paused = true)]
async fn set_volume_target_from_visible_settings() {
    let h = harness(MockProvider::with_state(at_volume(None)));
    let widget = SetVolume::new(h.ctx.clone());
    widget.on_visible("sv", &settings(json!({"targetVolume": 0}))).await;
    assert_eq!(h.surface.last_title("sv").as_deref(), Some("→0%"));

    widget.on_key_press("sv", &ActionSettings::default()).await;
    assert!(h.mock.calls().contains(&"set_volume:0".to_string()));
    widget.on_hidden("sv").await;
}

#[tokio::test(start_paused = true)]
async fn failed_volume_call_alerts() {
    let h = harness(MockProvider::with_state(at_volume(Some(50))));
    let widget = VolumeAdjust::up(h.ctx.clone());
    widget.on_visible("vu", &ActionSettings::default()).await;
    h.mock.set_failing(true);
    widget.on_key_press("vu", &ActionSettings::default()).await;

    assert_eq!(h.surface.count("vu", &Face::Alert), 1);
    assert_eq!(h.surface.count("vu", &Face::Ok), 0);
    assert_eq!(h.surface.last_title("vu").as_deref(), Some("50%"));
    widget.on_hidden("vu").await;
}

#[tokio::test(start_paused = true)]
async fn unconfigured_volume_key() {
    let h = harness(MockProvider::with_state(at_volume(Some(50))));
    h.mock.set_authenticated(false);
    let widget = VolumeAdjust::up(h.ctx.clone());
    widget.on_visible("vu", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("vu").as_deref(), Some(NOT_CONFIGURED));

    widget.on_key_press("vu", &ActionSettings::default()).await;
    assert_eq!(h.surface.count("vu", &Face::Alert), 1);
    assert!(h.mock.calls().is_empty());
    widget.on_hidden("vu").await;
}
