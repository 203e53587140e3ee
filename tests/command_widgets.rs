mod common;

use common::{harness, Face};
use serde_json::json;
use spotify_deck_remote as lib;
use lib::api::mock::{demo_track, MockProvider};
use lib::models::{PlayerSnapshot, RepeatMode};
use lib::settings::ActionSettings;
use lib::widgets::commands::CommandWidget;
use lib::widgets::{Widget, WidgetKind, NOT_CONFIGURED};
use std::time::Duration;

fn state(repeat: RepeatMode, shuffle: bool, with_track: bool) -> PlayerSnapshot {
    PlayerSnapshot {
        is_playing: with_track,
        track: with_track.then(|| demo_track("Xtal", "Aphex Twin", "spotify:track:6rqhFgbbKwnb9MLmUQDhG6")),
        volume_percent: Some(50),
        shuffle,
        repeat,
    }
}

async fn press(kind: WidgetKind, initial: PlayerSnapshot, settings: ActionSettings) -> (Vec<String>, Vec<Face>) {
    let h = harness(MockProvider::with_state(initial));
    let widget = CommandWidget::new(kind, h.ctx.clone());
    widget.on_visible("c1", &settings).await;
    widget.on_key_press("c1", &settings).await;
    let calls = h.mock.calls().into_iter().filter(|c| c != "player_state").collect();
    (calls, h.surface.events("c1"))
}

#[tokio::test(start_paused = true)]
async fn repeat_cycles_off_context_track() {
    for (from, to) in [
        (RepeatMode::Context, "set_repeat:track"),
        (RepeatMode::Track, "set_repeat:off"),
        (RepeatMode::Off, "set_repeat:context"),
    ] {
        let (calls, faces) = press(WidgetKind::Repeat, state(from, false, true), ActionSettings::default()).await;
        assert_eq!(calls, vec![to.to_string()], "starting from {}", from);
        assert_eq!(faces, vec![Face::Ok]);
    }
}

#[tokio::test(start_paused = true)]
async fn repeat_with_fixed_mode_setting() {
    let settings = ActionSettings::from_value(json!({"repeatMode": "track"}));
    let (calls, _) = press(WidgetKind::Repeat, state(RepeatMode::Track, false, true), settings).await;
    assert_eq!(calls, vec!["set_repeat:track".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn shuffle_toggles_cached_state() {
    let (calls, _) = press(WidgetKind::Shuffle, state(RepeatMode::Off, false, true), ActionSettings::default()).await;
    assert_eq!(calls, vec!["set_shuffle:true".to_string()]);
    let (calls, _) = press(WidgetKind::Shuffle, state(RepeatMode::Off, true, true), ActionSettings::default()).await;
    assert_eq!(calls, vec!["set_shuffle:false".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn like_saves_current_track() {
    let (calls, faces) = press(WidgetKind::Like, state(RepeatMode::Off, false, true), ActionSettings::default()).await;
    assert_eq!(calls, vec!["save_track:6rqhFgbbKwnb9MLmUQDhG6".to_string()]);
    assert_eq!(faces, vec![Face::Ok]);
}

#[tokio::test(start_paused = true)]
async fn like_without_track_alerts() {
    let (calls, faces) = press(WidgetKind::Like, state(RepeatMode::Off, false, false), ActionSettings::default()).await;
    assert!(calls.is_empty());
    assert_eq!(faces, vec![Face::Alert]);
}

#[tokio::test(start_paused = true)]
async fn play_playlist_from_share_url() {
    let settings = ActionSettings::from_value(json!({
        "playlistId": "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc"
    }));
    let (calls, faces) = press(WidgetKind::PlayPlaylist, state(RepeatMode::Off, false, false), settings).await;
    assert_eq!(calls, vec!["play_playlist:37i9dQZF1DXcBWIGoYBM5M".to_string()]);
    assert_eq!(faces, vec![Face::Ok]);
}

#[tokio::test(start_paused = true)]
async fn play_playlist_without_setting_alerts_without_network() {
    let (calls, faces) = press(WidgetKind::PlayPlaylist, state(RepeatMode::Off, false, true), ActionSettings::default()).await;
    assert!(calls.is_empty());
    assert_eq!(faces, vec![Face::Alert]);
}

#[tokio::test(start_paused = true)]
async fn next_and_previous_issue_one_call() {
    let (calls, _) = press(WidgetKind::Next, state(RepeatMode::Off, false, true), ActionSettings::default()).await;
    assert_eq!(calls, vec!["next".to_string()]);
    let (calls, _) = press(WidgetKind::Previous, state(RepeatMode::Off, false, true), ActionSettings::default()).await;
    assert_eq!(calls, vec!["previous".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn failure_shows_alert_only() {
    let h = harness(MockProvider::with_state(state(RepeatMode::Off, false, true)));
    h.mock.set_failing(true);
    let widget = CommandWidget::new(WidgetKind::Next, h.ctx.clone());
    widget.on_key_press("c1", &ActionSettings::default()).await;
    assert_eq!(h.surface.events("c1"), vec![Face::Alert]);
}

#[tokio::test(start_paused = true)]
async fn unconfigured_keys_show_face_and_skip_calls() {
    let h = harness(MockProvider::with_state(state(RepeatMode::Off, false, true)));
    h.mock.set_authenticated(false);
    let widget = CommandWidget::new(WidgetKind::Next, h.ctx.clone());
    widget.on_visible("c1", &ActionSettings::default()).await;
    widget.on_key_press("c1", &ActionSettings::default()).await;
    assert_eq!(
        h.surface.events("c1"),
        vec![Face::Title(NOT_CONFIGURED.to_string()), Face::Alert]
    );
    assert!(h.mock.calls().is_empty());

    // first press after configuration clears the placeholder
    h.mock.set_authenticated(true);
    widget.on_key_press("c1", &ActionSettings::default()).await;
    let faces = h.surface.events("c1");
    assert_eq!(&faces[2..], &[Face::Title(String::new()), Face::Ok]);
}

#[tokio::test(start_paused = true)]
async fn placeholder_clears_once_credentials_arrive() {
    let h = harness(MockProvider::with_state(state(RepeatMode::Off, false, true)));
    h.mock.set_authenticated(false);
    let widget = CommandWidget::new(WidgetKind::Next, h.ctx.clone());
    widget.on_visible("c1", &ActionSettings::default()).await;
    assert_eq!(h.surface.last_title("c1").as_deref(), Some(NOT_CONFIGURED));
    assert_eq!(widget.instances().timer_count("c1"), 1);

    // credentials pushed from elsewhere; no key press needed
    h.mock.set_authenticated(true);
    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert_eq!(h.surface.last_title("c1").as_deref(), Some(""));

    // the face is cleared once, not on every tick
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.surface.events("c1"), vec![Face::Title(NOT_CONFIGURED.to_string()), Face::Title(String::new())]);
    assert!(h.mock.calls().is_empty());

    widget.on_hidden("c1").await;
    assert!(widget.instances().is_empty());
}

#[tokio::test(start_paused = true)]
async fn configured_command_key_draws_nothing_on_visible() {
    let h = harness(MockProvider::with_state(state(RepeatMode::Off, false, true)));
    let widget = CommandWidget::new(WidgetKind::Shuffle, h.ctx.clone());
    widget.on_visible("c1", &ActionSettings::default()).await;
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(h.surface.events("c1").is_empty());
    widget.on_hidden("c1").await;
}
