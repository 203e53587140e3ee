//! Core library for spotify-deck-remote: credentials, the shared
//! player-state cache and the key widgets that render from it.
pub mod config;
pub mod credentials;
pub mod db;
pub mod error;
pub mod models;
pub mod api;
pub mod player_state;
pub mod marquee;
pub mod settings;
pub mod widgets;
pub mod dispatcher;
pub mod console;
pub mod util;
