use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    #[default]
    Off,
    Track,
    Context,
}

impl RepeatMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepeatMode::Off => "off",
            RepeatMode::Track => "track",
            RepeatMode::Context => "context",
        }
    }

    /// Next mode in the button cycle: off -> context -> track -> off.
    pub fn next(self) -> Self {
        match self {
            RepeatMode::Off => RepeatMode::Context,
            RepeatMode::Context => RepeatMode::Track,
            RepeatMode::Track => RepeatMode::Off,
        }
    }
}

impl fmt::Display for RepeatMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepeatMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(RepeatMode::Off),
            "track" => Ok(RepeatMode::Track),
            "context" => Ok(RepeatMode::Context),
            other => Err(anyhow::anyhow!("unknown repeat mode '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackInfo {
    pub name: String,
    pub artists: Vec<String>,
    pub album: String,
    pub artwork_url: Option<String>,
    pub uri: String,
}

impl TrackInfo {
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// Text scrolled by the now-playing marquee.
    pub fn marquee_text(&self) -> String {
        format!("{} - {}", self.artist_line(), self.name)
    }

    /// Track id from a `spotify:track:{id}` URI.
    pub fn track_id(&self) -> Option<&str> {
        let mut parts = self.uri.split(':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(_), Some("track"), Some(id)) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

/// One immutable view of the remote player, produced by a successful poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSnapshot {
    pub is_playing: bool,
    pub track: Option<TrackInfo>,
    pub volume_percent: Option<u8>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
}

impl PlayerSnapshot {
    /// Nothing is playing (204 from the player endpoint).
    pub fn idle() -> Self {
        Self {
            is_playing: false,
            track: None,
            volume_percent: None,
            shuffle: false,
            repeat: RepeatMode::Off,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistSummary {
    pub id: String,
    pub name: String,
    pub uri: String,
}

// Wire shapes of GET /me/player. Episodes and local files omit most fields,
// so everything is defaulted.

#[derive(Debug, Deserialize)]
pub struct PlayerStateResponse {
    #[serde(default)]
    pub is_playing: bool,
    #[serde(default)]
    pub item: Option<WireTrack>,
    #[serde(default)]
    pub shuffle_state: bool,
    #[serde(default)]
    pub repeat_state: Option<RepeatMode>,
    #[serde(default)]
    pub device: Option<WireDevice>,
}

#[derive(Debug, Deserialize)]
pub struct WireTrack {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<WireArtist>,
    #[serde(default)]
    pub album: Option<WireAlbum>,
    #[serde(default)]
    pub uri: String,
}

#[derive(Debug, Deserialize)]
pub struct WireArtist {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct WireAlbum {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<WireImage>,
}

#[derive(Debug, Deserialize)]
pub struct WireImage {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct WireDevice {
    #[serde(default)]
    pub volume_percent: Option<u8>,
}

impl PlayerStateResponse {
    pub fn into_snapshot(self) -> PlayerSnapshot {
        let volume_percent = self.device.and_then(|d| d.volume_percent).map(|v| v.min(100));
        let repeat = self.repeat_state.unwrap_or_default();
        let Some(item) = self.item else {
            return PlayerSnapshot {
                is_playing: false,
                track: None,
                volume_percent,
                shuffle: self.shuffle_state,
                repeat,
            };
        };
        let (album, artwork_url) = match item.album {
            Some(a) => {
                let art = a
                    .images
                    .iter()
                    .take(2)
                    .map(|i| i.url.as_str())
                    .find(|u| !u.is_empty())
                    .map(str::to_string);
                (a.name, art)
            }
            None => (String::new(), None),
        };
        PlayerSnapshot {
            is_playing: self.is_playing,
            track: Some(TrackInfo {
                name: item.name,
                artists: item.artists.into_iter().map(|a| a.name).collect(),
                album,
                artwork_url,
                uri: item.uri,
            }),
            volume_percent,
            shuffle: self.shuffle_state,
            repeat,
        }
    }
}
