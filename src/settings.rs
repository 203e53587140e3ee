use crate::models::RepeatMode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-key settings delivered with `visible` and `keyPress` events.
/// Free-form on the wire; unknown keys are kept and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionSettings(pub Map<String, Value>);

impl ActionSettings {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    fn number(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
            Value::String(s) => s.trim().parse::<f64>().ok().map(|f| f.round() as i64),
            _ => None,
        }
    }

    fn text(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.as_str().map(str::trim).filter(|s| !s.is_empty())
    }

    /// `volumeStep`, as a magnitude.
    pub fn volume_step(&self, default: i32) -> i32 {
        self.number("volumeStep")
            .map(|n| n.unsigned_abs().min(100) as i32)
            .filter(|n| *n > 0)
            .unwrap_or(default)
    }

    /// `targetVolume`; accepts a number or a numeric string, clamped to 0..=100.
    pub fn target_volume(&self, default: u8) -> u8 {
        self.number("targetVolume")
            .map(|n| n.clamp(0, 100) as u8)
            .unwrap_or(default)
    }

    /// Raw `playlistId` (URL, URI or id).
    pub fn playlist(&self) -> Option<&str> {
        self.text("playlistId")
    }

    /// Fixed `repeatMode` overriding the cycle, when set.
    pub fn repeat_mode(&self) -> Option<RepeatMode> {
        self.text("repeatMode").and_then(|s| s.parse().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn target_volume_accepts_strings() {
        let s = ActionSettings::from_value(json!({"targetVolume": "75"}));
        assert_eq!(s.target_volume(50), 75);
        let s = ActionSettings::from_value(json!({"targetVolume": 140}));
        assert_eq!(s.target_volume(50), 100);
        let s = ActionSettings::from_value(json!({"targetVolume": "loud"}));
        assert_eq!(s.target_volume(50), 50);
    }

    #[test]
    fn volume_step_falls_back() {
        assert_eq!(ActionSettings::default().volume_step(10), 10);
        let s = ActionSettings::from_value(json!({"volumeStep": 0}));
        assert_eq!(s.volume_step(10), 10);
        let s = ActionSettings::from_value(json!({"volumeStep": -5}));
        assert_eq!(s.volume_step(10), 5);
    }

    #[test]
    fn blank_values_are_unset() {
        let s = ActionSettings::from_value(json!({"playlistId": "  ", "repeatMode": "bogus"}));
        assert_eq!(s.playlist(), None);
        assert_eq!(s.repeat_mode(), None);
    }
}
