use base64::{engine::general_purpose, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

static PLAYLIST_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"spotify:playlist:([A-Za-z0-9]+)").expect("valid playlist regex"));
static PLAIN_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+$").expect("valid id regex"));

/// Accepts a share URL (`https://open.spotify.com/playlist/{id}?si=..`), a
/// `spotify:playlist:{id}` URI, or a bare id.
pub fn extract_playlist_id(input: &str) -> Option<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        if url.host_str() == Some("open.spotify.com") {
            let mut segments = url.path_segments()?;
            while let Some(seg) = segments.next() {
                if seg == "playlist" {
                    return segments.next().filter(|id| PLAIN_ID.is_match(id)).map(str::to_string);
                }
            }
            return None;
        }
    }
    if let Some(caps) = PLAYLIST_URI.captures(trimmed) {
        return caps.get(1).map(|m| m.as_str().to_string());
    }
    PLAIN_ID.is_match(trimmed).then(|| trimmed.to_string())
}

/// Inline image for the device: `data:{mime};base64,{payload}`.
pub fn data_uri(content_type: Option<&str>, bytes: &[u8]) -> String {
    let mime = content_type
        .map(|c| c.split(';').next().unwrap_or(c).trim())
        .filter(|c| !c.is_empty())
        .unwrap_or("image/jpeg");
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

/// Current volume moved by `delta`, clamped to 0..=100. Unknown volume counts as 0.
pub fn adjusted_volume(current: Option<u8>, delta: i32) -> u8 {
    clamp_volume(current.unwrap_or(0) as i32 + delta)
}

pub fn clamp_volume(v: i32) -> u8 {
    v.clamp(0, 100) as u8
}

/// Poison-tolerant lock for short, non-async critical sections.
pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playlist_id_from_share_url() {
        let id = extract_playlist_id("https://open.spotify.com/playlist/37i9dQZF1EQpgT26jgbgRI?si=abc123");
        assert_eq!(id.as_deref(), Some("37i9dQZF1EQpgT26jgbgRI"));
    }

    #[test]
    fn playlist_id_from_uri_and_plain() {
        assert_eq!(extract_playlist_id("spotify:playlist:abcDEF123").as_deref(), Some("abcDEF123"));
        assert_eq!(extract_playlist_id("  abcDEF123 ").as_deref(), Some("abcDEF123"));
    }

    #[test]
    fn playlist_id_rejects_garbage() {
        assert_eq!(extract_playlist_id(""), None);
        assert_eq!(extract_playlist_id("https://open.spotify.com/album/xyz"), None);
        assert_eq!(extract_playlist_id("not a playlist"), None);
    }

    #[test]
    fn volume_is_clamped() {
        assert_eq!(adjusted_volume(Some(95), 10), 100);
        assert_eq!(adjusted_volume(Some(5), -10), 0);
        assert_eq!(adjusted_volume(None, 10), 10);
        assert_eq!(adjusted_volume(Some(40), -5), 35);
    }

    #[test]
    fn data_uri_defaults_to_jpeg() {
        assert_eq!(data_uri(None, b"hi"), "data:image/jpeg;base64,aGk=");
        assert_eq!(data_uri(Some("image/png; charset=binary"), b"hi"), "data:image/png;base64,aGk=");
    }
}
