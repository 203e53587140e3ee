use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    Json,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub credential_backend: CredentialBackend,
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
    // path to database file (sqlite backend only)
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    // Endpoints
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    // Polling / render cadences
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_track_check")]
    pub track_check_ms: u64,
    #[serde(default = "default_marquee_tick")]
    pub marquee_tick_ms: u64,
    #[serde(default = "default_passive_refresh")]
    pub passive_refresh_ms: u64,
    #[serde(default = "default_settle_delay")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_snapshot_max_age")]
    pub snapshot_max_age_ms: u64,

    // Token lifecycle
    #[serde(default = "default_token_refresh_interval")]
    pub token_refresh_interval: u64,
    #[serde(default = "default_token_expiry_margin")]
    pub token_expiry_margin_secs: i64,
    #[serde(default = "default_settings_wait")]
    pub settings_wait_ms: u64,

    // Widget defaults
    #[serde(default = "default_volume_step")]
    pub default_volume_step: i32,
    #[serde(default = "default_target_volume")]
    pub default_target_volume: u8,
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("spotify-deck")
}

fn default_credentials_path() -> PathBuf { app_dir(dirs::config_dir()).join("credentials.json") }
fn default_db_path() -> PathBuf { app_dir(dirs::data_local_dir()).join("spotify-deck.db") }
fn default_log_dir() -> PathBuf { app_dir(dirs::data_local_dir()).join("logs") }
fn default_api_base() -> String {
    // include v1 path by default
    env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
}
fn default_auth_base() -> String {
    env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
}
fn default_request_timeout() -> u64 { 10 }
fn default_poll_interval() -> u64 { 2000 }
fn default_track_check() -> u64 { 5000 }
fn default_marquee_tick() -> u64 { 500 }
fn default_passive_refresh() -> u64 { 2000 }
fn default_settle_delay() -> u64 { 500 }
fn default_snapshot_max_age() -> u64 { 5000 }
fn default_token_refresh_interval() -> u64 { 50 * 60 }
fn default_token_expiry_margin() -> i64 { 60 }
fn default_settings_wait() -> u64 { 1500 }
fn default_volume_step() -> i32 { 10 }
fn default_target_volume() -> u8 { 50 }

impl Default for Config {
    fn default() -> Self {
        Self {
            credential_backend: CredentialBackend::default(),
            credentials_path: default_credentials_path(),
            db_path: default_db_path(),
            log_dir: default_log_dir(),
            api_base: default_api_base(),
            auth_base: default_auth_base(),
            request_timeout_secs: default_request_timeout(),
            poll_interval_ms: default_poll_interval(),
            track_check_ms: default_track_check(),
            marquee_tick_ms: default_marquee_tick(),
            passive_refresh_ms: default_passive_refresh(),
            settle_delay_ms: default_settle_delay(),
            snapshot_max_age_ms: default_snapshot_max_age(),
            token_refresh_interval: default_token_refresh_interval(),
            token_expiry_margin_secs: default_token_expiry_margin(),
            settings_wait_ms: default_settings_wait(),
            default_volume_step: default_volume_step(),
            default_target_volume: default_target_volume(),
        }
    }
}

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let cadences = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("track_check_ms", self.track_check_ms),
            ("marquee_tick_ms", self.marquee_tick_ms),
            ("passive_refresh_ms", self.passive_refresh_ms),
            ("token_refresh_interval", self.token_refresh_interval),
        ];
        for (name, value) in cadences {
            if value == 0 {
                anyhow::bail!("{} must be greater than zero", name);
            }
        }
        if !(1..=100).contains(&self.default_volume_step) {
            anyhow::bail!("default_volume_step must be within 1..=100");
        }
        if self.default_target_volume > 100 {
            anyhow::bail!("default_target_volume must be within 0..=100");
        }
        Ok(())
    }

    pub fn timings(&self) -> Timings {
        Timings {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            track_check: Duration::from_millis(self.track_check_ms),
            marquee_tick: Duration::from_millis(self.marquee_tick_ms),
            passive_refresh: Duration::from_millis(self.passive_refresh_ms),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            snapshot_max_age: Duration::from_millis(self.snapshot_max_age_ms),
        }
    }

    pub fn widget_defaults(&self) -> WidgetDefaults {
        WidgetDefaults {
            volume_step: self.default_volume_step,
            target_volume: self.default_target_volume,
        }
    }
}

/// Cadences shared by the cache and the widgets.
#[derive(Debug, Clone, Copy)]
pub struct Timings {
    pub poll_interval: Duration,
    pub track_check: Duration,
    pub marquee_tick: Duration,
    pub passive_refresh: Duration,
    pub settle_delay: Duration,
    pub snapshot_max_age: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Config::default().timings()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct WidgetDefaults {
    pub volume_step: i32,
    pub target_volume: u8,
}

impl Default for WidgetDefaults {
    fn default() -> Self {
        Self { volume_step: default_volume_step(), target_volume: default_target_volume() }
    }
}
