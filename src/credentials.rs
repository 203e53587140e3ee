use crate::error::SettingsError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// The persisted auth record. Absent fields deserialize as empty strings so
/// a half-written settings file is just "unconfigured".
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Access-token expiry, epoch seconds. `None` until the first refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl Credentials {
    /// All four identity fields present: remote calls may be attempted.
    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty()
            && !self.client_secret.is_empty()
            && !self.access_token.is_empty()
            && !self.refresh_token.is_empty()
    }

    /// Enough to run a refresh_token exchange.
    pub fn can_refresh(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty() && !self.refresh_token.is_empty()
    }
}

fn mask(s: &str) -> String {
    if s.is_empty() {
        "<empty>".into()
    } else if s.chars().count() <= 4 {
        "****".into()
    } else {
        format!("{}****", s.chars().take(4).collect::<String>())
    }
}

// Hand-written so tokens never end up in logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &mask(&self.client_secret))
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &mask(&self.refresh_token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Durable home of the credentials record.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Result<Option<Credentials>>;
    fn save(&self, creds: &Credentials) -> Result<()>;
    fn describe(&self) -> String;
}

/// Plain JSON file, written through a temp file + rename.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl CredentialStore for JsonFileStore {
    fn load(&self) -> Result<Option<Credentials>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let s = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading {}", self.path.display()))?;
        if s.trim().is_empty() {
            return Ok(None);
        }
        let creds: Credentials = serde_json::from_str(&s)
            .with_context(|| format!("parsing credentials in {}", self.path.display()))?;
        Ok(Some(creds))
    }

    fn save(&self, creds: &Credentials) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(creds)?)?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json:{}", self.path.display())
    }
}

/// A credentials record plus the revision it was published under.
#[derive(Debug, Clone)]
pub struct Versioned {
    pub revision: u64,
    pub credentials: Credentials,
}

/// Process-wide credentials holder. Every mutation bumps the revision,
/// wakes waiters and is written through to the backing store.
pub struct TokenStore {
    backend: Arc<dyn CredentialStore>,
    tx: watch::Sender<Versioned>,
}

impl TokenStore {
    pub fn open(backend: Arc<dyn CredentialStore>) -> Result<Self> {
        let credentials = backend.load()?.unwrap_or_default();
        info!(
            "loaded credentials from {} (configured: {})",
            backend.describe(),
            credentials.is_configured()
        );
        let (tx, _rx) = watch::channel(Versioned { revision: 0, credentials });
        Ok(Self { backend, tx })
    }

    pub fn current(&self) -> Versioned {
        self.tx.borrow().clone()
    }

    pub fn credentials(&self) -> Credentials {
        self.tx.borrow().credentials.clone()
    }

    pub fn revision(&self) -> u64 {
        self.tx.borrow().revision
    }

    pub fn is_configured(&self) -> bool {
        self.tx.borrow().credentials.is_configured()
    }

    /// Replace the whole record (initial authorization, settings push).
    pub async fn replace(&self, credentials: Credentials) -> Result<u64> {
        self.update(move |c| *c = credentials).await
    }

    /// Mutate in place, publish, then persist. The new record is visible to
    /// readers even when persisting fails.
    pub async fn update<F>(&self, f: F) -> Result<u64>
    where
        F: FnOnce(&mut Credentials),
    {
        let mut next = self.credentials();
        f(&mut next);
        let mut revision = 0;
        self.tx.send_modify(|v| {
            v.revision += 1;
            v.credentials = next.clone();
            revision = v.revision;
        });
        debug!("credentials revision {} published", revision);

        let backend = Arc::clone(&self.backend);
        tokio::task::spawn_blocking(move || backend.save(&next))
            .await
            .context("credential persist task failed")??;
        Ok(revision)
    }

    /// Wait (bounded) until a configured record is available.
    pub async fn wait_configured(&self, timeout: Duration) -> Result<Credentials, SettingsError> {
        let mut rx = self.tx.subscribe();
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|v| v.credentials.is_configured())
                .await
                .map(|v| v.credentials.clone())
        })
        .await;
        match waited {
            Ok(Ok(creds)) => Ok(creds),
            _ => Err(SettingsError::NotYetAvailable { waited_ms: timeout.as_millis() as u64 }),
        }
    }

    pub fn backend_description(&self) -> String {
        self.backend.describe()
    }
}
