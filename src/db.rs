use crate::credentials::{CredentialStore, Credentials};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS credentials (
    provider        TEXT PRIMARY KEY,
    token_json      TEXT NOT NULL,
    client_id       TEXT,
    client_secret   TEXT,
    last_refreshed  INTEGER
);
";

pub fn open_or_create(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    run_migrations(&conn)?;
    Ok(conn)
}

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

/// Save raw credential JSON for a provider, with optional client_id/client_secret
pub fn save_credential_raw(
    conn: &Connection,
    provider: &str,
    json_blob: &str,
    client_id: Option<&str>,
    client_secret: Option<&str>,
) -> Result<()> {
    conn.execute(
        "INSERT INTO credentials (provider, token_json, client_id, client_secret, last_refreshed) VALUES (?1, ?2, ?3, ?4, strftime('%s','now')) ON CONFLICT(provider) DO UPDATE SET token_json = excluded.token_json, client_id = excluded.client_id, client_secret = excluded.client_secret, last_refreshed = strftime('%s','now')",
        params![provider, json_blob, client_id, client_secret],
    )?;
    Ok(())
}

/// Load raw credential JSON and client_id/client_secret for a provider
pub fn load_credential_with_client(conn: &Connection, provider: &str) -> Result<Option<(String, Option<String>, Option<String>)>> {
    let mut stmt = conn.prepare("SELECT token_json, client_id, client_secret FROM credentials WHERE provider = ?1 LIMIT 1")?;
    let row = stmt
        .query_row(params![provider], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?, r.get::<_, Option<String>>(2)?))
        })
        .optional()?;
    Ok(row)
}

/// Token half of the record as stored in `token_json`.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct StoredToken {
    access_token: String,
    refresh_token: String,
    expires_at: Option<i64>,
}

/// SQLite-backed credential store; one row per provider.
pub struct SqliteStore {
    db_path: PathBuf,
    provider: String,
}

impl SqliteStore {
    pub fn new(db_path: PathBuf) -> Self {
        Self { db_path, provider: "spotify".into() }
    }
}

impl CredentialStore for SqliteStore {
    fn load(&self) -> Result<Option<Credentials>> {
        let conn = open_or_create(&self.db_path)?;
        let Some((token_json, client_id, client_secret)) = load_credential_with_client(&conn, &self.provider)? else {
            return Ok(None);
        };
        let token: StoredToken = serde_json::from_str(&token_json)
            .with_context(|| format!("parsing stored token json for {}", self.provider))?;
        Ok(Some(Credentials {
            client_id: client_id.unwrap_or_default(),
            client_secret: client_secret.unwrap_or_default(),
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: token.expires_at,
        }))
    }

    fn save(&self, creds: &Credentials) -> Result<()> {
        let conn = open_or_create(&self.db_path)?;
        let token_json = serde_json::to_string(&StoredToken {
            access_token: creds.access_token.clone(),
            refresh_token: creds.refresh_token.clone(),
            expires_at: creds.expires_at,
        })?;
        let non_empty = |s: &str| if s.is_empty() { None } else { Some(s.to_string()) };
        save_credential_raw(
            &conn,
            &self.provider,
            &token_json,
            non_empty(&creds.client_id).as_deref(),
            non_empty(&creds.client_secret).as_deref(),
        )
    }

    fn describe(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }
}
