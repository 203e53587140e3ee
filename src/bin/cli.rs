use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};
use tracing_subscriber::prelude::*;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use anyhow::{anyhow, Context, Result};
use spotify_deck_remote as lib;
use lib::api::auth::TokenRefresher;
use lib::api::mock::MockProvider;
use lib::api::spotify::SpotifyProvider;
use lib::api::Provider;
use lib::config::{Config, CredentialBackend};
use lib::console::ConsoleSurface;
use lib::credentials::{CredentialStore, Credentials, JsonFileStore, TokenStore};
use lib::db::SqliteStore;
use lib::dispatcher::CommandDispatcher;
use lib::player_state::PlayerStateCache;
use lib::widgets::WidgetContext;

#[derive(Parser)]
#[command(name = "spotify-deck", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the key host: device events on stdin, faces on stdout (long-running)
    Run {
        /// Use the in-memory mock player instead of Spotify
        #[arg(long)]
        mock: bool,
    },
    /// Fetch the player state once and print it as JSON
    Status,
    /// List the user's playlists (for play-playlist keys)
    Playlists,
    /// Credential helpers
    Credentials {
        #[command(subcommand)]
        sub: CredentialCommands,
    },
    /// Force an access-token refresh
    RefreshToken,
    /// Validate config file and exit
    ConfigValidate,
}

#[derive(Subcommand)]
enum CredentialCommands {
    /// Store credentials obtained from the authorization flow
    Import {
        #[arg(long)]
        client_id: String,
        #[arg(long)]
        client_secret: String,
        #[arg(long)]
        access_token: String,
        #[arg(long)]
        refresh_token: String,
    },
    /// Print the stored credentials (secrets masked)
    Show,
}

fn resolve_config_path(explicit: &Option<PathBuf>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.clone());
    }
    let default = dirs::config_dir()?.join("spotify-deck").join("config.toml");
    default.exists().then_some(default)
}

fn open_store(cfg: &Config) -> Result<Arc<TokenStore>> {
    let backend: Arc<dyn CredentialStore> = match cfg.credential_backend {
        CredentialBackend::Json => Arc::new(JsonFileStore::new(cfg.credentials_path.clone())),
        CredentialBackend::Sqlite => Arc::new(SqliteStore::new(cfg.db_path.clone())),
    };
    Ok(Arc::new(TokenStore::open(backend)?))
}

fn spotify(cfg: &Config, store: Arc<TokenStore>) -> Result<(Arc<SpotifyProvider>, Arc<TokenRefresher>)> {
    let (provider, tokens) = SpotifyProvider::from_config(cfg, store).context("building Spotify client")?;
    Ok((Arc::new(provider), tokens))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved_config_path = resolve_config_path(&cli.config);
    let cfg = match &resolved_config_path {
        Some(path) => Config::from_path(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize log->tracing bridge and structured logging.
    // Logs go to stderr (stdout carries key faces) and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender = tracing_appender::rolling::daily(&cfg.log_dir, "spotify-deck.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer);

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to set global tracing subscriber: {}", e))?;

    match cli.command {
        Commands::Run { mock } => run(&cfg, mock).await?,
        Commands::Status => {
            let store = open_store(&cfg)?;
            let (provider, _) = spotify(&cfg, store)?;
            let snapshot = provider.player_state().await.context("fetching player state")?;
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
        }
        Commands::Playlists => {
            let store = open_store(&cfg)?;
            let (provider, _) = spotify(&cfg, store)?;
            let playlists = provider.user_playlists().await.context("listing playlists")?;
            if playlists.is_empty() {
                println!("No playlists found.");
            }
            for p in playlists {
                println!("- {} | {} | {}", p.id, p.name, p.uri);
            }
        }
        Commands::Credentials { sub } => {
            let store = open_store(&cfg)?;
            match sub {
                CredentialCommands::Import { client_id, client_secret, access_token, refresh_token } => {
                    let creds = Credentials {
                        client_id,
                        client_secret,
                        access_token,
                        refresh_token,
                        expires_at: None,
                    };
                    let revision = store.replace(creds).await?;
                    println!("Stored credentials in {} (revision {}).", store.backend_description(), revision);
                }
                CredentialCommands::Show => {
                    println!("backend: {}", store.backend_description());
                    println!("configured: {}", store.is_configured());
                    println!("{:#?}", store.credentials());
                }
            }
        }
        Commands::RefreshToken => {
            let store = open_store(&cfg)?;
            let (_, tokens) = spotify(&cfg, store)?;
            let creds = tokens.force_refresh().await.context("refreshing access token")?;
            match creds.expires_at.and_then(|t| Utc.timestamp_opt(t, 0).single()) {
                Some(at) => println!("Token refreshed; expires at {}", at.to_rfc3339()),
                None => println!("Token refreshed."),
            }
        }
        Commands::ConfigValidate => match &resolved_config_path {
            Some(path) => match Config::from_path(path) {
                Ok(_) => println!("OK"),
                Err(e) => {
                    eprintln!("Config validation failed: {}", e);
                    std::process::exit(2);
                }
            },
            None => println!("OK (no config file, using defaults)"),
        },
    }

    Ok(())
}

async fn run(cfg: &Config, mock: bool) -> Result<()> {
    let store = open_store(cfg)?;
    let timings = cfg.timings();

    let (provider, background): (Arc<dyn Provider>, Option<tokio::task::JoinHandle<()>>) = if mock {
        info!("running against the mock player");
        (Arc::new(MockProvider::demo()) as Arc<dyn Provider>, None)
    } else {
        let (provider, tokens) = spotify(cfg, Arc::clone(&store))?;
        let handle = tokens.spawn_background(Duration::from_secs(cfg.token_refresh_interval));
        match store.wait_configured(Duration::from_millis(cfg.settings_wait_ms)).await {
            Ok(_) => info!("credentials available"),
            Err(e) => warn!("{}; keys show 'not configured' until credentials arrive", e),
        }
        (provider as Arc<dyn Provider>, Some(handle))
    };

    let cache = Arc::new(PlayerStateCache::new(Arc::clone(&provider), timings.poll_interval));
    let ctx = WidgetContext {
        provider,
        cache: Arc::clone(&cache),
        surface: Arc::new(ConsoleSurface::new()),
        timings,
        defaults: cfg.widget_defaults(),
    };
    let dispatcher = CommandDispatcher::new(&ctx, store);
    cache.ensure_running().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("reading device events")? {
                Some(line) => dispatcher.dispatch_line(&line).await,
                None => {
                    info!("event stream closed");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
        }
    }

    dispatcher.shutdown().await;
    if let Some(handle) = background {
        handle.abort();
    }
    Ok(())
}
