//! Shared player-state cache.
//!
//! One poll loop fetches the full player state on a fixed period and
//! publishes it as an immutable [`PlayerSnapshot`]. Widgets only ever read
//! the published snapshot; they never poll the remote API themselves.
//!
//! Polls (loop ticks, `refresh_now`, the first on-demand read) pass through a
//! single gate so at most one player-state request is in flight. A request
//! that queues behind the gate is dropped if another poll started after it
//! was made, since that poll's result is at least as fresh.

use crate::api::Provider;
use crate::error::{ApiError, AuthError};
use crate::models::PlayerSnapshot;
use crate::util::lock;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

// backoff when a 429 carries no Retry-After
const DEFAULT_RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Uninitialized,
    Polling,
    Stopped,
}

enum Lifecycle {
    Uninitialized,
    // initial fetch running, loop not spawned yet
    Starting,
    Polling(JoinHandle<()>),
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollTrigger {
    Initial,
    Tick,
    OnDemand,
    Manual,
}

struct Entry {
    snapshot: Arc<PlayerSnapshot>,
    fetched_at: Instant,
}

pub struct PlayerStateCache {
    provider: Arc<dyn Provider>,
    interval: Duration,
    current: ArcSwapOption<Entry>,
    poll_gate: tokio::sync::Mutex<()>,
    polls_started: AtomicU64,
    lifecycle: Mutex<Lifecycle>,
    backoff_until: Mutex<Option<Instant>>,
}

impl PlayerStateCache {
    pub fn new(provider: Arc<dyn Provider>, interval: Duration) -> Self {
        Self {
            provider,
            interval,
            current: ArcSwapOption::empty(),
            poll_gate: tokio::sync::Mutex::new(()),
            polls_started: AtomicU64::new(0),
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            backoff_until: Mutex::new(None),
        }
    }

    pub fn state(&self) -> CacheState {
        match &*lock(&self.lifecycle) {
            Lifecycle::Uninitialized => CacheState::Uninitialized,
            Lifecycle::Starting | Lifecycle::Polling(_) => CacheState::Polling,
            Lifecycle::Stopped => CacheState::Stopped,
        }
    }

    /// Start polling: one immediate fetch, then a fetch every `interval`.
    /// Calling it while already polling is a no-op.
    pub async fn initialize(self: &Arc<Self>) -> Result<(), AuthError> {
        {
            let mut lc = lock(&self.lifecycle);
            if matches!(*lc, Lifecycle::Starting | Lifecycle::Polling(_)) {
                return Ok(());
            }
            if !self.provider.is_authenticated() {
                warn!("player state cache not started: missing authentication credentials");
                return Err(AuthError::Unconfigured);
            }
            *lc = Lifecycle::Starting;
        }
        info!("initializing player state cache ({} ms interval)", self.interval.as_millis());

        self.poll(PollTrigger::Initial).await;

        let mut lc = lock(&self.lifecycle);
        if !matches!(*lc, Lifecycle::Starting) {
            // stopped while the first fetch was running
            return Ok(());
        }
        let me = Arc::clone(self);
        *lc = Lifecycle::Polling(tokio::spawn(async move { me.poll_loop().await }));
        info!("player state cache polling");
        Ok(())
    }

    /// Initialize if not already polling; false when credentials are missing.
    pub async fn ensure_running(self: &Arc<Self>) -> bool {
        match self.initialize().await {
            Ok(()) => true,
            Err(e) => {
                debug!("player state cache not running: {}", e);
                false
            }
        }
    }

    pub fn stop(&self) {
        let mut lc = lock(&self.lifecycle);
        if let Lifecycle::Polling(handle) = &*lc {
            handle.abort();
        }
        *lc = Lifecycle::Stopped;
        info!("player state cache stopped");
    }

    /// The latest snapshot. Fetches once if nothing has been cached yet;
    /// `None` only when that fetch failed too. A snapshot older than
    /// `max_age` is still returned, with a warning.
    pub async fn get_snapshot(&self, max_age: Duration) -> Option<Arc<PlayerSnapshot>> {
        if self.current.load().is_none() {
            self.poll(PollTrigger::OnDemand).await;
        }
        let entry = self.current.load_full()?;
        let age = entry.fetched_at.elapsed();
        if age > max_age {
            warn!("cached player state is {} ms old, consider it stale", age.as_millis());
        }
        Some(Arc::clone(&entry.snapshot))
    }

    /// Latest snapshot without fetching.
    pub fn peek(&self) -> Option<Arc<PlayerSnapshot>> {
        self.current.load_full().map(|e| Arc::clone(&e.snapshot))
    }

    pub fn age(&self) -> Option<Duration> {
        self.current.load().as_ref().map(|e| e.fetched_at.elapsed())
    }

    /// Out-of-band poll, e.g. right after a command. Never overlaps a
    /// running poll; waits for it and then polls unless a newer one ran.
    pub async fn refresh_now(&self) {
        debug!("manual refresh requested");
        self.poll(PollTrigger::Manual).await;
    }

    /// `refresh_now` after `delay`, detached from the caller.
    pub fn refresh_after(self: &Arc<Self>, delay: Duration) -> JoinHandle<()> {
        let me = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            me.refresh_now().await;
        })
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            self.poll(PollTrigger::Tick).await;
        }
    }

    /// One gated fetch. Returns true when a new snapshot was stored.
    async fn poll(&self, trigger: PollTrigger) -> bool {
        if trigger == PollTrigger::Tick {
            if let Some(until) = *lock(&self.backoff_until) {
                if Instant::now() < until {
                    debug!("poll tick skipped: rate limited");
                    return false;
                }
            }
        }

        let requested_at = self.polls_started.load(Ordering::SeqCst);
        let _gate = self.poll_gate.lock().await;
        if self.polls_started.load(Ordering::SeqCst) != requested_at {
            debug!("{:?} poll coalesced into a newer one", trigger);
            return false;
        }
        self.polls_started.fetch_add(1, Ordering::SeqCst);

        match self.provider.player_state().await {
            Ok(snapshot) => {
                trace!(
                    "player state updated: playing={} track={:?} volume={:?}",
                    snapshot.is_playing,
                    snapshot.track.as_ref().map(|t| t.uri.as_str()),
                    snapshot.volume_percent
                );
                self.current.store(Some(Arc::new(Entry {
                    snapshot: Arc::new(snapshot),
                    fetched_at: Instant::now(),
                })));
                *lock(&self.backoff_until) = None;
                true
            }
            Err(e) if e.is_unconfigured() => {
                debug!("player state poll skipped: credentials not configured");
                false
            }
            Err(ApiError::RateLimited { retry_after }) => {
                let wait = retry_after.map(Duration::from_secs).unwrap_or(DEFAULT_RATE_LIMIT_BACKOFF);
                warn!("player state poll rate limited; backing off {} s", wait.as_secs());
                *lock(&self.backoff_until) = Some(Instant::now() + wait);
                false
            }
            Err(e) => {
                // keep the last good snapshot
                warn!("error fetching player state ({:?}): {}", trigger, e);
                false
            }
        }
    }
}
