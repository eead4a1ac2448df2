//! Activity-aware periodic refresh.
//!
//! A tick invokes the refresh action only when the scheduler is enabled and
//! the user has been idle for at least the activity threshold. Skipped ticks
//! are dropped, never queued. Manual and forced refreshes bypass both gates.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use cafepos_core::{RefreshAction, RefreshCallbackError};

use crate::activity::{ActivityTracker, InputEvent};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshConfig {
    /// Time between ticks.
    #[serde(with = "millis")]
    pub interval: Duration,
    /// When false, ticks never refresh; manual and forced calls still do.
    pub enabled: bool,
    /// Idle time required after the last input before a tick may refresh.
    #[serde(with = "millis")]
    pub activity_threshold: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            enabled: true,
            activity_threshold: Duration::from_secs(10),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// Shortest period the ticker will run at.
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Counters kept across the scheduler's lifetime.
#[derive(Debug, Default)]
pub struct RefreshStats {
    ticks: AtomicU64,
    skipped: AtomicU64,
    runs: AtomicU64,
    failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatsSnapshot {
    pub ticks: u64,
    pub skipped: u64,
    pub runs: u64,
    pub failures: u64,
}

impl RefreshStats {
    pub fn snapshot(&self) -> RefreshStatsSnapshot {
        RefreshStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            runs: self.runs.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// Adapts an async closure into a [`RefreshAction`].
pub struct RefreshFn<F>(pub F);

#[async_trait]
impl<F, Fut> RefreshAction for RefreshFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    async fn refresh(&self) -> Result<()> {
        (self.0)().await
    }
}

/// Cloneable entry point for manual and forced refreshes, usable while the
/// scheduler itself is borrowed elsewhere.
#[derive(Clone)]
pub struct RefreshHandle {
    action: Arc<dyn RefreshAction>,
    stats: Arc<RefreshStats>,
}

impl RefreshHandle {
    /// Refresh now, regardless of `enabled` and user activity.
    pub async fn manual_refresh(&self) {
        run_action(&self.action, &self.stats, "manual").await;
    }

    /// Same behavior as [`manual_refresh`](Self::manual_refresh); a separate
    /// entry point for callers overriding a pending state change.
    pub async fn force_refresh(&self) {
        run_action(&self.action, &self.stats, "forced").await;
    }
}

pub struct RefreshScheduler {
    config: RefreshConfig,
    action: Arc<dyn RefreshAction>,
    tracker: ActivityTracker,
    stats: Arc<RefreshStats>,
    running: bool,
    ticker: Option<JoinHandle<()>>,
    listener: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub fn new(config: RefreshConfig, action: Arc<dyn RefreshAction>) -> Self {
        let config = clamp_interval(config);
        let tracker = ActivityTracker::new(config.activity_threshold);
        Self {
            config,
            action,
            tracker,
            stats: Arc::new(RefreshStats::default()),
            running: false,
            ticker: None,
            listener: None,
        }
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    /// The tracker gating scheduled ticks. Feed it user input.
    pub fn tracker(&self) -> &ActivityTracker {
        &self.tracker
    }

    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.stats.snapshot()
    }

    /// True while the periodic timer is armed.
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    /// Attach an input listener for the lifetime of this scheduler,
    /// replacing any previous one.
    pub fn attach_input(&mut self, events: mpsc::Receiver<InputEvent>) {
        if let Some(previous) = self.listener.replace(self.tracker.attach(events)) {
            previous.abort();
        }
    }

    /// Arm the periodic timer. A disabled config leaves the timer unarmed
    /// until a later `reconfigure` enables it.
    pub fn start(&mut self) {
        self.running = true;
        if self.ticker.is_some() {
            return;
        }
        if !self.config.enabled {
            debug!("refresh disabled; timer not armed");
            return;
        }
        info!(
            interval_ms = self.config.interval.as_millis() as u64,
            activity_threshold_ms = self.config.activity_threshold.as_millis() as u64,
            "refresh scheduler started"
        );
        self.ticker = Some(self.spawn_ticker());
    }

    /// Cancel the timer and detach input listeners. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
        self.disarm();
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
        self.tracker.shutdown();
    }

    /// Replace the config, tearing the timer down and re-arming it if the
    /// scheduler is running and the new config is enabled.
    pub fn reconfigure(&mut self, config: RefreshConfig) {
        let config = clamp_interval(config);
        self.disarm();
        self.tracker.set_threshold(config.activity_threshold);
        self.config = config;
        if self.running && self.config.enabled {
            self.ticker = Some(self.spawn_ticker());
        }
        debug!(enabled = self.config.enabled, ticking = self.ticker.is_some(), "refresh reconfigured");
    }

    pub fn handle(&self) -> RefreshHandle {
        RefreshHandle {
            action: Arc::clone(&self.action),
            stats: Arc::clone(&self.stats),
        }
    }

    pub async fn manual_refresh(&self) {
        self.handle().manual_refresh().await;
    }

    pub async fn force_refresh(&self) {
        self.handle().force_refresh().await;
    }

    fn disarm(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
            debug!("refresh timer cancelled");
        }
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let action = Arc::clone(&self.action);
        let stats = Arc::clone(&self.stats);
        let tracker = self.tracker.clone();
        let period = self.config.interval;
        let enabled = self.config.enabled;

        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                stats.ticks.fetch_add(1, Ordering::Relaxed);

                if !enabled {
                    continue;
                }
                if tracker.is_active() {
                    stats.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!("user active; skipping refresh tick");
                    continue;
                }
                run_action(&action, &stats, "scheduled").await;
            }
        })
    }
}

/// `interval_at` rejects a zero period.
fn clamp_interval(mut config: RefreshConfig) -> RefreshConfig {
    if config.interval < MIN_INTERVAL {
        warn!(
            interval_ms = config.interval.as_millis() as u64,
            "refresh interval below minimum; clamping to {}ms",
            MIN_INTERVAL.as_millis()
        );
        config.interval = MIN_INTERVAL;
    }
    config
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Run the action, converting errors and panics into a logged
/// [`RefreshCallbackError`].
async fn run_action(action: &Arc<dyn RefreshAction>, stats: &RefreshStats, trigger: &'static str) {
    let outcome = AssertUnwindSafe(action.refresh())
        .catch_unwind()
        .await
        .unwrap_or_else(|_| Err(anyhow!("refresh action panicked")));

    stats.runs.fetch_add(1, Ordering::Relaxed);
    if let Err(e) = outcome {
        stats.failures.fetch_add(1, Ordering::Relaxed);
        let err = RefreshCallbackError::new(trigger, &e);
        warn!(error = %err, "refresh failed; scheduler keeps running");
    }
}
