//! User activity tracking with a trailing decay window.
//!
//! Every input event restarts the window; the tracker reports "active" until
//! `threshold` has elapsed since the most recent event.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant};
use tracing::{debug, trace};

/// Platform input events. All kinds count as activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActivityState {
    pub last_activity_at: Option<Instant>,
    pub is_active: bool,
}

struct Inner {
    threshold: Duration,
    state: ActivityState,
    decay: Option<JoinHandle<()>>,
}

/// Tracks the last user input and derives an `is_active` flag.
///
/// Cloning shares the same underlying state. `record_activity` must be
/// called from within a tokio runtime since it arms the decay timer.
#[derive(Clone)]
pub struct ActivityTracker {
    inner: Arc<Mutex<Inner>>,
    active_tx: Arc<watch::Sender<bool>>,
}

impl ActivityTracker {
    pub fn new(threshold: Duration) -> Self {
        let (active_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(Inner {
                threshold,
                state: ActivityState::default(),
                decay: None,
            })),
            active_tx: Arc::new(active_tx),
        }
    }

    pub fn threshold(&self) -> Duration {
        lock(&self.inner).threshold
    }

    /// Change the decay window. Takes effect from the next event or query.
    pub fn set_threshold(&self, threshold: Duration) {
        lock(&self.inner).threshold = threshold;
    }

    /// Mark the user as active now and restart the decay window.
    pub fn record_activity(&self) {
        let now = Instant::now();
        let mut inner = lock(&self.inner);
        inner.state.last_activity_at = Some(now);
        inner.state.is_active = true;
        if let Some(previous) = inner.decay.take() {
            previous.abort();
        }
        self.active_tx.send_replace(true);

        let deadline = now + inner.threshold;
        let shared = Arc::clone(&self.inner);
        let active_tx = Arc::clone(&self.active_tx);
        inner.decay = Some(tokio::spawn(async move {
            time::sleep_until(deadline).await;
            let mut inner = lock(&shared);
            // A later event re-armed the window; it owns the decay now.
            if inner.state.last_activity_at != Some(now) {
                return;
            }
            inner.state.is_active = false;
            active_tx.send_replace(false);
            trace!("activity window elapsed");
        }));
    }

    /// Record a platform input event.
    pub fn observe(&self, event: InputEvent) {
        trace!(?event, "input event");
        self.record_activity();
    }

    /// True iff less than `threshold` has passed since the last event.
    pub fn is_active(&self) -> bool {
        let inner = lock(&self.inner);
        match inner.state.last_activity_at {
            Some(at) => at.elapsed() < inner.threshold,
            None => false,
        }
    }

    pub fn state(&self) -> ActivityState {
        let last_activity_at = lock(&self.inner).state.last_activity_at;
        ActivityState {
            last_activity_at,
            is_active: self.is_active(),
        }
    }

    /// Observe the decaying `is_active` flag.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.active_tx.subscribe()
    }

    /// Attach an input listener. Events are recorded until the sender side
    /// closes or the returned handle is aborted.
    pub fn attach(&self, mut events: mpsc::Receiver<InputEvent>) -> JoinHandle<()> {
        let tracker = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                tracker.observe(event);
            }
            debug!("input listener closed");
        })
    }

    /// Cancel a pending decay timer.
    pub fn shutdown(&self) {
        if let Some(handle) = lock(&self.inner).decay.take() {
            handle.abort();
        }
    }
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn inactive_before_any_event() {
        let tracker = ActivityTracker::new(Duration::from_secs(5));
        assert!(!tracker.is_active());
        assert_eq!(tracker.state().last_activity_at, None);
    }

    #[tokio::test(start_paused = true)]
    async fn active_until_threshold_elapses() {
        let tracker = ActivityTracker::new(Duration::from_secs(5));
        tracker.record_activity();
        assert!(tracker.is_active());

        time::advance(Duration::from_millis(4_999)).await;
        assert!(tracker.is_active());

        time::advance(Duration::from_millis(1)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn later_event_restarts_window() {
        let tracker = ActivityTracker::new(Duration::from_secs(10));
        tracker.record_activity();
        time::sleep(Duration::from_secs(8)).await;
        tracker.observe(InputEvent::Scroll);

        time::sleep(Duration::from_secs(7)).await;
        assert!(tracker.is_active(), "window measured from the latest event");

        time::sleep(Duration::from_secs(4)).await;
        assert!(!tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn subscribers_see_decay() {
        let tracker = ActivityTracker::new(Duration::from_secs(2));
        let mut rx = tracker.subscribe();
        tracker.record_activity();
        assert!(*rx.borrow_and_update());

        time::sleep(Duration::from_secs(3)).await;
        assert!(rx.has_changed().unwrap());
        assert!(!*rx.borrow_and_update());
        assert!(!tracker.state().is_active);
    }

    #[tokio::test(start_paused = true)]
    async fn superseded_decay_does_not_clear_flag() {
        let tracker = ActivityTracker::new(Duration::from_secs(2));
        let rx = tracker.subscribe();
        tracker.record_activity();
        time::sleep(Duration::from_secs(1)).await;
        tracker.record_activity();

        time::sleep(Duration::from_millis(1_500)).await;
        assert!(*rx.borrow());
        assert!(tracker.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn attached_listener_records_every_kind() {
        let tracker = ActivityTracker::new(Duration::from_secs(1));
        let (tx, rx) = mpsc::channel(8);
        let handle = tracker.attach(rx);

        for event in [
            InputEvent::PointerDown,
            InputEvent::PointerMove,
            InputEvent::KeyPress,
            InputEvent::Scroll,
            InputEvent::TouchStart,
            InputEvent::Click,
        ] {
            time::sleep(Duration::from_secs(2)).await;
            assert!(!tracker.is_active());
            tx.send(event).await.unwrap();
            time::sleep(Duration::from_millis(1)).await;
            assert!(tracker.is_active(), "{event:?} should count as activity");
        }

        drop(tx);
        handle.await.unwrap();
    }
}
