//! Periodic snapshot refresh.
//!
//! A [`PollingController`] keeps the provisions snapshot eventually consistent
//! with the backend. Each cycle fetches once; only after that fetch settles is
//! the next one scheduled, so fetches never overlap and at most one timer is
//! ever armed.

use crate::backend::BackendError;
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default delay between the end of one fetch and the start of the next.
pub const PROVISION_POLL_INTERVAL: Duration = Duration::from_millis(3000);

/// One fetch of the snapshot. Implementations publish the result themselves;
/// the controller only uses the outcome for logging.
#[async_trait]
pub trait SnapshotLoader: Send + Sync + 'static {
    async fn load(&self) -> Result<(), BackendError>;
}

#[derive(Default)]
struct PollState {
    /// Bumped by every `start(true)`; cycles of older generations never re-arm.
    generation: u64,
    active: bool,
    torn_down: bool,
    in_flight: Option<u64>,
    /// A reload was requested while a fetch was in flight.
    follow_up: bool,
    timer: Option<JoinHandle<()>>,
    settled_cycles: u64,
}

struct Inner<L> {
    loader: L,
    interval: Duration,
    state: Mutex<PollState>,
}

pub struct PollingController<L> {
    inner: Arc<Inner<L>>,
}

impl<L> Clone for PollingController<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: SnapshotLoader> PollingController<L> {
    pub fn new(loader: L, interval: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                loader,
                interval,
                state: Mutex::new(PollState::default()),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PollState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Fetch now and keep polling.
    ///
    /// `initial = true` always fetches, even after [`stop`](Self::stop), and
    /// supersedes any earlier chain. `initial = false` is a manual refresh: it
    /// is ignored unless polling is active and idle, and otherwise replaces the
    /// pending timer with an immediate fetch.
    ///
    /// Returns false when a manual refresh was skipped.
    pub fn start(&self, initial: bool) -> bool {
        let generation = {
            let mut st = self.lock();
            if initial {
                st.generation += 1;
                st.active = true;
            } else if !st.active || st.torn_down || st.in_flight.is_some() {
                tracing::debug!(
                    event = "poll.refresh_skipped",
                    active = st.active,
                    in_flight = st.in_flight.is_some()
                );
                return false;
            }
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
            st.in_flight = Some(st.generation);
            st.generation
        };

        let this = self.clone();
        tokio::spawn(async move { this.run_cycle(generation).await });
        true
    }

    /// Reload after a committed change. When idle the pending timer is
    /// replaced by a fetch that completes before this returns; when a fetch
    /// is in flight exactly one follow-up fetch is queued behind it.
    ///
    /// Works whether or not polling is active, but never after teardown.
    pub async fn refresh_after_settle(&self) {
        let generation = {
            let mut st = self.lock();
            if st.torn_down {
                return;
            }
            if st.in_flight.is_some() {
                st.follow_up = true;
                tracing::debug!(event = "poll.follow_up_queued");
                return;
            }
            if let Some(timer) = st.timer.take() {
                timer.abort();
            }
            st.in_flight = Some(st.generation);
            st.generation
        };

        self.clone().run_cycle(generation).await;
    }

    /// Cancel the pending timer and stop rescheduling. A fetch already in
    /// flight is left to finish but will not re-arm.
    pub fn stop(&self) {
        let mut st = self.lock();
        st.active = false;
        if let Some(timer) = st.timer.take() {
            timer.abort();
        }
    }

    /// Stop for good; the page owning this controller is gone.
    pub fn teardown(&self) {
        self.lock().torn_down = true;
        self.stop();
        tracing::debug!(event = "poll.torn_down");
    }

    pub fn is_active(&self) -> bool {
        let st = self.lock();
        st.active && !st.torn_down
    }

    /// Whether a timer for the next cycle is currently armed.
    pub fn has_pending_timer(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// Number of fetches that have settled, successfully or not.
    pub fn settled_cycles(&self) -> u64 {
        self.lock().settled_cycles
    }

    async fn run_cycle(self, generation: u64) {
        if let Err(e) = self.inner.loader.load().await {
            // Failures are retried on the next interval; the loader has already
            // recorded the error in the view state.
            tracing::debug!(event = "poll.fetch_failed", error = %e);
        }
        self.poll_again(generation);
    }

    fn poll_again(&self, generation: u64) {
        let mut st = self.lock();
        let current = st.in_flight == Some(generation);
        if current {
            st.in_flight = None;
        }
        st.settled_cycles += 1;
        if st.torn_down {
            st.follow_up = false;
            return;
        }
        if current && std::mem::take(&mut st.follow_up) {
            st.in_flight = Some(generation);
            let this = self.clone();
            tokio::spawn(async move { this.run_cycle(generation).await });
            return;
        }
        if !st.active || st.generation != generation {
            return;
        }

        let this = self.clone();
        let interval = self.inner.interval;
        st.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            if this.claim_timer(generation) {
                this.run_cycle(generation).await;
            }
        }));
    }

    /// Called when the timer fires. Returns false if the cycle was cancelled
    /// or superseded in the meantime.
    fn claim_timer(&self, generation: u64) -> bool {
        let mut st = self.lock();
        let superseded = st.generation != generation || st.in_flight.is_some();
        if st.torn_down || !st.active || superseded {
            return false;
        }
        // The handle belongs to the task running this code; dropping it detaches.
        st.timer = None;
        st.in_flight = Some(generation);
        true
    }
}
