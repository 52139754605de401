//! Timer-driven tick loop for one reconciler.
//!
//! Ticks run one after another on a single tokio task: one eagerly at
//! start, then one per interval. A timer firing while a tick is still in
//! flight is skipped rather than queued up. Each tick runs on the blocking
//! pool while holding the reconciler lock, so a surface `refresh()` waits
//! for it instead of overlapping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{Error, Result};
use crate::reconciler::{Liveness, NotificationFeed, TickOutcome, Viewer};
use crate::surface::{self, SharedReconciler};

pub struct Poller {
    reconciler: SharedReconciler,
    viewer: Viewer,
    interval: Duration,
    max_ticks: Option<usize>,
}

impl Poller {
    pub fn new(reconciler: SharedReconciler, viewer: Viewer, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument(
                "poll interval must be positive".to_string(),
            ));
        }
        Ok(Self {
            reconciler,
            viewer,
            interval,
            max_ticks: None,
        })
    }

    /// Build from a chrono interval as produced by the config layer.
    pub fn with_interval(
        reconciler: SharedReconciler,
        viewer: Viewer,
        interval: chrono::Duration,
    ) -> Result<Self> {
        let interval = interval
            .to_std()
            .map_err(|_| Error::InvalidArgument("poll interval must be positive".to_string()))?;
        Self::new(reconciler, viewer, interval)
    }

    /// Stop on its own after `ticks` ticks.
    pub fn max_ticks(mut self, ticks: usize) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Start ticking on the current tokio runtime.
    pub fn spawn(self) -> Result<PollerHandle> {
        let liveness = surface::lock(&self.reconciler)?.liveness();
        let (tx, rx) = watch::channel(NotificationFeed::default());
        let ticks = Arc::new(AtomicUsize::new(0));

        let task = tokio::spawn(run(
            self.reconciler,
            self.viewer,
            self.interval,
            self.max_ticks,
            liveness.clone(),
            tx,
            Arc::clone(&ticks),
        ));

        Ok(PollerHandle {
            liveness,
            task,
            feed: rx,
            ticks,
        })
    }
}

async fn run(
    reconciler: SharedReconciler,
    viewer: Viewer,
    interval: Duration,
    max_ticks: Option<usize>,
    liveness: Liveness,
    tx: watch::Sender<NotificationFeed>,
    ticks: Arc<AtomicUsize>,
) {
    let mut timer = tokio::time::interval(interval);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        // The first tick completes immediately.
        timer.tick().await;
        if !liveness.is_alive() {
            break;
        }

        let shared = Arc::clone(&reconciler);
        let tick_viewer = viewer.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut reconciler = surface::lock(&shared)?;
            let outcome = reconciler.poll(&tick_viewer);
            Ok::<_, Error>((outcome, reconciler.feed().clone()))
        })
        .await;

        match result {
            Ok(Ok((TickOutcome::Applied(_), feed))) => {
                tx.send_replace(feed);
            }
            Ok(Ok((outcome, _))) => {
                tracing::debug!(?outcome, "tick not applied");
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "tick failed");
            }
            Err(err) => {
                tracing::warn!(error = %err, "tick task panicked or was cancelled");
            }
        }

        let done = ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if max_ticks.is_some_and(|max| done >= max) {
            break;
        }
    }
    tracing::debug!("poller stopped");
}

/// Running poller. Dropping it without [`PollerHandle::stop`] leaves the
/// task running.
pub struct PollerHandle {
    liveness: Liveness,
    task: JoinHandle<()>,
    feed: watch::Receiver<NotificationFeed>,
    ticks: Arc<AtomicUsize>,
}

impl PollerHandle {
    /// Receiver updated after every applied tick.
    pub fn subscribe(&self) -> watch::Receiver<NotificationFeed> {
        self.feed.clone()
    }

    /// Ticks attempted so far.
    pub fn ticks(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }

    /// Stop the timer; a tick still in flight is discarded.
    pub async fn stop(self) {
        self.liveness.shutdown();
        self.task.abort();
        let _ = self.task.await;
    }

    /// Wait for a poller built with `max_ticks` to finish.
    pub async fn finished(self) {
        let _ = self.task.await;
    }
}
