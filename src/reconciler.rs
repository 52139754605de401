//! Unified task notification reconciliation.
//!
//! One [`Reconciler`] per mounted notification surface. Each tick:
//!
//! 1. fetches tasks updated within the trailing window (all tasks for a
//!    privileged viewer, the viewer's own assignments otherwise)
//! 2. classifies them into events, diffing statuses against the instance's
//!    [`StatusSnapshot`] for privileged viewers
//! 3. overlays durable read state
//! 4. presents alerts for unread events newer than the last successful tick
//! 5. replaces the in-memory list and recomputes the unread count
//!
//! A failed fetch leaves the previous list untouched. Ticks take `&mut self`,
//! so two ticks can never interleave on the same snapshot.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::alert::AlertPresenter;
use crate::clock::Clock;
use crate::config::{BootstrapOldStatus, NotificationsConfig};
use crate::error::Result;
use crate::notification::NotificationEvent;
use crate::read_markers::ReadMarkerStore;
use crate::snapshot::{Observation, StatusSnapshot};
use crate::task::{TaskQuery, TaskRecord, TaskSource, TaskStatus};

/// Who the notifications are for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Viewer {
    pub user_id: Option<String>,
    /// Admin/team-lead: sees status changes across all tasks
    pub privileged: bool,
}

impl Viewer {
    pub fn new(user_id: impl Into<String>, privileged: bool) -> Self {
        Self {
            user_id: Some(user_id.into()),
            privileged,
        }
    }

    fn user(&self) -> Option<&str> {
        self.user_id.as_deref().filter(|id| !id.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub window: Duration,
    pub fresh_threshold: Duration,
    pub bootstrap_old_status: BootstrapOldStatus,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            window: Duration::days(7),
            fresh_threshold: Duration::seconds(5),
            bootstrap_old_status: BootstrapOldStatus::Placeholder,
        }
    }
}

impl ReconcilerSettings {
    pub fn from_config(config: &NotificationsConfig) -> Result<Self> {
        Ok(Self {
            window: config.window()?,
            fresh_threshold: config.fresh_threshold()?,
            bootstrap_old_status: config.bootstrap_old_status,
        })
    }
}

/// Shared flag cleared when the owning surface goes away.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

/// The reconciler's published state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NotificationFeed {
    pub notifications: Vec<NotificationEvent>,
    pub unread_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickSummary {
    pub events: usize,
    pub unread_count: usize,
    pub alerted: usize,
    pub skipped_records: usize,
    pub bootstrap: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// No user to poll for
    Idle,
    Applied(TickSummary),
    /// Fetch (or read-marker load) failed; previous state kept
    Skipped { reason: String },
    /// Owner shut down while the tick was in flight
    Discarded,
}

pub struct Reconciler {
    source: Arc<dyn TaskSource>,
    markers: Arc<dyn ReadMarkerStore>,
    presenter: Arc<dyn AlertPresenter>,
    clock: Arc<dyn Clock>,
    settings: ReconcilerSettings,
    snapshot: StatusSnapshot,
    feed: NotificationFeed,
    last_successful_poll: DateTime<Utc>,
    liveness: Liveness,
}

impl Reconciler {
    pub fn new(
        source: Arc<dyn TaskSource>,
        markers: Arc<dyn ReadMarkerStore>,
        presenter: Arc<dyn AlertPresenter>,
        clock: Arc<dyn Clock>,
        settings: ReconcilerSettings,
    ) -> Self {
        // History that predates the mount is listed but never alerted.
        let mounted_at = clock.now();
        Self {
            source,
            markers,
            presenter,
            clock,
            settings,
            snapshot: StatusSnapshot::new(),
            feed: NotificationFeed::default(),
            last_successful_poll: mounted_at,
            liveness: Liveness::new(),
        }
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn feed(&self) -> &NotificationFeed {
        &self.feed
    }

    pub fn notifications(&self) -> &[NotificationEvent] {
        &self.feed.notifications
    }

    pub fn unread_count(&self) -> usize {
        self.feed.unread_count
    }

    pub fn last_successful_poll(&self) -> DateTime<Utc> {
        self.last_successful_poll
    }

    pub fn snapshot(&self) -> &StatusSnapshot {
        &self.snapshot
    }

    pub fn markers(&self) -> &Arc<dyn ReadMarkerStore> {
        &self.markers
    }

    /// Run one tick for `viewer`.
    pub fn poll(&mut self, viewer: &Viewer) -> TickOutcome {
        let Some(user_id) = viewer.user() else {
            tracing::debug!("no viewer user id; skipping tick");
            return TickOutcome::Idle;
        };

        let query = TaskQuery {
            assignee_id: (!viewer.privileged).then(|| user_id.to_string()),
            updated_since: self.clock.now() - self.settings.window,
        };

        let rows = match self.source.fetch(&query) {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(error = %err, "task fetch failed; keeping previous notifications");
                return TickOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
        };

        if !self.liveness.is_alive() {
            tracing::debug!("reconciler shut down during fetch; discarding tick");
            return TickOutcome::Discarded;
        }

        let read_ids = match self.markers.load() {
            Ok(ids) => ids,
            Err(err) => {
                tracing::warn!(error = %err, "read markers unavailable; keeping previous notifications");
                return TickOutcome::Skipped {
                    reason: err.to_string(),
                };
            }
        };

        let mut skipped_records = 0;
        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.decode() {
                Ok(record) => records.push(record),
                Err(err) => {
                    skipped_records += 1;
                    tracing::warn!(error = %err, "skipping malformed task record");
                }
            }
        }

        let bootstrap = viewer.privileged && !self.snapshot.is_seeded();
        let mut events = self.classify(&records, user_id, viewer.privileged);
        overlay_read_state(&mut events, &read_ids);

        let alerted = self.present_new(&events);

        let unread_count = events.iter().filter(|event| !event.is_read).count();
        self.feed = NotificationFeed {
            notifications: events,
            unread_count,
        };
        if viewer.privileged {
            self.snapshot.mark_seeded();
        }
        self.last_successful_poll = self.clock.now();

        let summary = TickSummary {
            events: self.feed.notifications.len(),
            unread_count,
            alerted,
            skipped_records,
            bootstrap,
        };
        tracing::debug!(
            events = summary.events,
            unread = summary.unread_count,
            alerted = summary.alerted,
            skipped = summary.skipped_records,
            bootstrap = summary.bootstrap,
            privileged = viewer.privileged,
            "notification tick applied"
        );
        TickOutcome::Applied(summary)
    }

    fn classify(
        &mut self,
        records: &[TaskRecord],
        user_id: &str,
        privileged: bool,
    ) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        for record in records {
            if !privileged {
                if record.is_assigned_to(user_id) {
                    events.push(NotificationEvent::assignment(record));
                }
                continue;
            }

            match self.snapshot.observe(&record.id, record.status) {
                Observation::Bootstrap => {
                    if record.edited_since_creation(self.settings.fresh_threshold) {
                        let old_status = match self.settings.bootstrap_old_status {
                            BootstrapOldStatus::Placeholder => Some(TaskStatus::Pending),
                            BootstrapOldStatus::Omit => None,
                        };
                        events.push(NotificationEvent::status_change(record, old_status));
                    }
                }
                Observation::Changed { previous } => {
                    events.push(NotificationEvent::status_change(record, Some(previous)));
                }
                Observation::FirstSeen | Observation::Unchanged => {}
            }
        }
        events
    }

    fn present_new(&self, events: &[NotificationEvent]) -> usize {
        let mut alerted = 0;
        for event in events {
            if event.is_read || event.created_at <= self.last_successful_poll {
                continue;
            }
            match self.presenter.present(event) {
                Ok(()) => alerted += 1,
                Err(err) => {
                    tracing::warn!(notification_id = %event.id, error = %err, "alert presentation failed");
                }
            }
        }
        alerted
    }

    /// Flag one listed event as read in memory. Returns false if not listed
    /// or already read.
    pub fn apply_read(&mut self, id: &str) -> bool {
        let Some(event) = self
            .feed
            .notifications
            .iter_mut()
            .find(|event| event.id == id && !event.is_read)
        else {
            return false;
        };
        event.is_read = true;
        self.feed.unread_count = self.feed.unread_count.saturating_sub(1);
        true
    }

    /// Flag every listed event as read in memory; returns all listed ids.
    pub fn apply_all_read(&mut self) -> Vec<String> {
        for event in self.feed.notifications.iter_mut() {
            event.is_read = true;
        }
        self.feed.unread_count = 0;
        self.feed
            .notifications
            .iter()
            .map(|event| event.id.clone())
            .collect()
    }
}

fn overlay_read_state(events: &mut [NotificationEvent], read_ids: &BTreeSet<String>) {
    for event in events {
        event.is_read = read_ids.contains(&event.id);
    }
}
