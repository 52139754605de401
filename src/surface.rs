//! Read-side API over a reconciler: the notification list, the unread
//! badge, and the mark-read actions.
//!
//! Read-state changes hit the in-memory list first, so the badge updates
//! without waiting for the next tick, and are then persisted. Both steps
//! happen under the reconciler lock: a tick queued behind a mark-read sees
//! the new marker when it reloads durable state. If persisting fails, the
//! next tick re-overlays durable state.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::notification::NotificationEvent;
use crate::reconciler::{Reconciler, TickOutcome, Viewer};

/// A reconciler shared between its poller and its surface.
pub type SharedReconciler = Arc<Mutex<Reconciler>>;

pub fn share(reconciler: Reconciler) -> SharedReconciler {
    Arc::new(Mutex::new(reconciler))
}

pub(crate) fn lock(reconciler: &SharedReconciler) -> Result<MutexGuard<'_, Reconciler>> {
    reconciler
        .lock()
        .map_err(|_| Error::OperationFailed("reconciler state poisoned".to_string()))
}

#[derive(Clone)]
pub struct NotificationCenter {
    reconciler: SharedReconciler,
    viewer: Viewer,
}

impl NotificationCenter {
    pub fn new(reconciler: SharedReconciler, viewer: Viewer) -> Self {
        Self { reconciler, viewer }
    }

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn reconciler(&self) -> &SharedReconciler {
        &self.reconciler
    }

    /// Current list, newest first.
    pub fn notifications(&self) -> Result<Vec<NotificationEvent>> {
        let mut events = lock(&self.reconciler)?.notifications().to_vec();
        sort_by_recency(&mut events);
        Ok(events)
    }

    pub fn unread_count(&self) -> Result<usize> {
        Ok(lock(&self.reconciler)?.unread_count())
    }

    /// Mark one id read. Returns true if a listed unread event flipped.
    pub fn mark_as_read(&self, id: &str) -> Result<bool> {
        let mut reconciler = lock(&self.reconciler)?;
        let flipped = reconciler.apply_read(id);
        let markers = Arc::clone(reconciler.markers());
        markers.mark_read(id)?;
        Ok(flipped)
    }

    /// Mark everything currently listed; returns how many ids were written.
    pub fn mark_all_as_read(&self) -> Result<usize> {
        let mut reconciler = lock(&self.reconciler)?;
        let ids = reconciler.apply_all_read();
        let markers = Arc::clone(reconciler.markers());
        markers.mark_all_read(&ids)?;
        Ok(ids.len())
    }

    /// Tick now. Waits for an in-flight tick instead of overlapping it.
    pub fn refresh(&self) -> Result<TickOutcome> {
        Ok(lock(&self.reconciler)?.poll(&self.viewer))
    }
}

pub fn sort_by_recency(events: &mut [NotificationEvent]) {
    events.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
}
