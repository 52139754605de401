//! Last-observed status per task, owned by one reconciler instance.
//!
//! Never persisted. A fresh instance starts unseeded, and its first
//! successful tick only seeds the map.

use std::collections::HashMap;

use crate::task::TaskStatus;

/// Result of comparing a task's current status with the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// The snapshot has never been seeded; there is nothing to compare with.
    Bootstrap,
    /// Seeded snapshot, but this task was not in it.
    FirstSeen,
    Unchanged,
    Changed { previous: TaskStatus },
}

#[derive(Debug, Default)]
pub struct StatusSnapshot {
    entries: HashMap<String, TaskStatus>,
    seeded: bool,
}

impl StatusSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    /// Compare and overwrite the entry for `task_id`.
    pub fn observe(&mut self, task_id: &str, status: TaskStatus) -> Observation {
        let previous = self.entries.insert(task_id.to_string(), status);
        if !self.seeded {
            return Observation::Bootstrap;
        }
        match previous {
            None => Observation::FirstSeen,
            Some(previous) if previous == status => Observation::Unchanged,
            Some(previous) => Observation::Changed { previous },
        }
    }

    /// Called once a tick has been applied.
    pub fn mark_seeded(&mut self) {
        self.seeded = true;
    }

    pub fn get(&self, task_id: &str) -> Option<TaskStatus> {
        self.entries.get(task_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
