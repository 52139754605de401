//! Notification events derived from task records.
//!
//! Events are recomputed every tick. Their id is a pure function of
//! `(kind, task id, event timestamp)`, so the same logical event keeps the
//! same id across ticks and process restarts; read state keys off it.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{Priority, TaskRecord, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Assignment,
    StatusChange,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Assignment => write!(f, "assignment"),
            NotificationKind::StatusChange => write!(f, "status_change"),
        }
    }
}

/// Deterministic event id: `<kind>-<task id>-<unix millis>`.
pub fn event_id(kind: NotificationKind, task_id: &str, at: DateTime<Utc>) -> String {
    format!("{kind}-{task_id}-{}", at.timestamp_millis())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub id: String,
    pub task_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    /// Event timestamp: task creation for assignments, last update for
    /// status changes.
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

impl NotificationEvent {
    pub fn assignment(task: &TaskRecord) -> Self {
        let kind = NotificationKind::Assignment;
        Self {
            id: event_id(kind, &task.id, task.created_at),
            task_id: task.id.clone(),
            kind,
            title: task.title.clone(),
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.created_at,
            is_read: false,
            assigned_by: task.assigner_name.clone(),
            old_status: None,
            new_status: None,
            updated_by: None,
        }
    }

    pub fn status_change(task: &TaskRecord, old_status: Option<TaskStatus>) -> Self {
        let kind = NotificationKind::StatusChange;
        Self {
            id: event_id(kind, &task.id, task.updated_at),
            task_id: task.id.clone(),
            kind,
            title: task.title.clone(),
            priority: task.priority,
            due_date: task.due_date,
            created_at: task.updated_at,
            is_read: false,
            assigned_by: None,
            old_status,
            new_status: Some(task.status),
            updated_by: task.updated_by_name.clone(),
        }
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        match self.kind {
            NotificationKind::Assignment => match &self.assigned_by {
                Some(by) => format!("New task assigned by {by}: {}", self.title),
                None => format!("New task assigned: {}", self.title),
            },
            NotificationKind::StatusChange => {
                let new = self
                    .new_status
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                match self.old_status {
                    Some(old) => format!("{}: {old} -> {new}", self.title),
                    None => format!("{}: now {new}", self.title),
                }
            }
        }
    }
}
