//! Call and status activity trail.
//!
//! Append-only JSONL at `<data-dir>/activity.jsonl`. Entries are never
//! rewritten.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::task::TaskStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Call,
    Note,
    StatusChange,
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityKind::Call => write!(f, "call"),
            ActivityKind::Note => write!(f, "note"),
            ActivityKind::StatusChange => write!(f, "status_change"),
        }
    }
}

impl FromStr for ActivityKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "call" => Ok(ActivityKind::Call),
            "note" => Ok(ActivityKind::Note),
            "status_change" | "status" => Ok(ActivityKind::StatusChange),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid activity kind '{s}'. Expected: call, note, status_change"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub task_id: String,
    pub kind: ActivityKind,
    pub at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_status: Option<TaskStatus>,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, task_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: Ulid::new().to_string().to_lowercase(),
            task_id: task_id.into(),
            kind,
            at,
            actor: None,
            note: None,
            old_status: None,
            new_status: None,
        }
    }

    pub fn status_change(
        task_id: impl Into<String>,
        old: TaskStatus,
        new: TaskStatus,
        at: DateTime<Utc>,
    ) -> Self {
        let mut entry = Self::new(ActivityKind::StatusChange, task_id, at);
        entry.old_status = Some(old);
        entry.new_status = Some(new);
        entry
    }
}

pub struct ActivityLog {
    storage: Storage,
}

impl ActivityLog {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn record(&self, entry: &ActivityEntry) -> Result<()> {
        self.storage.append_jsonl(&self.storage.activity_file(), entry)?;
        tracing::debug!(task_id = %entry.task_id, kind = %entry.kind, "activity recorded");
        Ok(())
    }

    /// Entries in write order, optionally for one task.
    pub fn entries(&self, task_id: Option<&str>) -> Result<Vec<ActivityEntry>> {
        let entries: Vec<ActivityEntry> = self.storage.read_jsonl(&self.storage.activity_file())?;
        Ok(match task_id {
            Some(task_id) => entries
                .into_iter()
                .filter(|entry| entry.task_id == task_id)
                .collect(),
            None => entries,
        })
    }
}
