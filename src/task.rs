//! Task records and the task record source seam.
//!
//! The hosted backend owns task durability. The reconciler only sees it
//! through [`TaskSource`]: a filtered read returning raw rows, and a field
//! update used by collaborators outside the notification core.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// =============================================================================
// Priority / Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Urgent => write!(f, "urgent"),
        }
    }
}

impl FromStr for Priority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "urgent" => Ok(Priority::Urgent),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid priority '{s}'. Expected: low, medium, high, urgent"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "in_progress" => Ok(TaskStatus::InProgress),
            "completed" => Ok(TaskStatus::Completed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(Error::InvalidArgument(format!(
                "Invalid status '{s}'. Expected: pending, in_progress, completed, cancelled"
            ))),
        }
    }
}

// =============================================================================
// Task Record
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigner_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskRecord {
    /// True when the record changed meaningfully after it was created.
    pub fn edited_since_creation(&self, fresh_threshold: Duration) -> bool {
        self.updated_at - self.created_at >= fresh_threshold
    }

    pub fn is_assigned_to(&self, user_id: &str) -> bool {
        self.assignee_id.as_deref() == Some(user_id)
    }
}

/// One row as returned by the source, not yet validated.
///
/// Rows are decoded one at a time so a single bad row cannot fail a whole
/// fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskRow(pub serde_json::Value);

impl TaskRow {
    pub fn from_record(record: &TaskRecord) -> Result<Self> {
        Ok(Self(serde_json::to_value(record)?))
    }

    /// Best-effort id, for diagnostics on malformed rows.
    pub fn id_hint(&self) -> Option<String> {
        self.0.get("id").and_then(|id| id.as_str()).map(str::to_string)
    }

    pub fn decode(&self) -> Result<TaskRecord> {
        let record: TaskRecord =
            serde_json::from_value(self.0.clone()).map_err(|err| Error::MalformedRecord {
                task_id: self.id_hint(),
                reason: err.to_string(),
            })?;

        if record.id.trim().is_empty() {
            return Err(Error::MalformedRecord {
                task_id: None,
                reason: "empty id".to_string(),
            });
        }
        if record.updated_at < record.created_at {
            return Err(Error::MalformedRecord {
                task_id: Some(record.id),
                reason: "updated_at precedes created_at".to_string(),
            });
        }
        Ok(record)
    }
}

// =============================================================================
// Source seam
// =============================================================================

/// Filter for [`TaskSource::fetch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskQuery {
    /// Restrict to tasks assigned to this user
    pub assignee_id: Option<String>,
    /// Only tasks with `updated_at >= updated_since`
    pub updated_since: DateTime<Utc>,
}

impl TaskQuery {
    pub fn matches(&self, record: &TaskRecord) -> bool {
        if record.updated_at < self.updated_since {
            return false;
        }
        match &self.assignee_id {
            Some(assignee) => record.is_assigned_to(assignee),
            None => true,
        }
    }
}

/// Partial update applied by [`TaskSource::update_fields`].
///
/// `assignee_id: Some(None)` clears the assignee.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub assignee_id: Option<Option<String>>,
    pub assignee_name: Option<Option<String>>,
    pub assigner_name: Option<Option<String>>,
    pub due_date: Option<Option<NaiveDate>>,
    pub updated_by_name: Option<String>,
}

impl TaskUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.assignee_id.is_none()
            && self.assignee_name.is_none()
            && self.assigner_name.is_none()
            && self.due_date.is_none()
    }

    /// Apply to `record`, stamping `updated_at`.
    pub fn apply(&self, record: &mut TaskRecord, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(priority) = self.priority {
            record.priority = priority;
        }
        if let Some(assignee_id) = &self.assignee_id {
            record.assignee_id = assignee_id.clone();
        }
        if let Some(assignee_name) = &self.assignee_name {
            record.assignee_name = assignee_name.clone();
        }
        if let Some(assigner_name) = &self.assigner_name {
            record.assigner_name = assigner_name.clone();
        }
        if let Some(due_date) = self.due_date {
            record.due_date = due_date;
        }
        if let Some(by) = &self.updated_by_name {
            record.updated_by_name = Some(by.clone());
        }
        record.updated_at = now.max(record.created_at);
    }
}

/// Remote task record source.
pub trait TaskSource: Send + Sync {
    /// Rows matching `query`, most recently updated first.
    fn fetch(&self, query: &TaskQuery) -> Result<Vec<TaskRow>>;

    /// Update fields of one task and return the stored record.
    fn update_fields(&self, id: &str, update: &TaskUpdate) -> Result<TaskRecord>;
}
