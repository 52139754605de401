//! Task record source implementations.
//!
//! - [`FileTaskSource`]: `tasks.json` in the data directory, used by the CLI
//!   as a local stand-in for the hosted backend.
//! - [`MemoryTaskSource`]: in-process rows with fault injection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::storage::Storage;
use crate::task::{Priority, TaskQuery, TaskRecord, TaskRow, TaskSource, TaskStatus, TaskUpdate};

/// Fields for a new task.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub priority: Priority,
    pub status: TaskStatus,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    pub assigner_name: Option<String>,
    pub due_date: Option<NaiveDate>,
}

impl NewTask {
    fn into_record(self, id: String, clock: &dyn Clock) -> Result<TaskRecord> {
        if self.title.trim().is_empty() {
            return Err(Error::InvalidArgument("task title cannot be empty".to_string()));
        }
        let now = clock.now();
        Ok(TaskRecord {
            id,
            title: self.title,
            priority: self.priority,
            status: self.status,
            assignee_id: self.assignee_id,
            assignee_name: self.assignee_name,
            assigner_name: self.assigner_name,
            updated_by_name: None,
            due_date: self.due_date,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Orders rows most-recently-updated first, undecodable rows last.
fn sort_rows_by_recency(rows: &mut [(Option<TaskRecord>, TaskRow)]) {
    rows.sort_by(|(left, _), (right, _)| {
        let left = left.as_ref().map(|r| r.updated_at);
        let right = right.as_ref().map(|r| r.updated_at);
        right.cmp(&left)
    });
}

// =============================================================================
// File-backed source
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct TaskFile {
    #[serde(default)]
    tasks: Vec<TaskRow>,
}

/// Task source persisted as `tasks.json`.
pub struct FileTaskSource {
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl FileTaskSource {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn create(&self, task: NewTask) -> Result<TaskRecord> {
        let record = task.into_record(Ulid::new().to_string().to_lowercase(), self.clock.as_ref())?;
        let row = TaskRow::from_record(&record)?;
        self.storage
            .update_json(&self.storage.tasks_file(), |file: &mut TaskFile| {
                file.tasks.push(row);
                Ok(())
            })?;
        tracing::debug!(task_id = %record.id, "task created");
        Ok(record)
    }

    /// All decodable tasks, most recently updated first.
    pub fn list(&self) -> Result<Vec<TaskRecord>> {
        let file: TaskFile = self
            .storage
            .read_json_locked(&self.storage.tasks_file())?
            .unwrap_or_default();
        let mut records: Vec<TaskRecord> = file
            .tasks
            .iter()
            .filter_map(|row| match row.decode() {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed task row");
                    None
                }
            })
            .collect();
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(records)
    }

    pub fn get(&self, id: &str) -> Result<TaskRecord> {
        self.list()?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }
}

impl TaskSource for FileTaskSource {
    fn fetch(&self, query: &TaskQuery) -> Result<Vec<TaskRow>> {
        let file: TaskFile = self
            .storage
            .read_json_locked(&self.storage.tasks_file())
            .map_err(|err| Error::SourceUnavailable(err.to_string()))?
            .unwrap_or_default();

        // Undecodable rows are passed through; the reconciler reports them.
        let mut rows: Vec<(Option<TaskRecord>, TaskRow)> = file
            .tasks
            .into_iter()
            .filter_map(|row| match row.decode() {
                Ok(record) if query.matches(&record) => Some((Some(record), row)),
                Ok(_) => None,
                Err(_) => Some((None, row)),
            })
            .collect();
        sort_rows_by_recency(&mut rows);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    fn update_fields(&self, id: &str, update: &TaskUpdate) -> Result<TaskRecord> {
        let now = self.clock.now();
        self.storage
            .update_json(&self.storage.tasks_file(), |file: &mut TaskFile| {
                for row in file.tasks.iter_mut() {
                    if row.id_hint().as_deref() != Some(id) {
                        continue;
                    }
                    let mut record = row.decode()?;
                    update.apply(&mut record, now);
                    *row = TaskRow::from_record(&record)?;
                    return Ok(record);
                }
                Err(Error::TaskNotFound(id.to_string()))
            })
    }
}

// =============================================================================
// In-memory source
// =============================================================================

/// In-process task source with fault injection.
#[derive(Clone)]
pub struct MemoryTaskSource {
    rows: Arc<Mutex<Vec<TaskRow>>>,
    failures: Arc<AtomicUsize>,
    fetches: Arc<AtomicUsize>,
    clock: Arc<dyn Clock>,
}

impl MemoryTaskSource {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
            clock,
        }
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, Vec<TaskRow>> {
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Insert or replace a record by id.
    pub fn upsert(&self, record: TaskRecord) -> Result<()> {
        let row = TaskRow::from_record(&record)?;
        let mut rows = self.rows();
        match rows.iter_mut().find(|r| r.id_hint().as_deref() == Some(record.id.as_str())) {
            Some(existing) => *existing = row,
            None => rows.push(row),
        }
        Ok(())
    }

    /// Insert a raw row verbatim, valid or not.
    pub fn push_raw(&self, row: serde_json::Value) {
        self.rows().push(TaskRow(row));
    }

    pub fn remove(&self, id: &str) {
        self.rows().retain(|row| row.id_hint().as_deref() != Some(id));
    }

    /// Fail the next `count` fetches with [`Error::SourceUnavailable`].
    pub fn fail_next_fetches(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of fetch calls so far, failed ones included.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl TaskSource for MemoryTaskSource {
    fn fetch(&self, query: &TaskQuery) -> Result<Vec<TaskRow>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(Error::SourceUnavailable("injected fetch failure".to_string()));
        }

        let mut rows: Vec<(Option<TaskRecord>, TaskRow)> = self
            .rows()
            .iter()
            .filter_map(|row| match row.decode() {
                Ok(record) if query.matches(&record) => Some((Some(record), row.clone())),
                Ok(_) => None,
                Err(_) => Some((None, row.clone())),
            })
            .collect();
        sort_rows_by_recency(&mut rows);
        Ok(rows.into_iter().map(|(_, row)| row).collect())
    }

    fn update_fields(&self, id: &str, update: &TaskUpdate) -> Result<TaskRecord> {
        let now = self.clock.now();
        let mut rows = self.rows();
        let row = rows
            .iter_mut()
            .find(|row| row.id_hint().as_deref() == Some(id))
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        let mut record = row.decode()?;
        update.apply(&mut record, now);
        *row = TaskRow::from_record(&record)?;
        Ok(record)
    }
}
