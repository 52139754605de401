#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use leadline::alert::RecordingPresenter;
use leadline::clock::{Clock, ManualClock};
use leadline::read_markers::KvReadMarkerStore;
use leadline::reconciler::{Reconciler, ReconcilerSettings, TickOutcome, TickSummary, Viewer};
use leadline::storage::Storage;
use leadline::task::{Priority, TaskRecord, TaskSource, TaskStatus, TaskUpdate};
use leadline::task_store::MemoryTaskSource;
use tempfile::TempDir;

pub const READ_KEY: &str = "leadline.notifications.read";

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn admin() -> Viewer {
    Viewer::new("lead-1", true)
}

pub fn rep(id: &str) -> Viewer {
    Viewer::new(id, false)
}

/// In-memory source, recording presenter and file-backed read markers
/// sharing one manual clock.
pub struct Harness {
    pub dir: TempDir,
    pub clock: ManualClock,
    pub source: MemoryTaskSource,
    pub presenter: RecordingPresenter,
    pub markers: Arc<KvReadMarkerStore>,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = Storage::new(dir.path());
        storage.init().expect("init storage");

        let clock = ManualClock::new(start());
        let source = MemoryTaskSource::new(Arc::new(clock.clone()));
        let presenter = RecordingPresenter::new(Arc::new(clock.clone()));
        let markers = Arc::new(KvReadMarkerStore::new(storage.kv(), READ_KEY));

        Self {
            dir,
            clock,
            source,
            presenter,
            markers,
        }
    }

    /// A reconciler mounted at the current clock time.
    pub fn mount(&self) -> Reconciler {
        self.mount_with(ReconcilerSettings::default())
    }

    pub fn mount_with(&self, settings: ReconcilerSettings) -> Reconciler {
        Reconciler::new(
            Arc::new(self.source.clone()),
            self.markers.clone(),
            Arc::new(self.presenter.clone()),
            Arc::new(self.clock.clone()),
            settings,
        )
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Insert a never-edited pending task created `age` ago.
    pub fn add_task(&self, id: &str, assignee: Option<&str>, age: Duration) -> TaskRecord {
        let at = self.now() - age;
        let record = TaskRecord {
            id: id.to_string(),
            title: format!("Follow up {id}"),
            priority: Priority::High,
            status: TaskStatus::Pending,
            assignee_id: assignee.map(str::to_string),
            assignee_name: None,
            assigner_name: Some("Dana".to_string()),
            updated_by_name: None,
            due_date: None,
            created_at: at,
            updated_at: at,
        };
        self.source.upsert(record.clone()).expect("upsert");
        record
    }

    /// Move the clock forward 30s, then change the task's status.
    pub fn set_status(&self, id: &str, status: TaskStatus) -> TaskRecord {
        self.clock.advance(Duration::seconds(30));
        let update = TaskUpdate {
            status: Some(status),
            updated_by_name: Some("Sam".to_string()),
            ..TaskUpdate::default()
        };
        self.source.update_fields(id, &update).expect("update")
    }
}

/// Tick and insist it applied.
pub fn tick(reconciler: &mut Reconciler, viewer: &Viewer) -> TickSummary {
    match reconciler.poll(viewer) {
        TickOutcome::Applied(summary) => summary,
        other => panic!("expected applied tick, got {other:?}"),
    }
}
