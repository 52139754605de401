//! leadline activity command implementation

use super::AppContext;
use crate::activity::{ActivityEntry, ActivityKind, ActivityLog};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};

#[derive(serde::Serialize)]
struct ActivityListReport {
    entries: Vec<ActivityEntry>,
    total: usize,
}

pub fn run_add(ctx: &AppContext, task_id: &str, kind: &str, note: Option<String>) -> Result<()> {
    let kind: ActivityKind = kind.parse()?;
    if kind == ActivityKind::StatusChange {
        return Err(Error::InvalidArgument(
            "status changes are recorded by `leadline task update --status`".to_string(),
        ));
    }

    let mut entry = ActivityEntry::new(kind, task_id, ctx.clock.now());
    entry.actor = ctx.viewer.user_id.clone();
    entry.note = note;
    ActivityLog::new(ctx.storage.clone()).record(&entry)?;

    let mut human = HumanOutput::new(format!("leadline activity add: {kind} on {task_id}"));
    if let Some(note) = &entry.note {
        human.push_summary("note", note.clone());
    }
    emit_success(ctx.output, "activity add", &entry, Some(&human))
}

pub fn run_list(ctx: &AppContext, task_id: Option<&str>) -> Result<()> {
    let entries = ActivityLog::new(ctx.storage.clone()).entries(task_id)?;

    let mut human = HumanOutput::new(format!("leadline activity: {}", entries.len()));
    for entry in &entries {
        let mut line = format!("{} {} {}", entry.at.to_rfc3339(), entry.task_id, entry.kind);
        if let (Some(old), Some(new)) = (entry.old_status, entry.new_status) {
            line.push_str(&format!(" {old} -> {new}"));
        }
        if let Some(note) = &entry.note {
            line.push_str(&format!(": {note}"));
        }
        human.push_detail(line);
    }

    let report = ActivityListReport {
        total: entries.len(),
        entries,
    };
    emit_success(ctx.output, "activity list", &report, Some(&human))
}
