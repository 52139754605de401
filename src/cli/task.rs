//! leadline task command implementation

use std::sync::Arc;

use chrono::NaiveDate;

use super::AppContext;
use crate::activity::{ActivityEntry, ActivityLog};
use crate::error::{Error, Result};
use crate::output::{emit_success, HumanOutput};
use crate::task::{Priority, TaskRecord, TaskSource, TaskStatus, TaskUpdate};
use crate::task_store::{FileTaskSource, NewTask};

pub struct AddOptions {
    pub title: String,
    pub priority: String,
    pub assignee: Option<String>,
    pub assignee_name: Option<String>,
    pub assigner_name: Option<String>,
    pub due: Option<String>,
}

pub struct UpdateOptions {
    pub id: String,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub assignee_name: Option<String>,
    pub by: Option<String>,
}

#[derive(serde::Serialize)]
struct TaskListReport {
    tasks: Vec<TaskRecord>,
    total: usize,
}

fn source(ctx: &AppContext) -> FileTaskSource {
    FileTaskSource::new(ctx.storage.clone(), Arc::clone(&ctx.clock))
}

fn parse_due(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| Error::InvalidArgument(format!("Invalid due date '{raw}'. Expected YYYY-MM-DD")))
}

fn task_line(task: &TaskRecord) -> String {
    let assignee = task
        .assignee_name
        .as_deref()
        .or(task.assignee_id.as_deref())
        .unwrap_or("unassigned");
    format!(
        "{} [{}] {} ({}, {})",
        task.id, task.status, task.title, task.priority, assignee
    )
}

pub fn run_add(ctx: &AppContext, options: AddOptions) -> Result<()> {
    let priority: Priority = options.priority.parse()?;
    let due_date = options.due.as_deref().map(parse_due).transpose()?;

    let task = source(ctx).create(NewTask {
        title: options.title,
        priority,
        status: TaskStatus::Pending,
        assignee_id: options.assignee,
        assignee_name: options.assignee_name,
        assigner_name: options.assigner_name,
        due_date,
    })?;

    let mut human = HumanOutput::new(format!("leadline task add: {}", task.id));
    human.push_summary("title", task.title.clone());
    human.push_summary("priority", task.priority.to_string());
    if let Some(assignee) = &task.assignee_id {
        human.push_summary("assignee", assignee.clone());
    }

    emit_success(ctx.output, "task add", &task, Some(&human))
}

pub fn run_update(ctx: &AppContext, options: UpdateOptions) -> Result<()> {
    let update = TaskUpdate {
        status: options.status.as_deref().map(str::parse::<TaskStatus>).transpose()?,
        priority: options.priority.as_deref().map(str::parse::<Priority>).transpose()?,
        assignee_id: options.assignee.map(Some),
        assignee_name: options.assignee_name.map(Some),
        updated_by_name: options.by.clone(),
        ..TaskUpdate::default()
    };
    if update.is_empty() {
        return Err(Error::InvalidArgument(
            "nothing to update; pass --status, --priority, --assignee or --assignee-name".to_string(),
        ));
    }

    let source = source(ctx);
    let before = source.get(&options.id)?;
    let task = source.update_fields(&options.id, &update)?;

    let mut human = HumanOutput::new(format!("leadline task update: {}", task.id));
    if before.status != task.status {
        let mut entry =
            ActivityEntry::status_change(&task.id, before.status, task.status, task.updated_at);
        entry.actor = options.by;
        ActivityLog::new(ctx.storage.clone()).record(&entry)?;
        human.push_summary("status", format!("{} -> {}", before.status, task.status));
    }
    human.push_detail(task_line(&task));

    emit_success(ctx.output, "task update", &task, Some(&human))
}

pub fn run_list(ctx: &AppContext, assignee: Option<String>) -> Result<()> {
    let tasks: Vec<TaskRecord> = source(ctx)
        .list()?
        .into_iter()
        .filter(|task| match &assignee {
            Some(assignee) => task.is_assigned_to(assignee),
            None => true,
        })
        .collect();

    let mut human = HumanOutput::new(format!("leadline tasks: {}", tasks.len()));
    for task in &tasks {
        human.push_detail(task_line(task));
    }

    let report = TaskListReport {
        total: tasks.len(),
        tasks,
    };
    emit_success(ctx.output, "task list", &report, Some(&human))
}
