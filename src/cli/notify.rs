//! leadline notify command implementation
//!
//! One-shot commands build a fresh reconciler, so their first tick is always
//! a bootstrap tick. `watch` keeps one reconciler alive across ticks.

use std::path::Path;
use std::sync::Arc;

use super::AppContext;
use crate::alert::{AlertPresenter, AlertRules, JsonlPresenter, TerminalPresenter};
use crate::config::parse_duration;
use crate::error::{Error, Result};
use crate::notification::NotificationEvent;
use crate::output::{emit_success, HumanOutput};
use crate::poller::Poller;
use crate::read_markers::KvReadMarkerStore;
use crate::reconciler::{Reconciler, ReconcilerSettings, TickOutcome};
use crate::surface::{self, NotificationCenter};
use crate::task_store::FileTaskSource;

#[derive(serde::Serialize)]
struct NotifyReport {
    user: String,
    privileged: bool,
    unread_count: usize,
    notifications: Vec<NotificationEvent>,
}

#[derive(serde::Serialize)]
struct ReadReport {
    marked: usize,
    unread_count: usize,
}

fn terminal_presenter(ctx: &AppContext) -> Result<Arc<dyn AlertPresenter>> {
    let rules = AlertRules::from_config(&ctx.config.alerts)?;
    Ok(Arc::new(TerminalPresenter::stderr(rules, Arc::clone(&ctx.clock))))
}

fn jsonl_presenter(ctx: &AppContext, path: &Path) -> Result<Arc<dyn AlertPresenter>> {
    let rules = AlertRules::from_config(&ctx.config.alerts)?;
    let clock = Arc::clone(&ctx.clock);
    if path == Path::new("-") {
        return Ok(Arc::new(JsonlPresenter::stdout(rules, clock)));
    }
    Ok(Arc::new(JsonlPresenter::file(path, rules, clock)?))
}

fn build_center(
    ctx: &AppContext,
    presenter: Arc<dyn AlertPresenter>,
) -> Result<NotificationCenter> {
    ctx.require_user()?;
    let reconciler = Reconciler::new(
        Arc::new(FileTaskSource::new(ctx.storage.clone(), Arc::clone(&ctx.clock))),
        Arc::new(KvReadMarkerStore::new(
            ctx.storage.kv(),
            ctx.config.notifications.read_key.clone(),
        )),
        presenter,
        Arc::clone(&ctx.clock),
        ReconcilerSettings::from_config(&ctx.config.notifications)?,
    );
    Ok(NotificationCenter::new(surface::share(reconciler), ctx.viewer.clone()))
}

fn refresh(center: &NotificationCenter) -> Result<()> {
    match center.refresh()? {
        TickOutcome::Skipped { reason } => Err(Error::SourceUnavailable(reason)),
        TickOutcome::Idle => Err(Error::UserRequired),
        TickOutcome::Applied(_) | TickOutcome::Discarded => Ok(()),
    }
}

fn report(ctx: &AppContext, center: &NotificationCenter, command: &str) -> Result<()> {
    let notifications = center.notifications()?;
    let unread_count = center.unread_count()?;
    let user = ctx.require_user()?.to_string();

    let mut human = HumanOutput::new(format!(
        "leadline notifications for {user}: {unread_count} unread"
    ));
    human.push_summary("listed", notifications.len().to_string());
    human.push_summary("role", if ctx.viewer.privileged { "privileged" } else { "member" });
    for event in &notifications {
        let marker = if event.is_read { " " } else { "*" };
        human.push_detail(format!("{marker} {} {}", event.id, event.summary()));
    }
    if unread_count > 0 {
        human.push_next_step("leadline notify read-all");
    }

    let data = NotifyReport {
        user,
        privileged: ctx.viewer.privileged,
        unread_count,
        notifications,
    };
    emit_success(ctx.output, command, &data, Some(&human))
}

pub fn run_poll(ctx: &AppContext) -> Result<()> {
    let center = build_center(ctx, terminal_presenter(ctx)?)?;
    refresh(&center)?;
    report(ctx, &center, "notify poll")
}

pub fn run_read(ctx: &AppContext, id: &str) -> Result<()> {
    let center = build_center(ctx, terminal_presenter(ctx)?)?;
    refresh(&center)?;

    let listed = center.notifications()?.iter().any(|event| event.id == id);
    let flipped = center.mark_as_read(id)?;

    let data = ReadReport {
        marked: usize::from(flipped),
        unread_count: center.unread_count()?,
    };
    let mut human = HumanOutput::new(format!("leadline notify read: {id}"));
    human.push_summary("unread", data.unread_count.to_string());
    if !listed {
        human.push_warning(format!("{id} is not in the current notification list"));
    } else if !flipped {
        human.push_warning(format!("{id} was already read"));
    }
    emit_success(ctx.output, "notify read", &data, Some(&human))
}

pub fn run_read_all(ctx: &AppContext) -> Result<()> {
    let center = build_center(ctx, terminal_presenter(ctx)?)?;
    refresh(&center)?;
    let marked = center.mark_all_as_read()?;

    let data = ReadReport {
        marked,
        unread_count: center.unread_count()?,
    };
    let mut human = HumanOutput::new(format!("leadline notify read-all: {marked} marked"));
    human.push_summary("unread", data.unread_count.to_string());
    emit_success(ctx.output, "notify read-all", &data, Some(&human))
}

pub fn run_watch(
    ctx: &AppContext,
    ticks: Option<usize>,
    interval: Option<String>,
    alert_log: Option<&Path>,
) -> Result<()> {
    ctx.require_user()?;
    if ctx.output.json && alert_log == Some(Path::new("-")) {
        return Err(Error::InvalidArgument(
            "--alert-log - shares stdout with --json output; pass a file path".to_string(),
        ));
    }
    let presenter = match alert_log {
        Some(path) => jsonl_presenter(ctx, path)?,
        None => terminal_presenter(ctx)?,
    };
    let center = build_center(ctx, presenter)?;
    let interval = match interval {
        Some(raw) => parse_duration(&raw)?,
        None => ctx.config.notifications.interval_for(ctx.viewer.privileged)?,
    };

    let mut poller = Poller::with_interval(
        Arc::clone(center.reconciler()),
        center.viewer().clone(),
        interval,
    )?;
    if let Some(ticks) = ticks {
        poller = poller.max_ticks(ticks);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let quiet = ctx.output.quiet || ctx.output.json;

    runtime.block_on(async {
        let handle = poller.spawn()?;
        let mut feed = handle.subscribe();
        let mut last_unread = None;

        loop {
            tokio::select! {
                changed = feed.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let unread = feed.borrow_and_update().unread_count;
                    if last_unread != Some(unread) && !quiet {
                        eprintln!("unread: {unread}");
                    }
                    last_unread = Some(unread);
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::debug!("interrupted; stopping poller");
                    break;
                }
            }
        }

        handle.stop().await;
        Ok::<_, Error>(())
    })?;

    report(ctx, &center, "notify watch")
}
