mod support;

use chrono::Duration;
use leadline::config::BootstrapOldStatus;
use leadline::notification::NotificationKind;
use leadline::read_markers::ReadMarkerStore;
use leadline::reconciler::{ReconcilerSettings, TickOutcome, Viewer};
use leadline::surface::{self, NotificationCenter};
use leadline::task::TaskStatus;
use serde_json::json;

use support::{admin, rep, tick, Harness};

#[test]
fn lead_and_rep_walk_through_a_task_lifecycle() {
    let h = Harness::new();
    h.add_task("t1", Some("rep-1"), Duration::minutes(10));
    let lead = NotificationCenter::new(surface::share(h.mount()), admin());
    let other_rep = NotificationCenter::new(surface::share(h.mount()), rep("rep-2"));

    // Tick 1: bootstrap, never-edited task yields nothing.
    match lead.refresh().unwrap() {
        TickOutcome::Applied(summary) => {
            assert!(summary.bootstrap);
            assert_eq!(summary.events, 0);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    other_rep.refresh().unwrap();
    assert_eq!(lead.unread_count().unwrap(), 0);

    // Tick 2: pending -> in_progress.
    h.set_status("t1", TaskStatus::InProgress);
    lead.refresh().unwrap();
    other_rep.refresh().unwrap();

    let events = lead.notifications().unwrap();
    assert_eq!(events.len(), 1);
    let first = events[0].clone();
    assert_eq!(first.task_id, "t1");
    assert_eq!(first.kind, NotificationKind::StatusChange);
    assert_eq!(first.old_status, Some(TaskStatus::Pending));
    assert_eq!(first.new_status, Some(TaskStatus::InProgress));
    assert_eq!(first.updated_by.as_deref(), Some("Sam"));
    assert_eq!(lead.unread_count().unwrap(), 1);
    assert!(other_rep.notifications().unwrap().is_empty());
    assert_eq!(h.presenter.event_ids(), vec![first.id.clone()]);

    // Tick 3: acknowledge.
    lead.mark_as_read(&first.id).unwrap();
    assert_eq!(lead.unread_count().unwrap(), 0);
    assert!(h.markers.is_read(&first.id).unwrap());

    // Tick 4: in_progress -> completed.
    h.set_status("t1", TaskStatus::Completed);
    lead.refresh().unwrap();

    let events = lead.notifications().unwrap();
    assert_eq!(events.len(), 1);
    let second = &events[0];
    assert_ne!(second.id, first.id);
    assert_eq!(second.old_status, Some(TaskStatus::InProgress));
    assert_eq!(second.new_status, Some(TaskStatus::Completed));
    assert!(!second.is_read);
    assert_eq!(lead.unread_count().unwrap(), 1);
    assert!(h.markers.is_read(&first.id).unwrap());
}

#[test]
fn same_transition_keeps_its_id_across_restarts() {
    let h = Harness::new();
    h.add_task("t1", None, Duration::hours(2));
    h.set_status("t1", TaskStatus::InProgress);
    h.clock.advance(Duration::minutes(5));

    let mut first = h.mount();
    tick(&mut first, &admin());
    let first_ids: Vec<String> = first.notifications().iter().map(|e| e.id.clone()).collect();

    h.clock.advance(Duration::minutes(1));
    let mut second = h.mount();
    tick(&mut second, &admin());
    let second_ids: Vec<String> = second.notifications().iter().map(|e| e.id.clone()).collect();

    assert_eq!(first_ids.len(), 1);
    assert_eq!(first_ids, second_ids);
}

#[test]
fn bootstrap_lists_history_without_alerting() {
    let h = Harness::new();
    for id in ["t1", "t2", "t3"] {
        h.add_task(id, Some("rep-1"), Duration::hours(3));
        h.set_status(id, TaskStatus::InProgress);
    }
    h.clock.advance(Duration::minutes(1));

    let mut lead = h.mount();
    let summary = tick(&mut lead, &admin());
    assert!(summary.bootstrap);
    assert_eq!(summary.events, 3);
    assert_eq!(summary.alerted, 0);
    assert!(lead
        .notifications()
        .iter()
        .all(|e| e.old_status == Some(TaskStatus::Pending)));

    let mut rep_one = h.mount();
    let summary = tick(&mut rep_one, &rep("rep-1"));
    assert_eq!(summary.events, 3);
    assert_eq!(summary.alerted, 0);

    assert!(h.presenter.alerts().is_empty());
}

#[test]
fn bootstrap_skips_records_inside_fresh_threshold() {
    let h = Harness::new();
    let mut record = h.add_task("t1", None, Duration::hours(1));
    record.updated_at = record.created_at + Duration::seconds(2);
    record.status = TaskStatus::InProgress;
    h.source.upsert(record).unwrap();

    let mut lead = h.mount();
    let summary = tick(&mut lead, &admin());
    assert_eq!(summary.events, 0);
    assert_eq!(lead.snapshot().get("t1"), Some(TaskStatus::InProgress));
}

#[test]
fn bootstrap_old_status_can_be_omitted() {
    let h = Harness::new();
    h.add_task("t1", None, Duration::hours(1));
    h.set_status("t1", TaskStatus::Cancelled);

    let mut lead = h.mount_with(ReconcilerSettings {
        bootstrap_old_status: BootstrapOldStatus::Omit,
        ..ReconcilerSettings::default()
    });
    tick(&mut lead, &admin());

    let event = &lead.notifications()[0];
    assert_eq!(event.old_status, None);
    assert_eq!(event.new_status, Some(TaskStatus::Cancelled));
}

#[test]
fn new_assignment_alerts_exactly_once() {
    let h = Harness::new();
    let mut reconciler = h.mount();
    let viewer = rep("rep-1");
    assert_eq!(tick(&mut reconciler, &viewer).events, 0);

    h.clock.advance(Duration::seconds(10));
    h.add_task("t9", Some("rep-1"), Duration::zero());
    h.clock.advance(Duration::seconds(1));

    let summary = tick(&mut reconciler, &viewer);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.alerted, 1);
    assert_eq!(reconciler.notifications()[0].kind, NotificationKind::Assignment);
    assert_eq!(reconciler.notifications()[0].assigned_by.as_deref(), Some("Dana"));

    h.clock.advance(Duration::seconds(30));
    let summary = tick(&mut reconciler, &viewer);
    assert_eq!(summary.events, 1);
    assert_eq!(summary.alerted, 0);
    assert_eq!(h.presenter.alerts().len(), 1);
}

#[test]
fn members_only_see_their_own_assignments() {
    let h = Harness::new();
    h.add_task("mine", Some("rep-1"), Duration::hours(1));
    h.add_task("theirs", Some("rep-2"), Duration::hours(1));
    h.add_task("nobody", None, Duration::hours(1));
    h.set_status("theirs", TaskStatus::Completed);

    let mut reconciler = h.mount();
    tick(&mut reconciler, &rep("rep-1"));

    let ids: Vec<&str> = reconciler
        .notifications()
        .iter()
        .map(|e| e.task_id.as_str())
        .collect();
    assert_eq!(ids, vec!["mine"]);
    assert!(reconciler.snapshot().is_empty());
    assert!(!reconciler.snapshot().is_seeded());
}

#[test]
fn read_state_survives_a_remount() {
    let h = Harness::new();
    h.add_task("t1", Some("rep-1"), Duration::hours(1));
    h.add_task("t2", Some("rep-1"), Duration::hours(1));

    let center = NotificationCenter::new(surface::share(h.mount()), rep("rep-1"));
    center.refresh().unwrap();
    assert_eq!(center.unread_count().unwrap(), 2);
    assert_eq!(center.mark_all_as_read().unwrap(), 2);
    assert_eq!(center.unread_count().unwrap(), 0);

    let mut remounted = h.mount();
    let summary = tick(&mut remounted, &rep("rep-1"));
    assert_eq!(summary.events, 2);
    assert_eq!(summary.unread_count, 0);
    assert!(remounted.notifications().iter().all(|e| e.is_read));
}

#[test]
fn mark_all_read_never_drops_existing_markers() {
    let h = Harness::new();
    h.markers.mark_read("status_change-gone-1").unwrap();
    h.add_task("t1", Some("rep-1"), Duration::hours(1));

    let center = NotificationCenter::new(surface::share(h.mount()), rep("rep-1"));
    center.refresh().unwrap();
    center.mark_all_as_read().unwrap();

    let read = h.markers.load().unwrap();
    assert!(read.contains("status_change-gone-1"));
    assert_eq!(read.len(), 2);
}

#[test]
fn events_outside_the_window_drop_out() {
    let h = Harness::new();
    h.add_task("t1", Some("rep-1"), Duration::days(1));

    let mut reconciler = h.mount();
    assert_eq!(tick(&mut reconciler, &rep("rep-1")).events, 1);

    h.clock.advance(Duration::days(7));
    let summary = tick(&mut reconciler, &rep("rep-1"));
    assert_eq!(summary.events, 0);
    assert!(reconciler.notifications().is_empty());
}

#[test]
fn failed_fetch_keeps_previous_list() {
    let h = Harness::new();
    h.add_task("t1", Some("rep-1"), Duration::hours(1));
    let mut reconciler = h.mount();
    tick(&mut reconciler, &rep("rep-1"));
    let before = reconciler.feed().clone();
    let last_poll = reconciler.last_successful_poll();

    h.source.fail_next_fetches(1);
    h.clock.advance(Duration::seconds(30));
    assert!(matches!(
        reconciler.poll(&rep("rep-1")),
        TickOutcome::Skipped { .. }
    ));
    assert_eq!(reconciler.feed(), &before);
    assert_eq!(reconciler.last_successful_poll(), last_poll);

    tick(&mut reconciler, &rep("rep-1"));
    assert_eq!(h.source.fetch_count(), 3);
}

#[test]
fn failed_first_tick_leaves_next_tick_as_bootstrap() {
    let h = Harness::new();
    h.add_task("t1", None, Duration::hours(1));
    h.set_status("t1", TaskStatus::InProgress);
    let mut lead = h.mount();

    h.source.fail_next_fetches(1);
    assert!(matches!(lead.poll(&admin()), TickOutcome::Skipped { .. }));
    assert!(!lead.snapshot().is_seeded());

    h.clock.advance(Duration::seconds(15));
    let summary = tick(&mut lead, &admin());
    assert!(summary.bootstrap);
    assert_eq!(summary.alerted, 0);
}

#[test]
fn malformed_rows_are_skipped_individually() {
    let h = Harness::new();
    h.add_task("good", Some("rep-1"), Duration::hours(1));
    h.source.push_raw(json!({ "id": "broken", "assignee_id": "rep-1" }));
    h.source.push_raw(json!({
        "id": "inverted",
        "title": "Clock skew",
        "status": "pending",
        "assignee_id": "rep-1",
        "created_at": "2026-03-02T08:00:00Z",
        "updated_at": "2026-03-02T07:00:00Z",
    }));

    let mut reconciler = h.mount();
    let summary = tick(&mut reconciler, &rep("rep-1"));
    assert_eq!(summary.skipped_records, 2);
    assert_eq!(summary.events, 1);
    assert_eq!(reconciler.notifications()[0].task_id, "good");
}

#[test]
fn presenter_failure_still_lists_the_event() {
    let h = Harness::new();
    let mut reconciler = h.mount();
    tick(&mut reconciler, &rep("rep-1"));

    h.presenter.set_failing(true);
    h.clock.advance(Duration::seconds(5));
    h.add_task("t1", Some("rep-1"), Duration::zero());
    h.clock.advance(Duration::seconds(5));

    let summary = tick(&mut reconciler, &rep("rep-1"));
    assert_eq!(summary.alerted, 0);
    assert_eq!(summary.unread_count, 1);
    assert!(h.presenter.alerts().is_empty());
}

#[test]
fn no_user_means_no_fetch() {
    let h = Harness::new();
    let mut reconciler = h.mount();

    assert_eq!(reconciler.poll(&Viewer::default()), TickOutcome::Idle);
    assert_eq!(reconciler.poll(&Viewer::new("  ", true)), TickOutcome::Idle);
    assert_eq!(h.source.fetch_count(), 0);
}

#[test]
fn shut_down_reconciler_discards_in_flight_tick() {
    let h = Harness::new();
    h.add_task("t1", Some("rep-1"), Duration::hours(1));
    let mut reconciler = h.mount();

    reconciler.liveness().shutdown();
    assert_eq!(reconciler.poll(&rep("rep-1")), TickOutcome::Discarded);
    assert_eq!(h.source.fetch_count(), 1);
    assert!(reconciler.notifications().is_empty());
}

#[test]
fn notifications_sort_newest_first() {
    let h = Harness::new();
    h.add_task("older", Some("rep-1"), Duration::hours(5));
    h.add_task("newer", Some("rep-1"), Duration::hours(1));
    h.add_task("middle", Some("rep-1"), Duration::hours(3));

    let center = NotificationCenter::new(surface::share(h.mount()), rep("rep-1"));
    center.refresh().unwrap();

    let order: Vec<String> = center
        .notifications()
        .unwrap()
        .into_iter()
        .map(|e| e.task_id)
        .collect();
    assert_eq!(order, vec!["newer", "middle", "older"]);
}

#[test]
fn mark_as_read_on_unknown_id_still_persists() {
    let h = Harness::new();
    let center = NotificationCenter::new(surface::share(h.mount()), rep("rep-1"));
    center.refresh().unwrap();

    center.mark_as_read("assignment-elsewhere-1").unwrap();
    assert!(h.markers.is_read("assignment-elsewhere-1").unwrap());
    assert_eq!(center.unread_count().unwrap(), 0);
}

#[test]
fn privileged_viewer_gets_no_assignment_events_for_own_tasks() {
    let h = Harness::new();
    h.add_task("own", Some("lead-1"), Duration::hours(2));
    h.set_status("own", TaskStatus::InProgress);
    h.add_task("fresh-own", Some("lead-1"), Duration::hours(1));

    let mut lead = h.mount();
    tick(&mut lead, &admin());
    assert_eq!(lead.notifications().len(), 1);
    assert_eq!(lead.notifications()[0].kind, NotificationKind::StatusChange);

    h.clock.advance(Duration::seconds(10));
    h.add_task("new-own", Some("lead-1"), Duration::zero());
    h.clock.advance(Duration::seconds(1));
    tick(&mut lead, &admin());

    assert!(lead
        .notifications()
        .iter()
        .all(|e| e.kind != NotificationKind::Assignment));
    assert!(h.presenter.alerts().is_empty());
}
