//! Unit tests for the reservation engine.

#![cfg(test)]

use chrono::{TimeDelta, TimeZone, Utc};

use super::*;
use crate::db::MemoryStateStore;
use crate::models::TimeInterval;

fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

fn req(device: &str, start: i64, end: i64) -> SlotRequest {
    SlotRequest::new(device, at(start), at(end))
}

fn manager(now: i64) -> ScheduleManager {
    ScheduleManager::new(TimeDelta::seconds(5), at(now), None)
}

fn request(
    m: &mut ScheduleManager,
    agent: &str,
    task: &str,
    priority: &str,
    requests: &[SlotRequest],
    now: i64,
) -> RequestResult {
    m.request_slots(Some(agent), Some(task), requests, Some(priority), at(now))
}

#[test]
fn test_validation_order() {
    let mut m = manager(0);
    let ok: &[SlotRequest] = &[req("d1", 0, 10)];
    let empty: &[SlotRequest] = &[];
    assert!(request(&mut m, "a", "t1", "LOW", ok, 0).success);

    let cases: Vec<(Option<&str>, Option<&str>, &[SlotRequest], Option<&str>, &str)> = vec![
        (Some("a"), Some("t1"), ok, Some("LOW"), "TASK_ID_ALREADY_EXISTS"),
        (Some("a"), None, ok, Some("LOW"), "MISSING_TASK_ID"),
        (
            Some("a"),
            Some(""),
            ok,
            Some("LOW"),
            "MALFORMED_REQUEST: TypeError: taskid must be a nonempty string",
        ),
        (Some("a"), Some("t2"), ok, None, "MISSING_PRIORITY"),
        (Some("a"), Some("t2"), ok, Some("MEDIUM"), "INVALID_PRIORITY"),
        (None, Some("t2"), ok, Some("LOW"), "MISSING_AGENT_ID"),
        (
            Some(""),
            Some("t2"),
            ok,
            Some("LOW"),
            "MALFORMED_REQUEST: TypeError: agentid must be a nonempty string",
        ),
        (Some("a"), Some("t2"), empty, Some("LOW"), "MALFORMED_REQUEST_EMPTY"),
        // An existing id wins over every later check.
        (None, Some("t1"), empty, None, "TASK_ID_ALREADY_EXISTS"),
    ];

    for (agent, task, requests, priority, expected) in cases {
        let result = m.request_slots(agent, task, requests, priority, at(0));
        assert!(!result.success);
        assert_eq!(result.info, expected);
    }
    assert_eq!(m.len(), 1);
}

#[test]
fn test_malformed_requests() {
    let mut m = manager(0);

    let result = request(&mut m, "a", "t1", "LOW", &[req("", 0, 10)], 0);
    assert_eq!(
        result.info,
        "MALFORMED_REQUEST: ValueError: device must be a nonempty string"
    );

    let result = request(&mut m, "a", "t1", "LOW", &[req("d1", 10, 0)], 0);
    assert!(result.info.starts_with("MALFORMED_REQUEST: ValueError: Invalid start and end values"));
}

#[test]
fn test_self_conflict() {
    let mut m = manager(0);
    let result = request(
        &mut m,
        "a",
        "t1",
        "LOW",
        &[req("d1", 0, 1800), req("d1", 900, 2700)],
        0,
    );
    assert!(!result.success);
    assert_eq!(result.info, "REQUEST_CONFLICTS_WITH_SELF");
    assert!(m.is_empty());
}

#[test]
fn test_back_to_back_requests_succeed() {
    let mut m = manager(0);
    assert!(request(&mut m, "a", "t1", "LOW", &[req("d1", 0, 10)], 0).success);
    assert!(request(&mut m, "b", "t2", "LOW", &[req("d1", 10, 20)], 0).success);
    assert_eq!(m.len(), 2);
}

#[test]
fn test_conflict_detail_names_holder() {
    let mut m = manager(0);
    request(&mut m, "a", "t1", "LOW", &[req("d1", 0, 20), req("d2", 0, 20)], 0);

    let result = request(&mut m, "b", "t2", "LOW", &[req("d1", 5, 25)], 0);
    assert!(!result.success);
    assert_eq!(result.info, "CONFLICTS_WITH_EXISTING_SCHEDULES");

    let conflicts = result.conflicts().unwrap();
    let held = &conflicts["a"]["t1"];
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].device, "d1");
    assert_eq!((held[0].start, held[0].end), (at(0), at(20)));
}

#[test]
fn test_high_preempts_pending_low() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 10, 20)], 0);
    assert_eq!(m.task("A").unwrap().state(), TaskState::PreRun);

    let result = request(&mut m, "c", "C", "HIGH", &[req("d1", 15, 25)], 0);
    assert!(result.success);
    let preempted = result.preempted().unwrap();
    assert!(preempted.contains(&PreemptedTask {
        agent_id: "a".into(),
        task_id: "A".into()
    }));
    assert!(m.task("A").is_none());
}

#[test]
fn test_high_preempts_running_low_preempt() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW_PREEMPT", &[req("d1", 10, 20)], 0);

    let result = request(&mut m, "c", "C", "HIGH", &[req("d1", 15, 30)], 12);
    assert!(result.success);

    let a = m.task("A").unwrap();
    assert_eq!(a.state(), TaskState::Preempted);
    assert_eq!(a.bounding_window(), TimeInterval::new(at(12), at(17)).unwrap());
}

#[test]
fn test_running_low_is_protected() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 10, 20)], 0);

    let result = request(&mut m, "c", "C", "HIGH", &[req("d1", 15, 30)], 12);
    assert!(!result.success);
    assert_eq!(result.info, "CONFLICTS_WITH_EXISTING_SCHEDULES");
    assert_eq!(m.task("A").unwrap().state(), TaskState::Running);
}

#[test]
fn test_high_never_preempts_high() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "HIGH", &[req("d1", 10, 20)], 0);
    let result = request(&mut m, "c", "C", "HIGH", &[req("d1", 15, 30)], 0);
    assert!(!result.success);
}

#[test]
fn test_mixed_conflicts_reject_without_mutation() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 10, 20)], 0);
    request(&mut m, "b", "B", "HIGH", &[req("d2", 10, 20)], 0);

    let result = request(&mut m, "c", "C", "HIGH", &[req("d1", 10, 20), req("d2", 10, 20)], 0);
    assert!(!result.success);
    assert!(result.conflicts().unwrap().contains_key("b"));
    assert!(!result.conflicts().unwrap().contains_key("a"));
    assert_eq!(m.task("A").unwrap().state(), TaskState::PreRun);
}

#[test]
fn test_cancel_task() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 0, 20)], 0);

    let result = m.cancel_task("b", "A", at(1));
    assert_eq!(result.info, "AGENT_ID_TASK_ID_MISMATCH");
    let result = m.cancel_task("a", "missing", at(1));
    assert_eq!(result.info, "TASK_ID_DOES_NOT_EXIST");

    assert!(m.get_schedule_state(at(1)).contains_key("d1"));
    assert!(m.cancel_task("a", "A", at(1)).success);
    assert!(m.get_schedule_state(at(1)).is_empty());
}

#[test]
fn test_schedule_state_reports_remaining_time() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 0, 20), req("d2", 30, 40)], 0);
    let now = at(5) + TimeDelta::milliseconds(500);

    let state = m.get_schedule_state(now);
    assert_eq!(state.len(), 1);
    let d1 = &state["d1"];
    assert_eq!(d1.agent_id, "a");
    assert_eq!(d1.task_id, "A");
    assert!((d1.time_remaining - 14.5).abs() < 1e-9);
}

#[test]
fn test_schedule_state_prefers_preempted_holder() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW_PREEMPT", &[req("d1", 10, 20)], 0);
    assert!(request(&mut m, "c", "C", "HIGH", &[req("d1", 12, 30)], 12).success);

    let state = m.get_schedule_state(at(13));
    assert_eq!(state["d1"].task_id, "A");

    let state = m.get_schedule_state(at(17));
    assert_eq!(state["d1"].task_id, "C");
    assert!(m.task("A").is_none());
}

#[test]
fn test_next_event_time() {
    let mut m = manager(0);
    assert_eq!(m.get_next_event_time(at(0)), None);
    request(&mut m, "a", "A", "LOW", &[req("d1", 10, 20)], 0);
    request(&mut m, "b", "B", "LOW", &[req("d2", 5, 8)], 0);
    assert_eq!(m.get_next_event_time(at(0)), Some(at(5)));
    assert_eq!(m.get_next_event_time(at(9)), Some(at(10)));
}

#[test]
fn test_next_update_time_caps_at_publish_interval() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 100, 200)], 0);
    assert_eq!(m.next_update_time(at(0), TimeDelta::seconds(60)), at(60));
    assert_eq!(m.next_update_time(at(50), TimeDelta::seconds(60)), at(100));
}

#[test]
fn test_cleanup_drops_finished_tasks() {
    let mut m = manager(0);
    request(&mut m, "a", "A", "LOW", &[req("d1", 0, 10)], 0);
    m.cleanup(at(10));
    assert!(m.is_empty());
}

#[test]
fn test_state_survives_restart() {
    let store = MemoryStateStore::new();
    let mut m = ScheduleManager::new(TimeDelta::seconds(5), at(0), Some(Box::new(store.clone())));
    request(&mut m, "a", "A", "LOW_PREEMPT", &[req("d1", 10, 20)], 0);
    request(&mut m, "c", "C", "HIGH", &[req("d1", 15, 30)], 12);
    assert_eq!(store.save_count(), 2);

    let mut restarted =
        ScheduleManager::new(TimeDelta::seconds(5), at(13), Some(Box::new(store.clone())));
    assert_eq!(restarted.task("A").unwrap().state(), TaskState::Preempted);
    assert_eq!(restarted.task("C").unwrap().priority(), Priority::High);
    assert_eq!(restarted.get_schedule_state(at(13))["d1"].task_id, "A");
}

#[test]
fn test_failed_save_does_not_fail_request() {
    let store = MemoryStateStore::new();
    store.set_failing(true);
    let mut m = ScheduleManager::new(TimeDelta::seconds(5), at(0), Some(Box::new(store.clone())));
    assert!(request(&mut m, "a", "A", "LOW", &[req("d1", 0, 10)], 0).success);
    assert!(store.snapshot().is_none());
}

#[test]
fn test_corrupt_snapshot_starts_empty() {
    let store = MemoryStateStore::with_snapshot("\u{0}\u{1}garbage");
    let mut m = ScheduleManager::new(TimeDelta::seconds(5), at(0), Some(Box::new(store)));
    assert!(m.is_empty());
    assert!(request(&mut m, "a", "A", "LOW", &[req("d1", 0, 10)], 0).success);
}

#[test]
fn test_set_grace_period() {
    let mut m = manager(0);
    m.set_grace_period(30);
    assert_eq!(m.grace_time(), TimeDelta::seconds(30));
}

#[test]
#[should_panic(expected = "held by both")]
fn test_schedule_state_panics_on_double_booking() {
    let mut m = manager(0);
    for (task_id, start) in [("A", 0), ("B", 5)] {
        let task = Task::new("a", Priority::Low, &[req("d1", start, start + 20)], at(10)).unwrap();
        m.tasks.insert(task_id.to_string(), task);
    }
    m.get_schedule_state(at(10));
}

#[test]
fn test_grace_time_is_capped() {
    let mut m = ScheduleManager::new(TimeDelta::MAX, at(0), None);
    assert_eq!(m.grace_time(), TimeDelta::seconds(i64::from(u32::MAX)));

    request(&mut m, "a", "A", "LOW_PREEMPT", &[req("d1", 0, 20)], 0);
    assert!(request(&mut m, "c", "C", "HIGH", &[req("d1", 5, 30)], 5).success);
    let a = m.task("A").unwrap();
    assert_eq!(a.state(), TaskState::Preempted);
    assert_eq!(a.devices()["d1"].slots(), &[TimeInterval::new(at(5), at(20)).unwrap()]);

    let m = ScheduleManager::new(TimeDelta::seconds(-5), at(0), None);
    assert_eq!(m.grace_time(), TimeDelta::zero());
}
