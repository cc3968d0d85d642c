// tests/scheduler_control.rs

use catin::engine::CoreCommand;
use catin::errors::CatinError;
use catin::task::{SuspendedFrom, TaskState};
use catin_test_utils::builders::{
    SchedulerConfigBuilder, TEST_DAEMON_PID, TaskSpecBuilder, named, sequential,
};
use catin_test_utils::harness::Harness;

fn names(list: &[&str]) -> Option<Vec<String>> {
    Some(list.iter().map(|s| s.to_string()).collect())
}

fn one_device_harness() -> Harness {
    Harness::new(SchedulerConfigBuilder::new().device(0, 8_000).scheduler())
}

#[test]
fn kill_all_cancels_running_and_waiting_tasks() {
    let mut h = one_device_harness();
    h.create(vec![
        TaskSpecBuilder::new("a").name("r1").devices(1, 4_000).single(),
        TaskSpecBuilder::new("b").name("r2").devices(1, 4_000).single(),
        TaskSpecBuilder::new("c").name("w").devices(1, 4_000).single(),
    ]);
    assert_eq!(h.tick(), vec!["r1", "r2"]);
    assert_eq!(h.state("w"), TaskState::Waiting);
    let r1_pid = h.pid("r1");

    let report = h.sched.kill(None, false);
    h.drain();

    assert_eq!(report.success, vec!["r1", "r2", "w"]);
    for name in ["r1", "r2", "w"] {
        assert_eq!(h.state(name), TaskState::Cancelled);
    }
    assert_eq!(h.sched.allocator().reserved(0), Some(0));

    // A late clean exit does not resurrect the task.
    h.sched.process_exited("r1", r1_pid, 0);
    h.tick();
    assert_eq!(h.state("r1"), TaskState::Cancelled);
    assert_eq!(h.sched.task("r1").and_then(|t| t.exit_code), Some(0));
    assert!(h.tick().is_empty());
}

#[test]
fn suspend_running_task_keeps_its_devices() {
    let mut h = one_device_harness();
    h.create(vec![TaskSpecBuilder::new("x").name("t").devices(1, 6_000).single()]);
    h.tick();

    let report = h.sched.suspend(names(&["t"]));
    h.drain();

    assert_eq!(report.success, vec!["t"]);
    assert_eq!(h.state("t"), TaskState::Suspended(SuspendedFrom::Running));
    assert!(h.sched.allocator().holds("t"));
    assert!(h.commands.contains(&CoreCommand::Suspend { task: "t".to_string() }));
    assert!(h.sched.check_invariants().is_ok());

    let report = h.sched.resume(names(&["t"]));
    h.drain();

    assert_eq!(report.success, vec!["t"]);
    assert_eq!(h.state("t"), TaskState::Running);
    assert!(h.commands.contains(&CoreCommand::Resume { task: "t".to_string() }));
    assert_eq!(h.sched.task("t").map(|t| t.devices.clone()), Some(vec![0]));
}

#[test]
fn suspended_waiting_task_is_not_admitted_until_resumed() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);

    h.sched.suspend(names(&["t"]));
    assert!(h.tick().is_empty());
    assert_eq!(h.state("t"), TaskState::Suspended(SuspendedFrom::Waiting));

    h.sched.resume(names(&["t"]));
    assert_eq!(h.tick(), vec!["t"]);
}

#[test]
fn repeated_state_changes_are_no_ops() {
    let mut h = one_device_harness();
    h.create(vec![named("t"), named("done")]);
    h.tick();
    h.exit("done", 0);

    h.sched.suspend(names(&["t"]));
    let again = h.sched.suspend(names(&["t"]));
    assert!(again.success.is_empty());
    assert_eq!(again.no_op, vec!["t"]);
    assert!(again.failure.is_empty());

    let resumed_done = h.sched.resume(names(&["done"]));
    assert_eq!(resumed_done.no_op, vec!["done"]);

    let killed_done = h.sched.kill(names(&["done"]), false);
    assert_eq!(killed_done.no_op, vec!["done"]);
    assert_eq!(h.state("done"), TaskState::Succeeded);
}

#[test]
fn unknown_names_are_failures() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);

    let report = h.sched.kill(names(&["t", "ghost"]), false);

    assert_eq!(report.success, vec!["t"]);
    assert_eq!(report.failure, vec!["ghost"]);
    assert!(report.details[0].contains("ghost"));
}

#[test]
fn remove_kills_forgets_and_discards_logs() {
    let mut h = one_device_harness();
    h.create(vec![TaskSpecBuilder::new("x").name("t").devices(1, 8_000).on_end("echo end").single()]);
    h.tick();

    let report = h.sched.remove(names(&["t"]));
    h.drain();

    assert_eq!(report.success, vec!["t"]);
    assert!(h.sched.task("t").is_none());
    assert!(!h.sched.allocator().holds("t"));
    assert_eq!(h.kills(), vec![("t".to_string(), true)]);
    assert!(h.commands.contains(&CoreCommand::DiscardLogs { task: "t".to_string() }));
    assert!(h.hooks().is_empty());
    assert!(matches!(
        h.sched.test(Some("t")),
        Err(CatinError::TaskNotFound(_))
    ));
}

#[test]
fn removed_group_member_cascades_like_a_cancellation() {
    let mut h = one_device_harness();
    h.create(vec![sequential(&["x", "y"])]);
    h.tick();

    h.sched.remove(names(&["x"]));
    h.drain();
    h.tick();

    assert_eq!(h.state("y"), TaskState::Cancelled);
}

#[test]
fn removed_name_can_be_reused() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);
    h.sched.remove(names(&["t"]));

    let report = h.create(vec![named("t")]);

    assert_eq!(report.success, vec!["t"]);
}

#[test]
fn test_reports_pids_only_for_live_processes() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);

    assert_eq!(h.sched.test(None).ok().flatten(), Some(TEST_DAEMON_PID));
    assert_eq!(h.sched.test(Some("t")).ok().flatten(), None);

    h.tick();
    let pid = h.pid("t");
    assert_eq!(h.sched.test(Some("t")).ok().flatten(), Some(pid));

    // The PID reported by test is the one remove kills.
    h.sched.remove(names(&["t"]));
    h.drain();
    assert_eq!(h.kills(), vec![("t".to_string(), true)]);

    assert!(h.sched.test(Some("nope")).is_err());
}

#[test]
fn exit_of_stale_pid_is_ignored() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);
    h.tick();
    let pid = h.pid("t");

    h.sched.process_exited("t", pid + 1000, 1);
    assert_eq!(h.state("t"), TaskState::Running);

    h.sched.process_exited("t", pid, 0);
    assert_eq!(h.state("t"), TaskState::Succeeded);
}

#[test]
fn spawn_failure_marks_task_failed_and_frees_devices() {
    let mut h = one_device_harness();
    h.create(vec![TaskSpecBuilder::new("x").name("t").devices(1, 8_000).single()]);
    h.sched.tick();
    h.sched.drain_commands();

    h.sched.spawn_failed("t", "no such file");

    assert_eq!(h.state("t"), TaskState::Failed);
    assert!(!h.sched.allocator().holds("t"));
}

#[test]
fn late_start_of_a_killed_task_is_killed_again() {
    let mut h = one_device_harness();
    h.create(vec![named("t")]);
    h.sched.tick();
    h.sched.drain_commands();

    h.sched.kill(names(&["t"]), false);
    h.sched.drain_commands();
    h.sched.record_started("t", 77);

    assert_eq!(
        h.sched.drain_commands(),
        vec![CoreCommand::Kill {
            task: "t".to_string(),
            force: true
        }]
    );
}
