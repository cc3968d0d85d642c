// tests/scheduler_create.rs

use catin::task::{GroupSpec, Hooks, TaskState, TaskSubmission};
use catin::types::StrategyKind;
use catin_test_utils::builders::{SchedulerConfigBuilder, TaskSpecBuilder, graph, named, sequential};
use catin_test_utils::harness::Harness;

fn harness() -> Harness {
    Harness::new(
        SchedulerConfigBuilder::new()
            .device(0, 8_000)
            .device(1, 8_000)
            .scheduler(),
    )
}

#[test]
fn created_tasks_start_waiting() {
    let mut h = harness();

    let report = h.create(vec![named("a"), named("b")]);

    assert_eq!(report.success, vec!["a", "b"]);
    assert!(report.failure.is_empty());
    assert_eq!(h.state("a"), TaskState::Waiting);
    assert_eq!(h.state("b"), TaskState::Waiting);
    assert!(h.commands.is_empty(), "create alone must not start anything");
}

#[test]
fn generated_names_are_unique_and_five_chars() {
    let mut h = harness();

    let report = h.create(
        (0..20)
            .map(|_| TaskSpecBuilder::new("true").single())
            .collect(),
    );

    assert_eq!(report.success.len(), 20);
    let mut names = report.success.clone();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 20);
    for name in &report.success {
        assert_eq!(name.len(), 5);
        assert_ne!(name, "daemon");
    }
}

#[test]
fn duplicate_name_is_rejected_without_touching_the_original() {
    let mut h = harness();
    h.create(vec![named("a")]);

    let report = h.create(vec![TaskSpecBuilder::new("false").name("a").single()]);

    assert_eq!(report.failure, vec!["a"]);
    assert!(report.details[0].contains("already in use"));
    assert_eq!(h.sched.task("a").map(|t| t.cmd.as_str()), Some("true"));
}

#[test]
fn reserved_and_malformed_names_are_rejected() {
    let mut h = harness();

    let report = h.create(vec![named("daemon"), named("a/b"), named(""), named("ok")]);

    assert_eq!(report.failure, vec!["daemon", "a/b", ""]);
    assert_eq!(report.success, vec!["ok"]);
}

#[test]
fn empty_command_is_rejected() {
    let mut h = harness();

    let report = h.create(vec![TaskSpecBuilder::new("   ").name("blank").single()]);

    assert_eq!(report.failure, vec!["blank"]);
    assert!(h.sched.task("blank").is_none());
}

#[test]
fn infeasible_resources_are_rejected_at_create() {
    let mut h = harness();

    let report = h.create(vec![
        TaskSpecBuilder::new("train").name("too-many").devices(3, 1_000).single(),
        TaskSpecBuilder::new("train").name("too-big").devices(1, 9_000).single(),
        TaskSpecBuilder::new("train").name("fits").devices(2, 8_000).single(),
    ]);

    assert_eq!(report.failure, vec!["too-many", "too-big"]);
    assert_eq!(report.success, vec!["fits"]);
    assert!(report.details.iter().all(|d| d.contains("infeasible")));
}

#[test]
fn invalid_resource_specs_are_rejected() {
    let mut h = harness();

    let report = h.create(vec![
        TaskSpecBuilder::new("x").name("zero").devices(0, 10).single(),
        TaskSpecBuilder::new("x")
            .name("dupes")
            .devices(1, 10)
            .visible(&[0, 0])
            .single(),
    ]);

    assert_eq!(report.failure, vec!["zero", "dupes"]);
}

#[test]
fn group_with_cycle_is_rejected_whole() {
    let mut h = harness();

    let report = h.create(vec![graph(&["a", "b", "c"], &[(0, 1), (1, 2), (2, 0)])]);

    assert!(report.success.is_empty());
    assert_eq!(report.failure, vec!["a", "b", "c"]);
    assert!(report.details.iter().any(|d| d.contains("Cycle")));
    assert!(h.sched.task_names().is_empty());
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn group_with_one_bad_member_registers_nothing() {
    let mut h = harness();
    h.create(vec![named("taken")]);

    let report = h.create(vec![sequential(&["x", "taken", "y"])]);

    assert!(report.success.is_empty());
    assert_eq!(report.failure, vec!["x", "taken", "y"]);
    assert_eq!(h.sched.task_names(), vec!["taken"]);
}

#[test]
fn duplicate_names_inside_a_group_conflict() {
    let mut h = harness();

    let report = h.create(vec![sequential(&["x", "x"])]);

    assert!(report.success.is_empty());
    assert!(h.sched.task_names().is_empty());
}

#[test]
fn empty_group_is_rejected() {
    let mut h = harness();

    let report = h.create(vec![TaskSubmission::Group(GroupSpec {
        name: Some("nothing".to_string()),
        strategy: StrategyKind::Sequential,
        tasks: Vec::new(),
        edges: Vec::new(),
        hooks: Hooks::default(),
    })]);

    assert_eq!(report.failure, vec!["nothing"]);
    assert!(report.details.iter().any(|d| d.contains("no tasks")));
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn one_bad_single_does_not_block_the_rest_of_the_batch() {
    let mut h = harness();

    let report = h.create(vec![named("a"), named("daemon"), sequential(&["b", "c"])]);

    assert_eq!(report.success, vec!["a", "b", "c"]);
    assert_eq!(report.failure, vec!["daemon"]);
    assert_eq!(h.sched.live_groups(), 1);
}
