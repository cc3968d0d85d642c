// tests/scheduler_groups.rs

use catin::engine::{CoreCommand, HookOwner};
use catin::task::{GroupSpec, Hooks, TaskState, TaskSubmission};
use catin::types::StrategyKind;
use catin_test_utils::builders::{SchedulerConfigBuilder, TaskSpecBuilder, graph, sequential};
use catin_test_utils::harness::Harness;

fn harness(cascade: bool) -> Harness {
    Harness::new(SchedulerConfigBuilder::new().cascade(cascade).scheduler())
}

#[test]
fn sequential_runs_one_member_at_a_time() {
    let mut h = harness(true);
    h.create(vec![sequential(&["x", "y", "z"])]);

    assert_eq!(h.tick(), vec!["x"]);
    assert_eq!(h.tick(), Vec::<String>::new());
    assert_eq!(h.state("y"), TaskState::Waiting);

    assert_eq!(h.exit("x", 0), vec!["y"]);
    assert_eq!(h.exit("y", 0), vec!["z"]);
    h.exit("z", 0);

    for name in ["x", "y", "z"] {
        assert_eq!(h.state(name), TaskState::Succeeded);
    }
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn sequential_failure_cancels_the_rest() {
    let mut h = harness(true);
    h.create(vec![sequential(&["x", "y", "z"])]);
    h.tick();

    let started = h.exit("x", 1);

    assert!(started.is_empty());
    assert_eq!(h.state("x"), TaskState::Failed);
    assert_eq!(h.state("y"), TaskState::Cancelled);
    assert_eq!(h.state("z"), TaskState::Cancelled);
    assert!(h.kills().is_empty(), "nothing downstream had a process");
}

#[test]
fn chain_failure_cascades_in_one_pass() {
    let mut h = harness(true);
    h.create(vec![graph(&["a", "b", "c"], &[(0, 1), (1, 2)])]);
    assert_eq!(h.tick(), vec!["a"]);

    h.exit("a", 2);

    assert_eq!(h.state("a"), TaskState::Failed);
    assert_eq!(h.state("b"), TaskState::Cancelled);
    assert_eq!(h.state("c"), TaskState::Cancelled);

    // Nothing downstream is ever admitted afterwards.
    assert!(h.tick().is_empty());
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn without_cascade_dependents_stay_blocked() {
    let mut h = harness(false);
    h.create(vec![graph(&["a", "b", "c"], &[(0, 1), (1, 2)])]);
    h.tick();

    h.exit("a", 1);
    h.tick();

    assert_eq!(h.state("b"), TaskState::Waiting);
    assert_eq!(h.state("c"), TaskState::Waiting);
    assert_eq!(h.sched.live_groups(), 1);
}

#[test]
fn graph_member_waits_for_all_dependencies() {
    let mut h = harness(true);
    // a -> b, a -> c, b -> d, c -> d
    h.create(vec![graph(
        &["a", "b", "c", "d"],
        &[(0, 1), (0, 2), (1, 3), (2, 3)],
    )]);

    assert_eq!(h.tick(), vec!["a"]);

    let mut started = h.exit("a", 0);
    started.sort();
    assert_eq!(started, vec!["b", "c"]);

    assert!(h.exit("b", 0).is_empty());
    assert_eq!(h.state("d"), TaskState::Waiting);
    assert_eq!(h.exit("c", 0), vec!["d"]);
}

#[test]
fn graph_cascade_spares_independent_branches() {
    let mut h = harness(true);
    // a -> b, c independent
    h.create(vec![graph(&["a", "b", "c"], &[(0, 1)])]);
    let mut started = h.tick();
    started.sort();
    assert_eq!(started, vec!["a", "c"]);

    h.exit("a", 1);

    assert_eq!(h.state("b"), TaskState::Cancelled);
    assert_eq!(h.state("c"), TaskState::Running);
}

#[test]
fn killing_a_task_cascades_to_its_dependents() {
    let mut h = harness(true);
    // a -> b
    h.create(vec![graph(&["a", "b"], &[(0, 1)])]);
    h.tick();

    h.sched.kill(Some(vec!["a".to_string()]), false);
    h.drain();
    h.tick();

    assert_eq!(h.state("a"), TaskState::Cancelled);
    assert_eq!(h.state("b"), TaskState::Cancelled);
    assert_eq!(h.kills(), vec![("a".to_string(), false)]);
}

#[test]
fn task_hooks_follow_admission_and_natural_exit() {
    let mut h = harness(true);
    h.create(vec![
        TaskSpecBuilder::new("train")
            .name("t")
            .on_start("echo start")
            .on_end("echo end")
            .single(),
    ]);

    h.tick();
    assert_eq!(h.hooks(), vec!["echo start"]);
    let start_pos = h
        .commands
        .iter()
        .position(|c| matches!(c, CoreCommand::Start(_)));
    let hook_pos = h
        .commands
        .iter()
        .position(|c| matches!(c, CoreCommand::RunHook { .. }));
    assert!(hook_pos < start_pos, "on_start runs before the launch");

    h.exit("t", 1);
    assert_eq!(h.hooks(), vec!["echo start", "echo end"]);
}

#[test]
fn force_kill_skips_the_end_hook_but_graceful_kill_runs_it() {
    let mut h = harness(true);
    h.create(vec![
        TaskSpecBuilder::new("a").name("soft").on_end("echo soft").single(),
        TaskSpecBuilder::new("b").name("hard").on_end("echo hard").single(),
    ]);
    h.tick();

    h.sched.kill(Some(vec!["soft".to_string()]), false);
    h.sched.kill(Some(vec!["hard".to_string()]), true);
    h.drain();

    assert_eq!(h.hooks(), vec!["echo soft"]);
    assert_eq!(
        h.kills(),
        vec![("soft".to_string(), false), ("hard".to_string(), true)]
    );
}

#[test]
fn group_hooks_run_once_around_the_whole_group() {
    let mut h = harness(true);
    h.create(vec![TaskSubmission::Group(GroupSpec {
        name: Some("sweep".to_string()),
        strategy: StrategyKind::Sequential,
        tasks: vec![
            TaskSpecBuilder::new("true").name("s1").build(),
            TaskSpecBuilder::new("true").name("s2").build(),
        ],
        edges: Vec::new(),
        hooks: Hooks {
            on_start: Some("echo group start".to_string()),
            on_end: Some("echo group end".to_string()),
        },
    })]);

    h.tick();
    h.exit("s1", 0);
    assert_eq!(h.hooks(), vec!["echo group start"]);

    h.exit("s2", 0);
    assert_eq!(h.hooks(), vec!["echo group start", "echo group end"]);

    let owners: Vec<&HookOwner> = h
        .commands
        .iter()
        .filter_map(|c| match c {
            CoreCommand::RunHook { owner, .. } => Some(owner),
            _ => None,
        })
        .collect();
    assert!(owners
        .iter()
        .all(|o| **o == HookOwner::Group("sweep".to_string())));
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn group_end_hook_runs_even_if_the_group_never_started() {
    let mut h = harness(true);
    h.create(vec![TaskSubmission::Group(GroupSpec {
        name: Some("never".to_string()),
        strategy: StrategyKind::Sequential,
        tasks: vec![TaskSpecBuilder::new("true").name("n1").build()],
        edges: Vec::new(),
        hooks: Hooks {
            on_start: Some("echo start".to_string()),
            on_end: Some("echo end".to_string()),
        },
    })]);

    h.sched.kill(None, false);
    h.drain();
    h.tick();

    assert_eq!(h.hooks(), vec!["echo end"]);
}

#[test]
fn reused_name_of_a_removed_member_does_not_affect_the_group() {
    let mut h = harness(true);
    h.create(vec![sequential(&["x", "y"])]);
    h.tick();
    assert_eq!(h.exit("x", 0), vec!["y"]);

    let removed = h.sched.remove(Some(vec!["x".to_string()]));
    assert_eq!(removed.success, vec!["x"]);
    h.drain();

    let created = h.create(vec![TaskSpecBuilder::new("false").name("x").single()]);
    assert!(created.failure.is_empty(), "{created:?}");
    assert_eq!(h.tick(), vec!["x"]);

    h.exit("x", 1);

    assert_eq!(h.state("x"), TaskState::Failed);
    assert_eq!(h.state("y"), TaskState::Running);
    assert!(h.kills().is_empty(), "the group member must not be cascaded");
    assert_eq!(h.sched.live_groups(), 1);

    h.exit("y", 0);
    assert_eq!(h.sched.live_groups(), 0);
}

#[test]
fn blocked_members_keep_the_group_until_they_are_killed() {
    let mut h = harness(false);
    h.create(vec![TaskSubmission::Group(GroupSpec {
        name: Some("held".to_string()),
        strategy: StrategyKind::Sequential,
        tasks: vec![
            TaskSpecBuilder::new("false").name("x").build(),
            TaskSpecBuilder::new("true").name("y").build(),
        ],
        edges: Vec::new(),
        hooks: Hooks {
            on_start: None,
            on_end: Some("echo held end".to_string()),
        },
    })]);
    h.tick();
    h.exit("x", 1);

    assert_eq!(h.state("y"), TaskState::Waiting);
    assert_eq!(h.sched.live_groups(), 1);
    assert!(h.hooks().is_empty());

    h.sched.kill(Some(vec!["y".to_string()]), false);
    h.drain();
    h.tick();

    assert_eq!(h.state("y"), TaskState::Cancelled);
    assert_eq!(h.sched.live_groups(), 0);
    assert_eq!(h.hooks(), vec!["echo held end"]);
}
