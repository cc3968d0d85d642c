// tests/task_graph.rs

use catin::dag::TaskGraph;
use catin::errors::CatinError;
use catin::task::{DAEMON_NAME, generate_name, validate_name};
use catin_test_utils::builders::{SchedulerConfigBuilder, graph, named};
use catin_test_utils::harness::Harness;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[test]
fn graph_tracks_both_directions_of_each_edge() {
    // a -> b, a -> c, b -> d, c -> d
    let g = TaskGraph::new(
        names(&["a", "b", "c", "d"]),
        &[(0, 1), (0, 2), (1, 3), (2, 3)],
    )
    .unwrap();

    assert!(g.dependencies_of(0).is_empty());
    assert_eq!(g.dependents_of(0), &[1, 2]);
    assert_eq!(g.dependencies_of(3), &[1, 2]);
    assert!(g.dependents_of(3).is_empty());
}

#[test]
fn duplicate_edges_are_collapsed() {
    let g = TaskGraph::new(names(&["a", "b"]), &[(0, 1), (0, 1)]).unwrap();
    assert_eq!(g.dependencies_of(1), &[0]);
}

#[test]
fn out_of_range_lookups_are_empty() {
    let g = TaskGraph::new(names(&["a"]), &[]).unwrap();
    assert!(g.dependencies_of(5).is_empty());
    assert!(g.dependents_of(5).is_empty());
}

#[test]
fn cycles_and_self_loops_are_rejected() {
    let cycle = TaskGraph::new(names(&["a", "b", "c"]), &[(0, 1), (1, 2), (2, 0)]);
    assert!(matches!(cycle, Err(CatinError::GraphCycle(_))));

    let self_loop = TaskGraph::new(names(&["a"]), &[(0, 0)]);
    assert!(matches!(self_loop, Err(CatinError::GraphCycle(_))));
}

#[test]
fn edges_outside_the_group_are_a_config_error() {
    let res = TaskGraph::new(names(&["a", "b"]), &[(0, 7)]);
    assert!(matches!(res, Err(CatinError::ConfigError(_))));
}

#[test]
fn empty_graph_is_valid() {
    let g = TaskGraph::new(Vec::new(), &[]).unwrap();
    assert!(g.dependencies_of(0).is_empty());
    assert!(g.dependents_of(0).is_empty());
}

#[test]
fn generated_names_are_five_alphanumerics_and_avoid_taken_ones() {
    let mut rng = StdRng::seed_from_u64(1);
    let first = generate_name(&mut rng, |_| false);
    assert_eq!(first.len(), 5);
    assert!(first.chars().all(|c| c.is_ascii_alphanumeric()));

    // Same seed, but the first candidate is taken.
    let mut rng = StdRng::seed_from_u64(1);
    let second = generate_name(&mut rng, |candidate| candidate == first);
    assert_ne!(second, first);
}

#[test]
fn name_validation() {
    for ok in ["train", "run-1", "lr=0.1", "a b", "日本"] {
        assert!(validate_name(ok).is_ok(), "{ok} should be valid");
    }

    let long = "x".repeat(255);
    for bad in ["", "   ", ".", "..", ":", "a/b", "a\\b", "tab\there", DAEMON_NAME, long.as_str()] {
        assert!(
            matches!(validate_name(bad), Err(CatinError::InvalidName(_))),
            "{bad:?} should be rejected"
        );
    }
}

#[test]
fn group_membership_is_recorded_on_tasks() {
    let mut h = Harness::new(SchedulerConfigBuilder::new().scheduler());
    h.create(vec![named("solo"), graph(&["a", "b"], &[(0, 1)])]);

    assert_eq!(h.sched.task("solo").unwrap().group, None);
    let a = h.sched.task("a").unwrap().group;
    assert!(a.is_some());
    assert_eq!(h.sched.task("b").unwrap().group, a);
}
