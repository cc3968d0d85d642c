// tests/protocol_router.rs

use catin::ipc::{Request, Response, route_request};
use catin::task::{TaskState, TaskSubmission};
use catin_test_utils::builders::{SchedulerConfigBuilder, TEST_DAEMON_PID, TaskSpecBuilder, named};

#[test]
fn requests_use_an_op_tag() {
    let kill = Request::Kill {
        names: Some(vec!["a".to_string()]),
        force: true,
    };
    let json = serde_json::to_string(&kill).unwrap();
    assert_eq!(json, r#"{"op":"kill","names":["a"],"force":true}"#);

    let all: Request = serde_json::from_str(r#"{"op":"suspend"}"#).unwrap();
    assert_eq!(all, Request::Suspend { names: None });

    let exit: Request = serde_json::from_str(r#"{"op":"exit"}"#).unwrap();
    assert_eq!(exit, Request::Exit);
}

#[test]
fn create_request_carries_submissions() {
    let request = Request::Create {
        submissions: vec![TaskSpecBuilder::new("python train.py").name("t").devices(2, 8000).single()],
    };

    let json = serde_json::to_string(&request).unwrap();
    let back: Request = serde_json::from_str(&json).unwrap();

    assert_eq!(back, request);
    assert!(json.contains(r#""type":"single""#));
}

#[test]
fn unknown_ops_fail_to_decode() {
    assert!(serde_json::from_str::<Request>(r#"{"op":"explode"}"#).is_err());
}

#[test]
fn response_omits_empty_optionals() {
    let json = serde_json::to_string(&Response {
        ok: true,
        ..Response::default()
    })
    .unwrap();
    assert!(!json.contains("detail"));
    assert!(!json.contains("pid"));

    let minimal: Response = serde_json::from_str(r#"{"ok":true}"#).unwrap();
    assert!(minimal.ok);
    assert!(minimal.success.is_empty());
}

#[test]
fn create_then_test_through_the_router() {
    let mut sched = SchedulerConfigBuilder::new().scheduler();

    let routed = route_request(
        &mut sched,
        Request::Create {
            submissions: vec![named("a"), named("daemon")],
        },
    );
    assert!(!routed.exit);
    assert!(!routed.response.ok);
    assert!(!routed.response.error);
    assert_eq!(routed.response.success, vec!["a"]);
    assert_eq!(routed.response.failure, vec!["daemon"]);
    assert!(routed.response.detail.is_some());

    let status = route_request(&mut sched, Request::Test { name: None });
    assert!(status.response.ok);
    assert_eq!(status.response.pid, Some(TEST_DAEMON_PID));

    let waiting = route_request(
        &mut sched,
        Request::Test {
            name: Some("a".to_string()),
        },
    );
    assert!(!waiting.response.ok);
    assert_eq!(waiting.response.pid, None);

    let missing = route_request(
        &mut sched,
        Request::Test {
            name: Some("ghost".to_string()),
        },
    );
    assert!(!missing.response.ok);
    assert_eq!(missing.response.failure, vec!["ghost"]);
}

#[test]
fn no_op_only_batches_are_ok() {
    let mut sched = SchedulerConfigBuilder::new().scheduler();
    route_request(
        &mut sched,
        Request::Create {
            submissions: vec![named("a")],
        },
    );

    let routed = route_request(&mut sched, Request::Resume { names: None });

    assert!(routed.response.ok);
    assert_eq!(routed.response.no_op, vec!["a"]);
    assert_eq!(sched.state_of("a"), Some(TaskState::Waiting));
}

#[test]
fn exit_replies_with_the_daemon_pid_and_stops() {
    let mut sched = SchedulerConfigBuilder::new().scheduler();

    let routed = route_request(&mut sched, Request::Exit);

    assert!(routed.exit);
    assert!(routed.response.ok);
    assert_eq!(routed.response.pid, Some(TEST_DAEMON_PID));
}

#[test]
fn group_submission_round_trips_through_json() {
    let group = catin_test_utils::builders::graph(&["a", "b"], &[(0, 1)]);
    let json = serde_json::to_string(&group).unwrap();

    let back: TaskSubmission = serde_json::from_str(&json).unwrap();

    assert_eq!(back, group);
    assert!(json.contains(r#""strategy":"graph""#));
}
