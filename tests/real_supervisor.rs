// tests/real_supervisor.rs
#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::sync::mpsc;

use catin::cache::CacheLayout;
use catin::engine::{CoreRuntime, HookOwner, Runtime, RuntimeEvent};
use catin::exec::{LaunchRequest, ProcessSupervisor, RealSupervisor, SignalOutcome, SupervisorOptions};
use catin::ipc::{Request, Response};
use catin::types::LogStream;
use catin_test_utils::builders::{SchedulerConfigBuilder, TaskSpecBuilder};
use catin_test_utils::{init_tracing, with_timeout};

const DAEMON_PID: u32 = 4242;

fn supervisor(home: &TempDir) -> (RealSupervisor, mpsc::Receiver<RuntimeEvent>) {
    init_tracing();
    let (tx, rx) = mpsc::channel(16);
    let options = SupervisorOptions {
        daemon_pid: DAEMON_PID,
        device_env_var: "CATIN_TEST_DEVICES".to_string(),
        kill_grace: Duration::from_millis(200),
    };
    let supervisor = RealSupervisor::new(Arc::new(CacheLayout::new(home.path())), options, tx);
    (supervisor, rx)
}

fn launch(task: &str, cmd: &str, devices: Option<Vec<u32>>) -> LaunchRequest {
    LaunchRequest {
        task: task.to_string(),
        cmd: cmd.to_string(),
        cwd: None,
        devices,
    }
}

async fn next_exit(rx: &mut mpsc::Receiver<RuntimeEvent>) -> (String, u32, i32) {
    loop {
        match with_timeout(rx.recv()).await {
            Some(RuntimeEvent::ProcessExited { task, pid, code }) => return (task, pid, code),
            Some(_) => continue,
            None => panic!("supervisor channel closed"),
        }
    }
}

#[tokio::test]
async fn output_and_environment_reach_the_log_files() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);

    let handle = sup
        .start(launch(
            "echo",
            "echo \"$CATIN_TASK_NAME on $CATIN_TEST_DEVICES\"; echo oops >&2; exit 3",
            Some(vec![0, 2]),
        ))
        .await
        .unwrap();

    let (task, pid, code) = next_exit(&mut rx).await;
    assert_eq!(task, "echo");
    assert_eq!(pid, handle.pid);
    assert_eq!(code, 3);
    assert_eq!(sup.poll("echo", handle.pid), Some(3));
    assert_eq!(sup.poll("echo", handle.pid + 1), None);

    let layout = CacheLayout::new(home.path());
    let stdout = std::fs::read_to_string(layout.log_path("echo", DAEMON_PID, LogStream::Stdout)).unwrap();
    let stderr = std::fs::read_to_string(layout.log_path("echo", DAEMON_PID, LogStream::Stderr)).unwrap();
    assert_eq!(stdout, "echo on 0,2\n");
    assert_eq!(stderr, "oops\n");
}

#[tokio::test]
async fn graceful_kill_terminates_the_group() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);
    sup.start(launch("sleeper", "sleep 30", None)).await.unwrap();

    let outcome = sup.signal_kill("sleeper", false).unwrap();
    assert_eq!(outcome, SignalOutcome::Delivered);

    let (task, pid, code) = next_exit(&mut rx).await;
    assert_eq!(task, "sleeper");
    assert_ne!(code, 0);

    // Once reaped, further signals reconcile with the known exit code.
    assert_eq!(
        sup.signal_kill("sleeper", true).unwrap(),
        SignalOutcome::AlreadyExited(Some(code))
    );
    sup.release("sleeper", pid);
    assert_eq!(sup.signal_suspend("sleeper").unwrap(), SignalOutcome::AlreadyExited(None));
}

#[tokio::test]
async fn trapped_terminate_escalates_to_kill() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);
    sup.start(launch(
        "stubborn",
        "trap '' TERM; while true; do sleep 0.05; done",
        None,
    ))
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    sup.signal_kill("stubborn", false).unwrap();

    let (_, _, code) = next_exit(&mut rx).await;
    assert_eq!(code, 128 + 9);
}

#[tokio::test]
async fn suspended_group_can_still_be_killed() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);
    assert!(sup.supports_suspend());
    sup.start(launch("paused", "sleep 30", None)).await.unwrap();

    assert_eq!(sup.signal_suspend("paused").unwrap(), SignalOutcome::Delivered);
    assert_eq!(sup.signal_resume("paused").unwrap(), SignalOutcome::Delivered);
    assert_eq!(sup.signal_suspend("paused").unwrap(), SignalOutcome::Delivered);

    sup.signal_kill("paused", true).unwrap();

    let (task, _, code) = next_exit(&mut rx).await;
    assert_eq!(task, "paused");
    assert_eq!(code, 128 + 9);
}

#[tokio::test]
async fn spawn_into_missing_directory_fails() {
    let home = TempDir::new().unwrap();
    let (mut sup, _rx) = supervisor(&home);
    let mut request = launch("lost", "true", None);
    request.cwd = Some(home.path().join("does-not-exist"));

    assert!(sup.start(request).await.is_err());
}

#[tokio::test]
async fn hooks_log_next_to_their_owner() {
    let home = TempDir::new().unwrap();
    let (mut sup, _rx) = supervisor(&home);
    let layout = CacheLayout::new(home.path());

    sup.run_hook(&HookOwner::Task("t".to_string()), "echo task hook $CATIN_TASK_NAME", None)
        .unwrap();
    sup.run_hook(&HookOwner::Group("g".to_string()), "echo group hook", None)
        .unwrap();

    let task_log = layout.daemon_dir(DAEMON_PID).join("t").join("hooks.log");
    let group_log = layout.daemon_dir(DAEMON_PID).join("daemon").join("hooks.log");
    with_timeout(async {
        loop {
            let task = std::fs::read_to_string(&task_log).unwrap_or_default();
            let group = std::fs::read_to_string(&group_log).unwrap_or_default();
            if task == "task hook t\n" && group == "group hook\n" {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

#[tokio::test]
async fn discard_logs_removes_the_task_directory() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);
    sup.start(launch("gone", "echo hi", None)).await.unwrap();
    next_exit(&mut rx).await;

    let dir = CacheLayout::new(home.path()).daemon_dir(DAEMON_PID).join("gone");
    assert!(dir.exists());

    sup.discard_logs("gone").unwrap();
    assert!(!dir.exists());
    // Missing directories are fine.
    sup.discard_logs("gone").unwrap();
}

#[tokio::test]
async fn stale_release_keeps_the_newer_process_under_the_same_name() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);

    let first = sup.start(launch("reused", "sleep 30", None)).await.unwrap();
    sup.signal_kill("reused", true).unwrap();
    let (_, pid, _) = next_exit(&mut rx).await;
    assert_eq!(pid, first.pid);

    // The old log directory goes away while its exit is still unprocessed.
    sup.discard_logs("reused").unwrap();
    let second = sup.start(launch("reused", "sleep 30", None)).await.unwrap();
    assert_ne!(second.pid, first.pid);

    sup.release("reused", first.pid);
    assert_eq!(sup.poll("reused", first.pid), None);
    assert_eq!(sup.poll("reused", second.pid), None);

    assert_eq!(sup.signal_kill("reused", true).unwrap(), SignalOutcome::Delivered);
    let (task, pid, code) = next_exit(&mut rx).await;
    assert_eq!(task, "reused");
    assert_eq!(pid, second.pid);
    assert_eq!(code, 128 + 9);
}

#[tokio::test]
async fn discarding_logs_keeps_an_unreleased_exit_observable() {
    let home = TempDir::new().unwrap();
    let (mut sup, mut rx) = supervisor(&home);

    let handle = sup.start(launch("short", "exit 4", None)).await.unwrap();
    next_exit(&mut rx).await;

    sup.discard_logs("short").unwrap();
    assert_eq!(sup.poll("short", handle.pid), Some(4));

    sup.release("short", handle.pid);
    assert_eq!(sup.poll("short", handle.pid), None);
}

async fn request(tx: &mpsc::Sender<RuntimeEvent>, request: Request) -> Response {
    let (reply, rx) = tokio::sync::oneshot::channel();
    tx.send(RuntimeEvent::Request { request, reply })
        .await
        .expect("runtime stopped");
    rx.await.expect("runtime dropped the reply")
}

async fn running_pid(tx: &mpsc::Sender<RuntimeEvent>, name: &str) -> Option<u32> {
    request(
        tx,
        Request::Test {
            name: Some(name.to_string()),
        },
    )
    .await
    .pid
}

#[tokio::test]
async fn recreated_task_stays_controllable_after_the_old_exit_arrives() {
    let home = TempDir::new().unwrap();
    init_tracing();
    let (tx, rx) = mpsc::channel(64);
    let options = SupervisorOptions {
        daemon_pid: DAEMON_PID,
        device_env_var: "CATIN_TEST_DEVICES".to_string(),
        kill_grace: Duration::from_millis(200),
    };
    let sup = RealSupervisor::new(Arc::new(CacheLayout::new(home.path())), options, tx.clone());
    let core = CoreRuntime::new(SchedulerConfigBuilder::new().scheduler());
    let runtime = tokio::spawn(Runtime::new(core, rx, sup, Duration::from_millis(20)).run());

    let sleeper = || TaskSpecBuilder::new("sleep 30").name("t").single();

    request(&tx, Request::Create { submissions: vec![sleeper()] }).await;
    let first = running_pid(&tx, "t").await.expect("first process running");

    let removed = request(&tx, Request::Remove { names: Some(vec!["t".to_string()]) }).await;
    assert_eq!(removed.success, vec!["t"]);
    let created = request(&tx, Request::Create { submissions: vec![sleeper()] }).await;
    assert!(created.ok, "{created:?}");
    let second = running_pid(&tx, "t").await.expect("second process running");
    assert_ne!(first, second);

    // Let the first process's exit event go through the runtime.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(running_pid(&tx, "t").await, Some(second));

    let killed = request(
        &tx,
        Request::Kill {
            names: Some(vec!["t".to_string()]),
            force: true,
        },
    )
    .await;
    assert_eq!(killed.success, vec!["t"]);

    with_timeout(async {
        let target = nix::unistd::Pid::from_raw(second as i32);
        while nix::sys::signal::kill(target, None).is_ok() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    tx.send(RuntimeEvent::ShutdownRequested).await.unwrap();
    with_timeout(runtime).await.unwrap().unwrap();
}
