//! Process supervision against real child processes.

mod common;

use std::path::Path;
use std::time::Duration;

use edge_ingress::process::{ProcessControl, ProcessSpec, ProcessState, ProcessSupervisor, SignalError};

fn trap_script(dir: &Path) -> String {
    format!(
        "trap 'echo reload >> {log}' USR1; echo ready > {ready}; while true; do sleep 0.05; done",
        log = dir.join("reloads").display(),
        ready = dir.join("ready").display(),
    )
}

#[tokio::test]
async fn crash_loop_restarts_with_identical_arguments() {
    let spec = ProcessSpec::new("sh").arg("-c").arg("exit 1");
    let handle = ProcessSupervisor::start(spec.clone()).unwrap();

    assert!(common::eventually(Duration::from_secs(10), || handle.restarts() >= 3).await);
    assert_eq!(handle.spec(), &spec);

    handle.stop(Duration::from_secs(5)).await;
    assert_eq!(handle.state(), ProcessState::Stopped);

    let restarts = handle.restarts();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(handle.restarts(), restarts);
}

#[tokio::test]
async fn killed_process_is_replaced() {
    let handle = ProcessSupervisor::start(ProcessSpec::new("sleep").arg("30")).unwrap();
    let first = handle.pid().unwrap();

    nix::sys::signal::kill(
        nix::unistd::Pid::from_raw(first as i32),
        nix::sys::signal::Signal::SIGKILL,
    )
    .unwrap();

    assert!(
        common::eventually(Duration::from_secs(5), || {
            handle.restarts() == 1 && handle.pid().is_some_and(|pid| pid != first)
        })
        .await
    );

    handle.stop(Duration::from_secs(5)).await;
}

#[tokio::test]
async fn reload_signal_reaches_process() {
    let dir = tempfile::tempdir().unwrap();
    let spec = ProcessSpec::new("sh").arg("-c").arg(trap_script(dir.path()));
    let handle = ProcessSupervisor::start(spec).unwrap();

    let ready = dir.path().join("ready");
    assert!(common::eventually(Duration::from_secs(5), || ready.exists()).await);

    ProcessControl::signal_reload(&handle).unwrap();

    let log = dir.path().join("reloads");
    assert!(
        common::eventually(Duration::from_secs(5), || {
            std::fs::read_to_string(&log).map(|s| s.lines().count() == 1).unwrap_or(false)
        })
        .await
    );
    assert_eq!(handle.restarts(), 0);

    handle.stop(Duration::from_secs(5)).await;
    assert!(matches!(handle.signal_reload(), Err(SignalError::NotRunning)));
}

#[tokio::test]
async fn state_changes_are_published() {
    let handle = ProcessSupervisor::start(ProcessSpec::new("sleep").arg("30")).unwrap();
    let mut states = handle.subscribe();
    assert!(matches!(*states.borrow_and_update(), ProcessState::Running { .. }));

    handle.stop(Duration::from_secs(5)).await;
    states
        .wait_for(|s| *s == ProcessState::Stopped)
        .await
        .unwrap();
}
