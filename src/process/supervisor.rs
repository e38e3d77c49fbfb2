//! Spawn, watch and restart the edge process.
//!
//! # Responsibilities
//! - Spawn the child with inherited stdout/stderr
//! - Reap it from a dedicated task and log how it exited
//! - Respawn with the identical spec after any exit not requested by `stop()`
//! - Deliver SIGUSR1 (reload) and SIGTERM (stop)

use std::os::unix::process::ExitStatusExt;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Child;
use tokio::sync::watch;

use crate::observability::metrics;
use crate::process::command::ProcessSpec;
use crate::process::{ProcessControl, SignalError, SpawnError};

/// Lifecycle of the supervised process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: u32 },
    Exited,
    Restarting,
    Stopped,
}

struct Shared {
    spec: ProcessSpec,
    /// 0 while no child is running.
    pid: AtomicU32,
    restarts: AtomicU64,
    stop_requested: AtomicBool,
    state: watch::Sender<ProcessState>,
    fatal: watch::Sender<Option<Arc<SpawnError>>>,
}

pub struct ProcessSupervisor;

impl ProcessSupervisor {
    /// Spawn the process and start watching it.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(spec: ProcessSpec) -> Result<SupervisorHandle, SpawnError> {
        let (state, _) = watch::channel(ProcessState::NotStarted);
        let (fatal, _) = watch::channel(None);
        let shared = Arc::new(Shared {
            spec,
            pid: AtomicU32::new(0),
            restarts: AtomicU64::new(0),
            stop_requested: AtomicBool::new(false),
            state,
            fatal,
        });

        let child = spawn(&shared)?;
        tracing::info!(
            binary = %shared.spec.binary().display(),
            args = ?shared.spec.args(),
            pid = shared.pid.load(Ordering::SeqCst),
            "Edge process started"
        );

        tokio::spawn(watch_exits(Arc::clone(&shared), child));
        Ok(SupervisorHandle { shared })
    }
}

/// Cloneable view of a supervised process.
#[derive(Clone)]
pub struct SupervisorHandle {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("pid", &self.pid())
            .field("state", &self.state())
            .field("restarts", &self.restarts())
            .finish()
    }
}

impl SupervisorHandle {
    pub fn spec(&self) -> &ProcessSpec {
        &self.shared.spec
    }

    pub fn state(&self) -> ProcessState {
        *self.shared.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.shared.state.subscribe()
    }

    /// Number of respawns after unexpected exits.
    pub fn restarts(&self) -> u64 {
        self.shared.restarts.load(Ordering::SeqCst)
    }

    pub fn pid(&self) -> Option<u32> {
        match self.shared.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    /// Resolves once a respawn has failed. Supervision has ended at that point.
    pub async fn fatal(&self) -> Arc<SpawnError> {
        let mut rx = self.shared.fatal.subscribe();
        let result = match rx.wait_for(Option::is_some).await {
            Ok(err) => err.clone(),
            Err(_) => None,
        };
        match result {
            Some(err) => err,
            None => std::future::pending().await,
        }
    }

    /// Send SIGUSR1 to the running process.
    pub fn signal_reload(&self) -> Result<(), SignalError> {
        let pid = self.pid().ok_or(SignalError::NotRunning)?;
        deliver(pid, Signal::SIGUSR1)?;
        tracing::info!(pid, "Sent reload signal to edge process");
        Ok(())
    }

    /// Stop the process without restarting it.
    ///
    /// Sends SIGTERM and waits up to `grace` for the process to exit, then
    /// sends SIGKILL.
    pub async fn stop(&self, grace: Duration) {
        self.shared.stop_requested.store(true, Ordering::SeqCst);
        if self.state() == ProcessState::Stopped {
            return;
        }

        if let Some(pid) = self.pid() {
            tracing::info!(pid, "Stopping edge process");
            if let Err(e) = deliver(pid, Signal::SIGTERM) {
                tracing::warn!(pid, error = %e, "Failed to send SIGTERM");
            }
        }

        let mut rx = self.subscribe();
        let stopped = tokio::time::timeout(grace, rx.wait_for(|s| *s == ProcessState::Stopped))
            .await
            .is_ok();
        if stopped {
            return;
        }

        if let Some(pid) = self.pid() {
            tracing::warn!(pid, grace_secs = grace.as_secs(), "Edge process ignored SIGTERM, killing");
            if let Err(e) = deliver(pid, Signal::SIGKILL) {
                tracing::warn!(pid, error = %e, "Failed to send SIGKILL");
            }
        }
        let _ = rx.wait_for(|s| *s == ProcessState::Stopped).await;
    }
}

impl ProcessControl for SupervisorHandle {
    fn signal_reload(&self) -> Result<(), SignalError> {
        SupervisorHandle::signal_reload(self)
    }

    fn pid(&self) -> Option<u32> {
        SupervisorHandle::pid(self)
    }
}

fn deliver(pid: u32, sig: Signal) -> Result<(), SignalError> {
    let raw = i32::try_from(pid).map_err(|_| SignalError::Delivery {
        pid,
        source: nix::errno::Errno::ESRCH,
    })?;
    signal::kill(Pid::from_raw(raw), sig).map_err(|source| SignalError::Delivery { pid, source })
}

fn spawn(shared: &Shared) -> Result<Child, SpawnError> {
    let child = shared.spec.command().spawn().map_err(|source| SpawnError {
        binary: shared.spec.binary().display().to_string(),
        source,
    })?;

    let pid = child.id().unwrap_or(0);
    shared.pid.store(pid, Ordering::SeqCst);
    shared.state.send_replace(ProcessState::Running { pid });
    Ok(child)
}

/// Sole owner of the child: reaps it and decides what happens next.
async fn watch_exits(shared: Arc<Shared>, mut child: Child) {
    loop {
        let pid = shared.pid.load(Ordering::SeqCst);
        let status = child.wait().await;
        shared.pid.store(0, Ordering::SeqCst);

        if shared.stop_requested.load(Ordering::SeqCst) {
            tracing::info!(pid, "Edge process stopped");
            shared.state.send_replace(ProcessState::Stopped);
            return;
        }

        match status {
            Ok(status) => log_exit(pid, status),
            Err(e) => tracing::error!(pid, error = %e, "Failed to wait for edge process"),
        }
        shared.state.send_replace(ProcessState::Exited);

        let restarts = shared.restarts.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_process_restart();
        shared.state.send_replace(ProcessState::Restarting);

        child = match spawn(&shared) {
            Ok(child) => child,
            Err(e) => {
                tracing::error!(error = %e, restarts, "Failed to restart edge process");
                shared.state.send_replace(ProcessState::Stopped);
                shared.fatal.send_replace(Some(Arc::new(e)));
                return;
            }
        };

        let new_pid = shared.pid.load(Ordering::SeqCst);
        tracing::info!(pid = new_pid, restarts, "Edge process restarted");

        // stop() may have run while no child existed.
        if shared.stop_requested.load(Ordering::SeqCst) {
            if let Err(e) = deliver(new_pid, Signal::SIGTERM) {
                tracing::warn!(pid = new_pid, error = %e, "Failed to send SIGTERM");
            }
        }
    }
}

fn log_exit(pid: u32, status: ExitStatus) {
    match (status.code(), status.signal()) {
        (Some(code), _) => tracing::warn!(pid, code, "Edge process exited, restarting"),
        (None, Some(signal)) => tracing::warn!(pid, signal, "Edge process killed by signal, restarting"),
        (None, None) => tracing::warn!(pid, "Edge process exited, restarting"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_failure_is_returned() {
        let err = ProcessSupervisor::start(ProcessSpec::new("/nonexistent/edge-binary")).unwrap_err();
        assert_eq!(err.binary, "/nonexistent/edge-binary");
    }

    #[tokio::test]
    async fn running_process_reports_pid_and_stops() {
        let handle = ProcessSupervisor::start(ProcessSpec::new("sleep").arg("30")).unwrap();
        let pid = handle.pid().unwrap();
        assert_eq!(handle.state(), ProcessState::Running { pid });

        handle.stop(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), ProcessState::Stopped);
        assert_eq!(handle.pid(), None);
        assert_eq!(handle.restarts(), 0);
    }

    #[tokio::test]
    async fn reload_without_process_is_not_running() {
        let handle = ProcessSupervisor::start(ProcessSpec::new("sleep").arg("30")).unwrap();
        handle.stop(Duration::from_secs(5)).await;
        assert!(matches!(handle.signal_reload(), Err(SignalError::NotRunning)));
    }

    #[tokio::test]
    async fn unexpected_exit_is_restarted() {
        let handle = ProcessSupervisor::start(ProcessSpec::new("sh").arg("-c").arg("sleep 0.1")).unwrap();

        let mut restarted = false;
        for _ in 0..100 {
            if handle.restarts() >= 2 {
                restarted = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert!(restarted);

        handle.stop(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), ProcessState::Stopped);
    }
}
