//! File watcher for hot reload.
//!
//! Watches the parent directory rather than the file itself so that editors
//! which save by writing a temporary file and renaming it over the original are
//! still observed. Raw notifications are coalesced over a debounce window and
//! an event is emitted only when the file content actually changed.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Emitted once per effective content change of the watched file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChanged {
    pub path: PathBuf,
}

/// A watcher that monitors a single file for content changes.
pub struct FileWatcher {
    path: PathBuf,
    debounce: Duration,
    update_tx: mpsc::UnboundedSender<FileChanged>,
}

/// Keeps the watch alive. Dropping it stops watching.
pub struct WatchGuard {
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl Drop for WatchGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl FileWatcher {
    /// Create a new FileWatcher.
    ///
    /// Returns the watcher and a receiver for change events.
    pub fn new(path: &Path, debounce: Duration) -> (Self, mpsc::UnboundedReceiver<FileChanged>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                debounce,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Must be called from within a tokio runtime.
    pub fn run(self) -> Result<WatchGuard, notify::Error> {
        let (raw_tx, raw_rx) = mpsc::unbounded_channel::<()>();
        let file_name = self.path.file_name().map(|n| n.to_os_string());
        let watch_dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove();
                    if relevant && touches(&event, file_name.as_ref()) {
                        let _ = raw_tx.send(());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watch_dir, RecursiveMode::NonRecursive)?;

        // Baseline so the first emitted event reflects a real change.
        let baseline = std::fs::read(&self.path).ok();
        let task = tokio::spawn(debounce_loop(
            self.path.clone(),
            self.debounce,
            baseline,
            raw_rx,
            self.update_tx,
        ));

        tracing::info!(path = ?self.path, "File watcher started");
        Ok(WatchGuard {
            _watcher: watcher,
            task,
        })
    }
}

fn touches(event: &Event, file_name: Option<&OsString>) -> bool {
    match file_name {
        Some(name) => event
            .paths
            .iter()
            .any(|p| p.file_name().map(|n| n == name.as_os_str()).unwrap_or(false)),
        None => false,
    }
}

async fn debounce_loop(
    path: PathBuf,
    debounce: Duration,
    mut last: Option<Vec<u8>>,
    mut raw_rx: mpsc::UnboundedReceiver<()>,
    update_tx: mpsc::UnboundedSender<FileChanged>,
) {
    while raw_rx.recv().await.is_some() {
        tokio::time::sleep(debounce).await;
        while raw_rx.try_recv().is_ok() {}

        let current = match tokio::fs::read(&path).await {
            Ok(content) => content,
            Err(e) => {
                // Mid-rename; the create event that follows triggers another pass.
                tracing::debug!(path = ?path, error = %e, "Watched file not readable");
                continue;
            }
        };

        if last.as_deref() == Some(current.as_slice()) {
            tracing::trace!(path = ?path, "File touched without content change");
            continue;
        }
        last = Some(current);

        tracing::info!(path = ?path, "File change detected");
        if update_tx.send(FileChanged { path: path.clone() }).is_err() {
            break;
        }
    }
}
