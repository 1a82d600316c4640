//! Periodic progress reporting for a running synchronization

use crate::report::format_duration_hms;
use crate::walker::WalkResult;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default pause between two progress lines
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Snapshot shared between the walker (writer) and the reporter (reader)
#[derive(Debug)]
pub struct ProgressState {
    started: Instant,
    running: AtomicBool,
    folders_visited: AtomicU64,
    manipulation_millis: AtomicU64,
    current_dir: RwLock<Option<PathBuf>>,
    current_file: RwLock<Option<PathBuf>>,
}

impl ProgressState {
    /// State of a run starting now
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            running: AtomicBool::new(true),
            folders_visited: AtomicU64::new(0),
            manipulation_millis: AtomicU64::new(0),
            current_dir: RwLock::new(None),
            current_file: RwLock::new(None),
        }
    }

    /// Mark `dir` as being visited, returning the folder visited before it
    pub async fn enter_dir(&self, dir: &Path) -> Option<PathBuf> {
        self.current_dir.write().await.replace(dir.to_path_buf())
    }

    /// Restore the parent folder and publish counters once a folder is done
    pub async fn leave_dir(&self, parent: Option<PathBuf>, result: &WalkResult) {
        *self.current_dir.write().await = parent;
        self.folders_visited
            .store(result.counters.folders_visited, Ordering::Relaxed);
        self.publish_manipulation(result.manipulation.elapsed());
    }

    /// Set or clear the file being copied
    pub async fn set_file(&self, file: Option<PathBuf>) {
        *self.current_file.write().await = file;
    }

    /// Publish time spent manipulating files so far
    pub fn publish_manipulation(&self, elapsed: Duration) {
        self.manipulation_millis
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    /// Mark the walk as over; later lines carry no ETA
    pub fn finish(&self) {
        self.running.store(false, Ordering::Relaxed);
    }

    /// Whether the walk is still going
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Folders fully processed so far
    pub fn folders_visited(&self) -> u64 {
        self.folders_visited.load(Ordering::Relaxed)
    }

    /// Wall time minus time spent manipulating files
    pub fn non_copy_elapsed(&self) -> Duration {
        let manipulation = Duration::from_millis(self.manipulation_millis.load(Ordering::Relaxed));
        self.started.elapsed().saturating_sub(manipulation)
    }

    /// Folder being visited
    pub async fn current_dir(&self) -> Option<PathBuf> {
        self.current_dir.read().await.clone()
    }

    /// File being copied
    pub async fn current_file(&self) -> Option<PathBuf> {
        self.current_file.read().await.clone()
    }
}

impl Default for ProgressState {
    fn default() -> Self {
        Self::new()
    }
}

/// Previous-run figures the progress line compares against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressBaseline {
    /// Folders processed by the previous run, 0 if unknown
    pub previous_folders: u64,
    /// Non-copy time of the previous run, zero if unknown
    pub previous_non_copy: Duration,
}

/// `name(12/40 folders - ETA > 00:01:05.000) /src/dir/file.txt`
pub fn progress_line(
    name: &str,
    folders: u64,
    baseline: &ProgressBaseline,
    eta_elapsed: Option<Duration>,
    dir: Option<&Path>,
    file: Option<&Path>,
) -> String {
    let mut line = format!("{name}({folders}");
    if baseline.previous_folders > folders {
        line.push_str(&format!("/{}", baseline.previous_folders));
    }
    line.push_str(" folders");

    if let Some(elapsed) = eta_elapsed {
        if !baseline.previous_non_copy.is_zero() && elapsed < baseline.previous_non_copy {
            line.push_str(&format!(
                " - ETA > {}",
                format_duration_hms(baseline.previous_non_copy - elapsed)
            ));
        }
    }
    line.push(')');

    if let Some(dir) = dir {
        line.push_str(&format!(" {}", dir.display()));
    }
    if let Some(file_name) = file.and_then(Path::file_name) {
        line.push_str(&format!("/{}", file_name.to_string_lossy()));
    }
    line
}

/// Background task logging a progress line at a fixed interval
#[derive(Debug)]
pub struct ProgressReporter {
    name: String,
    state: Arc<ProgressState>,
    baseline: ProgressBaseline,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ProgressReporter {
    /// Spawn the reporting loop; the first line is logged immediately
    pub fn start(
        name: impl Into<String>,
        state: Arc<ProgressState>,
        baseline: ProgressBaseline,
        interval: Duration,
    ) -> Self {
        let name = name.into();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let task_name = name.clone();
        let task_state = Arc::clone(&state);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        report(&task_name, &task_state, &baseline).await;
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("{}Progress reporter shutdown requested", task_name);
                        break;
                    }
                }
            }
        });

        Self {
            name,
            state,
            baseline,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// Stop the loop, wait for it, then log one last line
    pub async fn stop(mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(()).await;
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        report(&self.name, &self.state, &self.baseline).await;
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn report(name: &str, state: &ProgressState, baseline: &ProgressBaseline) {
    let dir = state.current_dir().await;
    let file = state.current_file().await;
    let eta_elapsed = state.is_running().then(|| state.non_copy_elapsed());
    info!(
        "{}",
        progress_line(
            name,
            state.folders_visited(),
            baseline,
            eta_elapsed,
            dir.as_deref(),
            file.as_deref(),
        )
    );
}
