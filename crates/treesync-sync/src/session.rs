//! Synchronization session: owns the policy and runs the walk with reporting and statistics

use crate::backup::backup_suffix;
use crate::copy::DEFAULT_COPY_PROGRESS_INTERVAL;
use crate::filter::SyncFilter;
use crate::progress::{ProgressBaseline, ProgressReporter, ProgressState, DEFAULT_PROGRESS_INTERVAL};
use crate::report::{format_duration_hms, FreeSpace, SyncReport};
use crate::stats::{KeyValueStore, PropertiesFileStore, StatisticsKeys, SyncStatistics};
use crate::walker::{TreeWalker, WalkResult};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info, warn};
use treesync_types::{EntryFilter, Error, Result, SyncPolicy};

/// Default statistics file, relative to the working directory
pub const DEFAULT_STATISTICS_FILE: &str = "tmp/estatisticas_copias.properties";

/// One source/destination pair and the policy used to keep them in sync
///
/// A session can be run several times; each run shares the backup suffix fixed
/// when the session was created.
pub struct Synchronizer {
    id: uuid::Uuid,
    name: String,
    source: PathBuf,
    destination: PathBuf,
    policy: SyncPolicy,
    filter: SyncFilter,
    store: Option<Arc<dyn KeyValueStore>>,
    keys: StatisticsKeys,
    backup_suffix: String,
    progress_interval: Duration,
    copy_progress_interval: Duration,
    running: AtomicBool,
    source_bytes: AtomicU64,
    synchronized_files: RwLock<Vec<PathBuf>>,
    last_report: RwLock<Option<SyncReport>>,
}

impl Synchronizer {
    /// Session without a display name
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Result<Self> {
        Self::build(String::new(), source.into(), destination.into())
    }

    /// Session whose log lines are prefixed with `"<name> - "`
    pub fn with_name(
        name: impl AsRef<str>,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Result<Self> {
        Self::build(format!("{} - ", name.as_ref()), source.into(), destination.into())
    }

    fn build(name: String, source: PathBuf, destination: PathBuf) -> Result<Self> {
        check_roots(&source, &destination)?;

        Ok(Self {
            id: uuid::Uuid::new_v4(),
            keys: StatisticsKeys::new(&source, &destination),
            name,
            source,
            destination,
            policy: SyncPolicy::default(),
            filter: SyncFilter::new(),
            store: Some(Arc::new(PropertiesFileStore::new(DEFAULT_STATISTICS_FILE))),
            backup_suffix: backup_suffix(chrono::Local::now()),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            copy_progress_interval: DEFAULT_COPY_PROGRESS_INTERVAL,
            running: AtomicBool::new(false),
            source_bytes: AtomicU64::new(0),
            synchronized_files: RwLock::new(Vec::new()),
            last_report: RwLock::new(None),
        })
    }

    /// Replace the whole policy
    pub fn set_policy(&mut self, policy: SyncPolicy) -> &mut Self {
        self.policy = policy;
        self
    }

    /// Compute and log decisions without touching the disk
    pub fn set_simulate(&mut self, simulate: bool) -> &mut Self {
        self.policy.simulate = simulate;
        self
    }

    /// Remove destination entries without a source counterpart
    pub fn set_delete_stale(&mut self, delete_stale: bool) -> &mut Self {
        self.policy.delete_stale = delete_stale;
        self
    }

    /// Rename overwritten or removed entries instead of deleting them
    pub fn set_preserve_old_versions(&mut self, preserve: bool) -> &mut Self {
        self.policy.preserve_old_versions = preserve;
        self
    }

    /// Copy when sizes differ (default on)
    pub fn set_copy_if_sizes_differ(&mut self, enabled: bool) -> &mut Self {
        self.policy.copy_if_sizes_differ = enabled;
        self
    }

    /// Copy when modification times differ (default on)
    pub fn set_copy_if_dates_differ(&mut self, enabled: bool) -> &mut Self {
        self.policy.copy_if_dates_differ = enabled;
        self
    }

    /// Ignore modification time differences up to `millis`
    pub fn set_date_tolerance_millis(&mut self, millis: u64) -> &mut Self {
        self.policy.date_tolerance_millis = millis;
        self
    }

    /// Only create destination folders that end up holding a copied file
    pub fn set_create_dirs_only_with_content(&mut self, enabled: bool) -> &mut Self {
        self.policy.create_dirs_only_with_content = enabled;
        self
    }

    /// Collect the source files consistent with the destination
    pub fn set_track_synchronized_files(&mut self, enabled: bool) -> &mut Self {
        self.policy.track_synchronized_files = enabled;
        self
    }

    /// Only entries accepted by `filter` are copied or removed
    pub fn set_custom_filter(&mut self, filter: Arc<dyn EntryFilter>) -> &mut Self {
        self.filter = SyncFilter::new().with_custom(filter);
        self
    }

    /// Persist statistics in `store`, or nowhere with `None`
    pub fn set_statistics_store(&mut self, store: Option<Arc<dyn KeyValueStore>>) -> &mut Self {
        self.store = store;
        self
    }

    /// Pause between two progress lines
    pub fn set_progress_interval(&mut self, interval: Duration) -> &mut Self {
        self.progress_interval = interval;
        self
    }

    /// Pause between two per-file copy progress lines
    pub fn set_copy_progress_interval(&mut self, interval: Duration) -> &mut Self {
        self.copy_progress_interval = interval;
        self
    }

    /// Source root
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Destination root
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Display name, empty when none was given
    pub fn name(&self) -> &str {
        self.name.strip_suffix(" - ").unwrap_or(&self.name)
    }

    /// Current policy
    pub fn policy(&self) -> &SyncPolicy {
        &self.policy
    }

    /// Whether runs are dry runs
    pub fn is_simulation(&self) -> bool {
        self.policy.simulate
    }

    /// Suffix appended to archived entries, fixed for the session
    pub fn backup_suffix(&self) -> &str {
        &self.backup_suffix
    }

    /// Session identifier used in logs
    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    /// Bytes of source files seen by the last run
    pub fn total_source_bytes(&self) -> u64 {
        self.source_bytes.load(Ordering::Relaxed)
    }

    /// Source files consistent with the destination after the last run, in visit order
    pub async fn synchronized_files(&self) -> Vec<PathBuf> {
        self.synchronized_files.read().await.clone()
    }

    /// Report of the last run, including runs that failed
    pub async fn last_report(&self) -> Option<SyncReport> {
        self.last_report.read().await.clone()
    }

    /// Figures recorded by the previous non-simulated run
    pub async fn previous_statistics(&self) -> SyncStatistics {
        let Some(store) = &self.store else {
            return SyncStatistics::default();
        };
        match SyncStatistics::load(store.as_ref(), &self.keys).await {
            Ok(statistics) => statistics,
            Err(e) => {
                warn!("{}Previous statistics unavailable: {}", self.name, e);
                SyncStatistics::default()
            }
        }
    }

    /// `"Last run: HH:MM:SS.mmm"`, or `"Last run: (unknown duration)"`
    pub async fn previous_run_summary(&self) -> String {
        let statistics = self.previous_statistics().await;
        if statistics.has_duration() {
            format!("Last run: {}", format_duration_hms(statistics.non_copy_time))
        } else {
            "Last run: (unknown duration)".to_string()
        }
    }

    /// Run one synchronization
    ///
    /// Per-entry problems end up in the returned report. Fatal problems are
    /// recorded in [`Self::last_report`] and returned as errors.
    pub async fn sync(&self) -> Result<SyncReport> {
        let _running = RunningGuard::acquire(&self.running)?;
        let started = Instant::now();
        info!(
            "{}Synchronizing {} -> {} (session {})",
            self.name,
            self.source.display(),
            self.destination.display(),
            self.id
        );

        let previous = self.previous_statistics().await;
        let state = Arc::new(ProgressState::new());
        let reporter = ProgressReporter::start(
            self.name.clone(),
            Arc::clone(&state),
            ProgressBaseline {
                previous_folders: previous.folders,
                previous_non_copy: previous.non_copy_time,
            },
            self.progress_interval,
        );

        let walker = TreeWalker::new(
            &self.name,
            self.policy,
            &self.filter,
            &self.backup_suffix,
            self.copy_progress_interval,
            Arc::clone(&state),
        );
        let mut result = WalkResult::new();
        let outcome = walker
            .walk(&self.source, &self.destination, &mut result)
            .await;

        if let Err(e) = &outcome {
            error!("{}Unexpected error: {}", self.name, e);
            result.errors.record(format!("Unexpected error: {e}"));
        }

        state.publish_manipulation(result.manipulation.elapsed());
        state.finish();
        reporter.stop().await;

        let mut report = SyncReport {
            name: self.name().to_string(),
            source: self.source.clone(),
            destination: self.destination.clone(),
            simulated: self.policy.simulate,
            counters: result.counters,
            errors: result.errors,
            warnings: result.warnings,
            total_time: started.elapsed(),
            manipulation_time: result.manipulation.elapsed(),
            free_space: FreeSpace::of(&self.destination),
        };

        self.source_bytes
            .store(report.counters.source_bytes, Ordering::Relaxed);
        *self.synchronized_files.write().await = result.synchronized_files;

        if outcome.is_ok() && !self.policy.simulate {
            self.save_statistics(&mut report).await;
        }

        *self.last_report.write().await = Some(report.clone());
        outcome.map(|()| report)
    }

    /// Run, reporting only whether it completed
    pub async fn sync_safe(&self) -> bool {
        self.sync().await.is_ok()
    }

    async fn save_statistics(&self, report: &mut SyncReport) {
        let Some(store) = &self.store else {
            return;
        };
        let statistics = SyncStatistics {
            folders: report.counters.folders_visited,
            non_copy_time: report.non_copy_time(),
        };
        if let Err(e) = statistics.save(store.as_ref(), &self.keys).await {
            warn!("{}{}", self.name, e);
            report.warnings.record(e.to_string());
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("source", &self.source)
            .field("destination", &self.destination)
            .field("policy", &self.policy)
            .field("filter", &self.filter)
            .field("backup_suffix", &self.backup_suffix)
            .finish_non_exhaustive()
    }
}

/// Clears the running flag when a run ends, however it ends
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::AlreadyRunning)?;
        Ok(Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn check_roots(source: &Path, destination: &Path) -> Result<()> {
    if !source.is_dir() {
        return Err(Error::SourceMissing {
            path: source.to_path_buf(),
        });
    }

    let has_visible_entry = std::fs::read_dir(source)
        .map(|entries| {
            let filter = SyncFilter::new();
            entries
                .filter_map(std::result::Result::ok)
                .any(|entry| filter.is_listed(&entry.path()))
        })
        .unwrap_or(false);
    if !has_visible_entry {
        return Err(Error::SourceUnreadable {
            path: source.to_path_buf(),
        });
    }

    if !destination.is_dir() {
        return Err(Error::DestinationMissing {
            path: destination.to_path_buf(),
        });
    }

    if !is_writable(destination) {
        return Err(Error::DestinationNotWritable {
            path: destination.to_path_buf(),
        });
    }

    Ok(())
}

#[cfg(unix)]
fn is_writable(path: &Path) -> bool {
    nix::unistd::access(path, nix::unistd::AccessFlags::W_OK).is_ok()
}

#[cfg(not(unix))]
fn is_writable(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|metadata| !metadata.permissions().readonly())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::MemoryStore;
    use tempfile::TempDir;

    struct Roots {
        _temp: TempDir,
        source: PathBuf,
        destination: PathBuf,
    }

    fn roots() -> Roots {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source");
        let destination = temp.path().join("destination");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::create_dir_all(&destination).unwrap();
        std::fs::write(source.join("a.txt"), b"alpha").unwrap();
        Roots {
            _temp: temp,
            source,
            destination,
        }
    }

    fn session(roots: &Roots, store: Arc<MemoryStore>) -> Synchronizer {
        let mut sync = Synchronizer::with_name("docs", &roots.source, &roots.destination).unwrap();
        sync.set_statistics_store(Some(store))
            .set_progress_interval(Duration::from_millis(50));
        sync
    }

    #[test]
    fn test_construction_errors() {
        let roots = roots();
        let missing = roots.source.join("missing");

        let error = Synchronizer::new(&missing, &roots.destination).unwrap_err();
        assert!(matches!(error, Error::SourceMissing { .. }));
        assert!(error.is_fatal());

        let empty = roots.source.join("empty");
        std::fs::create_dir_all(&empty).unwrap();
        std::fs::write(empty.join(".DS_Store"), b"").unwrap();
        let error = Synchronizer::new(&empty, &roots.destination).unwrap_err();
        assert!(matches!(error, Error::SourceUnreadable { .. }));

        let error = Synchronizer::new(&roots.source, &missing).unwrap_err();
        assert!(matches!(error, Error::DestinationMissing { .. }));

        let error = Synchronizer::new(&roots.source, roots.source.join("a.txt")).unwrap_err();
        assert!(matches!(error, Error::DestinationMissing { .. }));
    }

    #[test]
    fn test_accessors() {
        let roots = roots();
        let sync = Synchronizer::with_name("docs", &roots.source, &roots.destination).unwrap();
        assert_eq!(sync.name(), "docs");
        assert_eq!(sync.source(), roots.source.as_path());
        assert_eq!(sync.destination(), roots.destination.as_path());
        assert!(!sync.is_simulation());
        assert!(crate::filter::is_backup_name(&format!("x{}", sync.backup_suffix())));

        let unnamed = Synchronizer::new(&roots.source, &roots.destination).unwrap();
        assert_eq!(unnamed.name(), "");
    }

    #[tokio::test]
    async fn test_sync_saves_statistics() {
        let roots = roots();
        let store = Arc::new(MemoryStore::new());
        let sync = session(&roots, Arc::clone(&store));

        assert_eq!(
            sync.previous_run_summary().await,
            "Last run: (unknown duration)"
        );

        let report = sync.sync().await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.name, "docs");
        assert_eq!(report.counters.files_copied, 1);
        assert_eq!(sync.total_source_bytes(), 5);
        assert!(roots.destination.join("a.txt").is_file());

        let keys = StatisticsKeys::new(&roots.source, &roots.destination);
        let saved = store.snapshot().await;
        assert_eq!(saved.get(&keys.folders).map(String::as_str), Some("1"));
        assert!(saved.contains_key(&keys.elapsed));
        assert!(sync.last_report().await.is_some());
    }

    #[tokio::test]
    async fn test_simulation_saves_nothing() {
        let roots = roots();
        let store = Arc::new(MemoryStore::new());
        let mut sync = session(&roots, Arc::clone(&store));
        sync.set_simulate(true);

        let report = sync.sync().await.unwrap();
        assert!(report.simulated);
        assert_eq!(report.counters.files_copied, 1);
        assert!(!roots.destination.join("a.txt").exists());
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_previous_run_summary() {
        let roots = roots();
        let store = Arc::new(MemoryStore::new());
        let keys = StatisticsKeys::new(&roots.source, &roots.destination);
        SyncStatistics {
            folders: 4,
            non_copy_time: Duration::from_millis(3_723_456),
        }
        .save(store.as_ref(), &keys)
        .await
        .unwrap();

        let sync = session(&roots, store);
        assert_eq!(sync.previous_run_summary().await, "Last run: 01:02:03.456");
        assert_eq!(sync.previous_statistics().await.folders, 4);
    }

    #[tokio::test]
    async fn test_concurrent_run_rejected() {
        let roots = roots();
        let sync = session(&roots, Arc::new(MemoryStore::new()));

        let held = RunningGuard::acquire(&sync.running).unwrap();
        let error = sync.sync().await.unwrap_err();
        assert!(matches!(error, Error::AlreadyRunning));
        assert!(!sync.sync_safe().await);
        drop(held);

        assert!(sync.sync_safe().await);
    }

    #[tokio::test]
    async fn test_fatal_error_recorded() {
        let roots = roots();
        let sync = session(&roots, Arc::new(MemoryStore::new()));
        std::fs::remove_dir_all(&roots.source).unwrap();

        let error = sync.sync().await.unwrap_err();
        assert!(error.is_fatal());

        let report = sync.last_report().await.unwrap();
        assert_eq!(report.errors.count(), 1);
        assert!(report.errors.samples()[0].starts_with("Unexpected error: "));
    }
}
