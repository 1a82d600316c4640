//! Run results: error and warning samples, counters, timings and the rendered summary

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};
use treesync_types::RunCounters;

/// Maximum number of messages kept per log; the count keeps growing past it
pub const SAMPLE_LIMIT: usize = 100;

/// Bounded sample of problems with an unbounded counter
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueLog {
    count: u64,
    samples: Vec<String>,
}

impl IssueLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one problem, keeping its message while under the sample limit
    pub fn record(&mut self, message: impl Into<String>) {
        self.count += 1;
        if self.samples.len() < SAMPLE_LIMIT {
            self.samples.push(message.into());
        }
    }

    /// Count a problem about `path`, appending the path unless the message already names it
    pub fn record_for(&mut self, message: impl Into<String>, path: &Path) {
        let mut message = message.into();
        let shown = path.display().to_string();
        if !message.contains(&shown) {
            message.push_str(" - ");
            message.push_str(&shown);
        }
        self.record(message);
    }

    /// Total number of problems recorded
    pub fn count(&self) -> u64 {
        self.count
    }

    /// First recorded messages
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Accumulates time only while running, like a pausable stopwatch
#[derive(Debug, Clone, Copy, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    resumed_at: Option<std::time::Instant>,
}

impl Stopwatch {
    /// Stopped stopwatch at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or continue measuring
    pub fn resume(&mut self) {
        if self.resumed_at.is_none() {
            self.resumed_at = Some(std::time::Instant::now());
        }
    }

    /// Stop measuring, keeping the time so far
    pub fn suspend(&mut self) {
        if let Some(resumed_at) = self.resumed_at.take() {
            self.accumulated += resumed_at.elapsed();
        }
    }

    /// Total measured time, including a running interval
    pub fn elapsed(&self) -> Duration {
        self.accumulated
            + self
                .resumed_at
                .map_or(Duration::ZERO, |resumed_at| resumed_at.elapsed())
    }
}

/// Free and total space of the destination filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeSpace {
    /// Bytes available to unprivileged users
    pub usable: u64,
    /// Filesystem size in bytes
    pub total: u64,
}

impl FreeSpace {
    /// Query the filesystem holding `path`
    #[cfg(unix)]
    pub fn of(path: &Path) -> Option<Self> {
        let stats = nix::sys::statvfs::statvfs(path).ok()?;
        let fragment = stats.fragment_size() as u64;
        Some(Self {
            usable: stats.blocks_available() as u64 * fragment,
            total: stats.blocks() as u64 * fragment,
        })
    }

    /// Query the filesystem holding `path`
    #[cfg(not(unix))]
    pub fn of(_path: &Path) -> Option<Self> {
        None
    }

    /// `"<usable> of <total> (<pct>%)"`
    pub fn describe(&self) -> String {
        let mut text = format!(
            "{} of {}",
            display_size_with_bytes(self.usable),
            display_size_with_bytes(self.total)
        );
        if self.total > 0 {
            let permille = self.usable as f64 * 1000.0 / self.total as f64;
            text.push_str(&format!(" ({:.1}%)", (permille.floor()) / 10.0));
        }
        text
    }
}

/// Everything a finished (or aborted) run produced
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Session display name, without the log separator
    pub name: String,
    /// Source root
    pub source: PathBuf,
    /// Destination root
    pub destination: PathBuf,
    /// Whether the run was a dry run
    pub simulated: bool,
    /// Counters accumulated by the walk
    pub counters: RunCounters,
    /// Per-entry and fatal errors
    pub errors: IssueLog,
    /// Skipped entries and fallbacks
    pub warnings: IssueLog,
    /// Wall time of the whole run
    pub total_time: Duration,
    /// Time spent renaming, deleting and copying
    pub manipulation_time: Duration,
    /// Destination free space when it could be queried
    pub free_space: Option<FreeSpace>,
}

impl SyncReport {
    /// Whether the run recorded no error
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Time not spent manipulating files, the figure used for the next run's ETA
    pub fn non_copy_time(&self) -> Duration {
        self.total_time.saturating_sub(self.manipulation_time)
    }

    /// Summary lines, in display order
    pub fn render(&self) -> Vec<SummaryLine> {
        let mut lines = Vec::new();

        if !self.name.is_empty() {
            lines.push(SummaryLine::info(format!("========== {} ==========", self.name)));
        }

        if self.errors.is_empty() {
            lines.push(SummaryLine::info("No errors!"));
        } else {
            lines.push(SummaryLine::error(format!(
                "Files with errors (details in the logs): {}. Sample:",
                self.errors.count()
            )));
            for sample in self.errors.samples() {
                lines.push(SummaryLine::error(format!("* {sample}")));
            }
        }

        if self.warnings.is_empty() {
            lines.push(SummaryLine::info("No warnings!"));
        } else {
            lines.push(SummaryLine::warning(format!(
                "Warnings (details in the logs): {}. Sample:",
                self.warnings.count()
            )));
            for sample in self.warnings.samples() {
                lines.push(SummaryLine::warning(format!("* {sample}")));
            }
        }

        let counters = &self.counters;
        let rows = [
            ("Source folder:", self.source.display().to_string()),
            ("Destination folder:", self.destination.display().to_string()),
            ("Total run time:", format_duration_hms(self.total_time)),
            (
                "Time manipulating files:",
                format_duration_hms(self.manipulation_time),
            ),
            (
                "Source folders checked:",
                counters.folders_visited.to_string(),
            ),
            (
                "Source files checked:",
                format!(
                    "{} - {}",
                    counters.source_files,
                    display_size_with_bytes(counters.source_bytes)
                ),
            ),
            (
                "Files copied to destination:",
                format!(
                    "{} - {}",
                    counters.files_copied,
                    display_size_with_bytes(counters.bytes_copied)
                ),
            ),
            (
                "Entries deleted from destination:",
                counters.entries_deleted.to_string(),
            ),
            (
                "Entries renamed in destination:",
                counters.entries_renamed.to_string(),
            ),
            (
                "Files already synchronized:",
                format!(
                    "{} - {}",
                    counters.files_in_sync,
                    display_size_with_bytes(counters.bytes_in_sync)
                ),
            ),
        ];
        for (label, value) in rows {
            lines.push(SummaryLine::info(format!("{label:<35}{value}")));
        }

        if let Some(free_space) = &self.free_space {
            lines.push(SummaryLine::info(format!(
                "{:<35}{}",
                "Destination free space:",
                free_space.describe()
            )));
        }

        if self.simulated {
            lines.push(SummaryLine::info("Dry run: nothing was changed on disk"));
        }

        lines
    }

    /// Emit the summary through `tracing`
    pub fn log(&self) {
        for line in self.render() {
            match line.level {
                SummaryLevel::Info => info!("{}", line.text),
                SummaryLevel::Warning => warn!("{}", line.text),
                SummaryLevel::Error => error!("{}", line.text),
            }
        }
    }
}

/// Level a summary line is reported at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryLevel {
    /// Informational
    Info,
    /// Warning sample
    Warning,
    /// Error sample
    Error,
}

/// One rendered summary line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryLine {
    /// Reporting level
    pub level: SummaryLevel,
    /// Text without trailing newline
    pub text: String,
}

impl SummaryLine {
    fn info(text: impl Into<String>) -> Self {
        Self {
            level: SummaryLevel::Info,
            text: text.into(),
        }
    }

    fn warning(text: impl Into<String>) -> Self {
        Self {
            level: SummaryLevel::Warning,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Self {
            level: SummaryLevel::Error,
            text: text.into(),
        }
    }
}

const KB: u64 = 1024;

/// Human-readable size truncated to whole units, e.g. `"1 KB"`, `"3 MB"`, `"512 bytes"`
pub fn byte_count_to_display_size(bytes: u64) -> String {
    const UNITS: [(&str, u32); 6] = [
        ("EB", 6),
        ("PB", 5),
        ("TB", 4),
        ("GB", 3),
        ("MB", 2),
        ("KB", 1),
    ];

    for (unit, power) in UNITS {
        let size = KB.pow(power);
        if bytes / size > 0 {
            return format!("{} {}", bytes / size, unit);
        }
    }
    format!("{bytes} bytes")
}

/// Display size followed by the exact grouped byte count, e.g. `"1 MB/1,048,576B"`
pub fn display_size_with_bytes(bytes: u64) -> String {
    let display = byte_count_to_display_size(bytes);
    if bytes > 0 {
        format!("{display}/{}B", group_thousands(bytes))
    } else {
        display
    }
}

/// `1234567` becomes `"1,234,567"`
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// `HH:MM:SS.mmm`, hours not wrapped at 24
pub fn format_duration_hms(duration: Duration) -> String {
    let millis = duration.as_millis();
    let hours = millis / 3_600_000;
    let minutes = (millis / 60_000) % 60;
    let seconds = (millis / 1000) % 60;
    format!(
        "{:02}:{:02}:{:02}.{:03}",
        hours,
        minutes,
        seconds,
        millis % 1000
    )
}
