//! Chunked file copy with throttled progress lines and attribute preservation

use crate::report::byte_count_to_display_size;
use filetime::FileTime;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info};

/// Size of each read while streaming a file
pub const COPY_CHUNK_SIZE: usize = 10_000;

/// Default pause between two per-file progress lines
pub const DEFAULT_COPY_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Streams files to the destination
#[derive(Debug, Clone)]
pub struct FileCopier {
    name: String,
    progress_interval: Duration,
}

impl FileCopier {
    /// Copier logging with the session prefix `name`
    pub fn new(name: impl Into<String>, progress_interval: Duration) -> Self {
        Self {
            name: name.into(),
            progress_interval,
        }
    }

    /// Copy contents, then modification time and (best effort) permissions
    ///
    /// Returns the number of bytes written.
    pub async fn copy_with_attributes(&self, source: &Path, destination: &Path) -> std::io::Result<u64> {
        debug!("{}Copying file {}", self.name, source.display());
        let copied = self.copy_contents(source, destination).await?;

        let metadata = fs::metadata(source).await?;
        let modified = FileTime::from_last_modification_time(&metadata);
        let target = destination.to_path_buf();
        tokio::task::spawn_blocking(move || filetime::set_file_mtime(&target, modified))
            .await
            .map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::Other, format!("Task join error: {}", e))
            })??;

        if let Err(e) = fs::set_permissions(destination, metadata.permissions()).await {
            debug!(
                "{}Permissions not preserved on {}: {}",
                self.name,
                destination.display(),
                e
            );
        }

        Ok(copied)
    }

    /// Stream `source` into `destination` in fixed-size chunks
    pub async fn copy_contents(&self, source: &Path, destination: &Path) -> std::io::Result<u64> {
        let mut reader = fs::File::open(source).await?;
        let total = reader.metadata().await?.len();
        let mut writer = fs::File::create(destination).await?;

        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut copied: u64 = 0;
        let mut since_last_line: u64 = 0;
        let mut last_line = Instant::now();

        loop {
            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
            copied += read as u64;
            since_last_line += read as u64;

            let elapsed = last_line.elapsed();
            if elapsed > self.progress_interval {
                info!(
                    "{}{}",
                    self.name,
                    copy_progress_line(copied, total, since_last_line, elapsed)
                );
                last_line = Instant::now();
                since_last_line = 0;
            }
        }

        writer.flush().await?;
        Ok(copied)
    }
}

impl Default for FileCopier {
    fn default() -> Self {
        Self::new("", DEFAULT_COPY_PROGRESS_INTERVAL)
    }
}

/// `* 42.5% (3 MB/8 MB - 1 MB/s)`
pub fn copy_progress_line(copied: u64, total: u64, recent: u64, elapsed: Duration) -> String {
    let percent = if total > 0 {
        (copied as f64 * 1000.0 / total as f64).floor() / 10.0
    } else {
        100.0
    };
    let millis = elapsed.as_millis().max(1) as u64;
    let rate = recent.saturating_mul(1000) / millis;
    format!(
        "* {:.1}% ({}/{} - {}/s)",
        percent,
        byte_count_to_display_size(copied),
        byte_count_to_display_size(total),
        byte_count_to_display_size(rate)
    )
}
