//! Cross-run statistics used to estimate the remaining time of the next run
//!
//! Figures are kept in a flat key/value store shared by every session started
//! from the same working directory. The default backend is a Java-style
//! `.properties` file; keys are namespaced by the literal source and destination
//! paths so unrelated sessions never collide.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::debug;
use treesync_types::{Error, Result};

/// Flat string key/value persistence
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store all `entries`, keeping unrelated keys
    async fn put_all(&self, entries: &[(String, String)]) -> Result<()>;
}

/// `.properties` file backend
#[derive(Debug, Clone)]
pub struct PropertiesFileStore {
    path: PathBuf,
}

impl PropertiesFileStore {
    /// Store backed by `path`; the file and its parent folders are created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path).await {
            Ok(content) => Ok(parse_properties(&content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Statistics file does not exist yet: {}", self.path.display());
                Ok(BTreeMap::new())
            }
            Err(e) => Err(Error::statistics(format!(
                "Failed to read statistics file '{}': {}",
                self.path.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl KeyValueStore for PropertiesFileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load().await?.remove(key))
    }

    async fn put_all(&self, entries: &[(String, String)]) -> Result<()> {
        let mut properties = self.load().await?;
        for (key, value) in entries {
            properties.insert(key.clone(), value.clone());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(|e| {
                Error::statistics(format!(
                    "Failed to create statistics folder '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let header = format!(
            "Backup run statistics\n{}",
            chrono::Local::now().format("%a %b %d %H:%M:%S %Z %Y")
        );
        fs::write(&self.path, write_properties(&properties, Some(&header)))
            .await
            .map_err(|e| {
                Error::statistics(format!(
                    "Failed to write statistics file '{}': {}",
                    self.path.display(),
                    e
                ))
            })?;

        debug!("Saved {} statistics entries", properties.len());
        Ok(())
    }
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything stored
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put_all(&self, entries: &[(String, String)]) -> Result<()> {
        let mut stored = self.entries.write().await;
        for (key, value) in entries {
            stored.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

/// Store keys of one (source, destination) pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatisticsKeys {
    /// Folder count, keyed by source only
    pub folders: String,
    /// Non-copy time, keyed by source and destination
    pub elapsed: String,
}

impl StatisticsKeys {
    /// Keys compatible with existing statistics files
    pub fn new(source: &Path, destination: &Path) -> Self {
        Self {
            folders: format!("total_pastas_copiadas_{}", source.display()),
            elapsed: format!(
                "tempo_ultima_execucao_{}___{}",
                source.display(),
                destination.display()
            ),
        }
    }
}

/// Figures recorded by the previous run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatistics {
    /// Folders processed, 0 when unknown
    pub folders: u64,
    /// Run time not spent manipulating files, zero when unknown
    pub non_copy_time: Duration,
}

impl SyncStatistics {
    /// Read the figures for `keys`; missing or malformed values count as unknown
    pub async fn load(store: &dyn KeyValueStore, keys: &StatisticsKeys) -> Result<Self> {
        let folders = read_u64(store, &keys.folders).await?;
        let elapsed_millis = read_u64(store, &keys.elapsed).await?;
        Ok(Self {
            folders,
            non_copy_time: Duration::from_millis(elapsed_millis),
        })
    }

    /// Overwrite the figures for `keys`
    pub async fn save(&self, store: &dyn KeyValueStore, keys: &StatisticsKeys) -> Result<()> {
        store
            .put_all(&[
                (keys.folders.clone(), self.folders.to_string()),
                (
                    keys.elapsed.clone(),
                    (self.non_copy_time.as_millis() as u64).to_string(),
                ),
            ])
            .await
    }

    /// Whether a previous duration is known
    pub fn has_duration(&self) -> bool {
        !self.non_copy_time.is_zero()
    }
}

async fn read_u64(store: &dyn KeyValueStore, key: &str) -> Result<u64> {
    Ok(store
        .get(key)
        .await?
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0))
}

/// Parse `.properties` text: `#`/`!` comments, `=`, `:` or whitespace separators,
/// backslash escapes and line continuations
pub fn parse_properties(content: &str) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::new();
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim_start();
        if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
            continue;
        }

        let mut logical = trimmed.to_string();
        while ends_with_continuation(&logical) {
            logical.pop();
            match lines.next() {
                Some(next) => logical.push_str(next.trim_start()),
                None => break,
            }
        }

        let (key, value) = split_key_value(&logical);
        properties.insert(unescape(key), unescape(value));
    }

    properties
}

/// Render `.properties` text, one `key=value` per line in key order
pub fn write_properties(properties: &BTreeMap<String, String>, comment: Option<&str>) -> String {
    let mut out = String::new();
    if let Some(comment) = comment {
        for line in comment.lines() {
            out.push('#');
            out.push_str(line);
            out.push('\n');
        }
    }
    for (key, value) in properties {
        out.push_str(&escape(key, true));
        out.push('=');
        out.push_str(&escape(value, false));
        out.push('\n');
    }
    out
}

fn ends_with_continuation(line: &str) -> bool {
    line.chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}

fn split_key_value(line: &str) -> (&str, &str) {
    let mut escaped = false;
    for (index, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' => return (&line[..index], line[index + 1..].trim_start()),
            c if c.is_whitespace() => {
                let rest = line[index..].trim_start();
                let rest = rest
                    .strip_prefix('=')
                    .or_else(|| rest.strip_prefix(':'))
                    .unwrap_or(rest);
                return (&line[..index], rest.trim_start());
            }
            _ => {}
        }
    }
    (line, "")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => out.push_str(&hex),
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, c) in text.chars().enumerate() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\u{000C}' => out.push_str("\\f"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            ' ' if is_key || index == 0 => out.push_str("\\ "),
            c if (c as u32) < 0x20 || (c as u32) > 0x7e => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{:04X}", unit));
                }
            }
            c => out.push(c),
        }
    }
    out
}
