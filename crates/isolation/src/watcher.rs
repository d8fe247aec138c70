// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polls a mounted workspace tree for file changes by diffing mtimes
//! against a baseline snapshot, on an interval — no inotify/FSEvents
//! dependency, since the mount may be a remote or virtualized filesystem
//! where native watch APIs don't reach.

use ctlplane_core::Context;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::Instrument;

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const ERROR_RING_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub interval: Duration,
    pub exclude_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { interval: DEFAULT_INTERVAL, exclude_patterns: crate::mount::default_excludes() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone)]
pub struct Change {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

/// Fixed-capacity ring of the watcher's most recent scan errors, newest
/// last. Scan errors (a transient permission denial, a file that
/// disappeared mid-stat) never stop the loop; they just accumulate here
/// for `inspect`-style surfacing.
#[derive(Debug, Default)]
pub struct ErrorRing {
    entries: std::collections::VecDeque<String>,
}

impl ErrorRing {
    fn push(&mut self, message: String) {
        if self.entries.len() == ERROR_RING_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(message);
    }

    pub fn recent(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }
}

fn is_excluded(path: &Path, root: &Path, patterns: &[String]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else { return false };
    relative.components().any(|component| {
        let component = component.as_os_str().to_string_lossy();
        patterns.iter().any(|pattern| component == pattern.as_str())
    })
}

fn scan(root: &Path, patterns: &[String], errors: &mut ErrorRing) -> HashMap<PathBuf, SystemTime> {
    let mut snapshot = HashMap::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) => {
                errors.push(format!("read_dir {}: {e}", dir.display()));
                continue;
            }
        };
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    errors.push(format!("dir entry in {}: {e}", dir.display()));
                    continue;
                }
            };
            let path = entry.path();
            if is_excluded(&path, root, patterns) {
                continue;
            }
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    errors.push(format!("stat {}: {e}", path.display()));
                    continue;
                }
            };
            if metadata.is_dir() {
                stack.push(path);
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            snapshot.insert(path, modified);
        }
    }
    snapshot
}

fn diff(
    previous: &HashMap<PathBuf, SystemTime>,
    current: &HashMap<PathBuf, SystemTime>,
) -> Vec<Change> {
    let mut changes = Vec::new();
    for (path, mtime) in current {
        match previous.get(path) {
            None => changes.push(Change { path: path.clone(), kind: ChangeKind::Created }),
            Some(prev_mtime) if prev_mtime != mtime => {
                changes.push(Change { path: path.clone(), kind: ChangeKind::Modified })
            }
            _ => {}
        }
    }
    for path in previous.keys() {
        if !current.contains_key(path) {
            changes.push(Change { path: path.clone(), kind: ChangeKind::Removed });
        }
    }
    changes
}

/// A single workspace's background change watcher. Runs until the supplied
/// context is cancelled; each tick's changes are delivered through `on_change`.
pub struct Watcher {
    root: PathBuf,
    config: WatcherConfig,
    errors: ErrorRing,
}

impl Watcher {
    pub fn new(root: PathBuf, config: WatcherConfig) -> Self {
        Self { root, config, errors: ErrorRing::default() }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.recent()
    }

    /// Run the poll loop, invoking `on_change` with every batch of changes
    /// detected since the previous tick. Returns once `ctx` is cancelled.
    pub async fn run(mut self, ctx: Context, mut on_change: impl FnMut(Vec<Change>)) {
        let span = tracing::info_span!("watcher.run", root = %self.root.display());
        async move {
            let mut baseline = scan(&self.root, &self.config.exclude_patterns, &mut self.errors);
            let token = ctx.token();
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(self.config.interval) => {}
                }
                if ctx.is_expired() {
                    break;
                }
                let current = scan(&self.root, &self.config.exclude_patterns, &mut self.errors);
                let changes = diff(&baseline, &current);
                if !changes.is_empty() {
                    tracing::debug!(count = changes.len(), "detected workspace changes");
                    on_change(changes);
                }
                baseline = current;
            }
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "watcher_tests.rs"]
mod tests;
