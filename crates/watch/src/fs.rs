// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem-backed source watcher.
//!
//! Watches the configured directories for changes to files matching
//! `file_filter`. Debounce is fire-and-reset: every eligible event pushes
//! the fire deadline `debounce` further out, so a burst of touches within
//! the window collapses into exactly one [`hw_core::ReloadTrigger`]. A
//! rescan trigger carries no artifacts; `hw-loader` is expected to re-walk
//! the watched paths itself.

use std::path::{Path, PathBuf};
use std::time::Duration;

use hw_core::ReloadTrigger;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;

use crate::{WatchError, WatcherHandle};

pub struct FilesystemWatcher {
    paths: Vec<PathBuf>,
    file_filter: String,
    debounce: Duration,
    denylist: Vec<&'static str>,
}

impl FilesystemWatcher {
    pub fn new(paths: Vec<PathBuf>, file_filter: impl Into<String>, debounce: Duration) -> Self {
        Self::with_denylist(paths, file_filter, debounce, Vec::new())
    }

    /// `denylist` excludes runtime-platform libraries, temp files, and the
    /// orchestration SDK itself from triggering a reload.
    pub fn with_denylist(
        paths: Vec<PathBuf>,
        file_filter: impl Into<String>,
        debounce: Duration,
        denylist: Vec<&'static str>,
    ) -> Self {
        Self {
            paths,
            file_filter: file_filter.into(),
            debounce,
            denylist,
        }
    }

    pub fn start(self) -> Result<WatcherHandle, WatchError> {
        if self.paths.is_empty() {
            return Err(WatchError::NoWatchPaths);
        }

        let (raw_tx, mut raw_rx) = mpsc::channel::<PathBuf>(256);
        let filter = self.file_filter.clone();
        let denylist = self.denylist.clone();
        let mut watcher = notify::recommended_watcher(move |res: Result<notify::Event, _>| {
            let Ok(event) = res else { return };
            for path in event.paths {
                if path_matches(&path, &filter) && !path_denylisted(&path, &denylist) {
                    let _ = raw_tx.blocking_send(path);
                }
            }
        })
        .map_err(|source| WatchError::FilesystemWatch {
            path: "<init>".to_string(),
            source,
        })?;

        for path in &self.paths {
            watcher
                .watch(path, RecursiveMode::Recursive)
                .map_err(|source| WatchError::FilesystemWatch {
                    path: path.display().to_string(),
                    source,
                })?;
        }

        let (trigger_tx, trigger_rx) = mpsc::channel::<ReloadTrigger>(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let debounce = self.debounce;

        tokio::spawn(async move {
            // Keep the watcher alive for the lifetime of the task.
            let _watcher = watcher;
            debounce_loop(&mut raw_rx, trigger_tx, debounce, shutdown_rx).await;
        });

        Ok(WatcherHandle::new(trigger_rx, shutdown_tx))
    }
}

async fn debounce_loop(
    raw_rx: &mut mpsc::Receiver<PathBuf>,
    trigger_tx: mpsc::Sender<ReloadTrigger>,
    debounce: Duration,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let mut armed = false;
    let mut deadline = Instant::now() + debounce;

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown_rx => {
                tracing::debug!("filesystem watcher shutdown requested");
                break;
            }

            maybe_path = raw_rx.recv() => {
                let Some(path) = maybe_path else {
                    tracing::warn!("filesystem event channel closed");
                    break;
                };
                tracing::debug!(path = %path.display(), "eligible filesystem event observed");
                deadline = Instant::now() + debounce;
                armed = true;
            }

            _ = tokio::time::sleep_until(deadline), if armed => {
                armed = false;
                tracing::info!("debounce window elapsed, emitting rescan trigger");
                if trigger_tx.send(ReloadTrigger::rescan()).await.is_err() {
                    break;
                }
            }
        }
    }
}

/// Whether `path`'s filename matches the configured filter. Supports the
/// single `*`-glob shapes `HOT_RELOAD_FILE_FILTER` uses (`*.wasm`, `*.zip`,
/// literal names).
fn path_matches(path: &Path, filter: &str) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    match filter.strip_prefix('*') {
        Some(suffix) => name.ends_with(suffix),
        None => name == filter,
    }
}

/// Whether `path`'s filename matches any entry in the platform-library
/// exclusion list: runtime-platform libraries, temp files, and the
/// orchestration SDK itself never trigger a reload.
fn path_denylisted(path: &Path, denylist: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    denylist.iter().any(|d| name.contains(d))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;
    use yare::parameterized;

    #[parameterized(
        suffix_match = { "library/plugin.wasm", "*.wasm", true },
        suffix_mismatch = { "library/plugin.zip", "*.wasm", false },
        literal_match = { "manifest.json", "manifest.json", true },
        literal_mismatch = { "other.json", "manifest.json", false },
    )]
    fn filter_matching(path: &str, filter: &str, expected: bool) {
        assert_eq!(path_matches(Path::new(path), filter), expected);
    }

    #[parameterized(
        denylisted = { "wasi_snapshot_preview1.wasm", true },
        plain_module = { "plugin.wasm", false },
    )]
    fn denylist_matching(name: &str, expected: bool) {
        assert_eq!(
            path_denylisted(Path::new(name), &["wasi_snapshot_preview1"]),
            expected
        );
    }

    #[tokio::test]
    async fn burst_of_touches_collapses_to_one_trigger() {
        let dir = tempdir().unwrap();
        let watcher = FilesystemWatcher::new(
            vec![dir.path().to_path_buf()],
            "*.wasm",
            StdDuration::from_millis(200),
        );
        let mut handle = watcher.start().unwrap();

        let file_path = dir.path().join("plugin.wasm");
        for _ in 0..5 {
            fs::write(&file_path, b"module").unwrap();
            tokio::time::sleep(StdDuration::from_millis(50)).await;
        }

        let trigger = tokio::time::timeout(StdDuration::from_secs(2), handle.triggers.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(trigger.is_rescan());

        let second = tokio::time::timeout(StdDuration::from_millis(300), handle.triggers.recv()).await;
        assert!(second.is_err(), "expected no second trigger within the debounce window");
    }
}
