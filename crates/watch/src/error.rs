// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("failed to watch path {path}: {source}")]
    FilesystemWatch {
        path: String,
        #[source]
        source: notify::Error,
    },
    #[error("no watch paths configured for filesystem watcher")]
    NoWatchPaths,
}
