// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Plugin Source Watchers: background tasks that observe a
//! filesystem directory, a remote package feed, or both, and emit a
//! [`hw_core::ReloadTrigger`] whenever they believe new plugin code is
//! available. Watchers never load or parse plugin code themselves; that is
//! `hw-loader`'s job.

mod combined;
mod error;
mod feed;
mod fs;

pub use combined::CombinedWatcher;
pub use error::WatchError;
pub use feed::RemoteFeedPoller;
pub use fs::FilesystemWatcher;

use tokio::sync::{mpsc, oneshot};

/// A running watcher: a channel of triggers, and a handle to stop it.
pub struct WatcherHandle {
    pub triggers: mpsc::Receiver<hw_core::ReloadTrigger>,
    shutdown: oneshot::Sender<()>,
}

impl WatcherHandle {
    pub(crate) fn new(
        triggers: mpsc::Receiver<hw_core::ReloadTrigger>,
        shutdown: oneshot::Sender<()>,
    ) -> Self {
        Self { triggers, shutdown }
    }

    pub fn stop(self) {
        let _ = self.shutdown.send(());
    }
}
