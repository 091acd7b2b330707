// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event a source watcher fires when it believes new plugin code is available.

use crate::Artifact;

/// Fired by a [`SourceWatcher`](../../hw_watch/trait.SourceWatcher.html) when
/// it has identified one or more artifacts it considers new.
///
/// The filesystem variant may fire with an empty list, meaning "something
/// changed, please rescan"; the feed variant always fires with the
/// concrete list of newly downloaded artifacts.
#[derive(Debug, Clone, Default)]
pub struct ReloadTrigger {
    pub artifacts: Vec<Artifact>,
}

impl ReloadTrigger {
    pub fn rescan() -> Self {
        Self::default()
    }

    pub fn with_artifacts(artifacts: Vec<Artifact>) -> Self {
        Self { artifacts }
    }

    pub fn is_rescan(&self) -> bool {
        self.artifacts.is_empty()
    }
}
