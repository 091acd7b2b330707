// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide table of loaded artifacts.

use std::collections::HashMap;
use std::sync::Arc;

use hw_core::{ArtifactId, RegistrationSet, RegistryEntry};
use parking_lot::Mutex;

use crate::container::CodeContainer;

/// Owned by `hw-loader`, handed to `hw-coordinator` as an `Arc` so both the
/// reload path and any introspection callers share one table.
#[derive(Default)]
pub struct ArtifactRegistry {
    entries: Mutex<HashMap<ArtifactId, RegistryEntry<Arc<CodeContainer>>>>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: ArtifactId, entry: RegistryEntry<Arc<CodeContainer>>) {
        self.entries.lock().insert(id, entry);
    }

    pub fn remove(&self, id: &ArtifactId) -> Option<RegistryEntry<Arc<CodeContainer>>> {
        self.entries.lock().remove(id)
    }

    /// Remove every resident entry for the same package id but a different
    /// version than `keep`, marking each superseded container `Unloading`
    /// before returning it: a reload replaces the prior version of
    /// a package rather than accumulating every version ever seen.
    pub fn supersede_previous_versions(
        &self,
        keep: &ArtifactId,
    ) -> Vec<RegistryEntry<Arc<CodeContainer>>> {
        let mut entries = self.entries.lock();
        let stale_ids: Vec<ArtifactId> = entries
            .keys()
            .filter(|existing| existing.id == keep.id && existing.version != keep.version)
            .cloned()
            .collect();
        stale_ids
            .into_iter()
            .filter_map(|stale_id| entries.remove(&stale_id))
            .inspect(|entry| entry.container.mark_unloading())
            .collect()
    }

    pub fn contains(&self, id: &ArtifactId) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Merge every resident entry's registrations into one authoritative
    /// set, ordered by last-processed time so the most recently (re)loaded
    /// artifact wins any name collision ("last loaded wins").
    pub fn merged_registrations(&self) -> RegistrationSet {
        let entries = self.entries.lock();
        let mut ordered: Vec<_> = entries.values().collect();
        ordered.sort_by_key(|entry| entry.last_processed);

        let mut merged = RegistrationSet::new();
        for entry in ordered {
            merged.merge(entry.registrations.clone());
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_core::RegistrationSet;
    use std::time::SystemTime;

    fn id() -> ArtifactId {
        ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        }
    }

    #[test]
    fn insert_then_remove_round_trips() {
        let registry = ArtifactRegistry::new();
        let container = Arc::new(CodeContainer::new(wasmtime::Engine::default(), Vec::new()));
        registry.insert(
            id(),
            RegistryEntry::new(container, RegistrationSet::new(), SystemTime::now()),
        );
        assert!(registry.contains(&id()));
        assert_eq!(registry.len(), 1);
        assert!(registry.remove(&id()).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn supersede_removes_only_older_versions_of_the_same_package() {
        let registry = ArtifactRegistry::new();
        let old = ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        };
        let new = ArtifactId {
            id: "demo".into(),
            version: "1.1.0".into(),
        };
        let other = ArtifactId {
            id: "other".into(),
            version: "1.0.0".into(),
        };

        for entry_id in [&old, &new, &other] {
            registry.insert(
                entry_id.clone(),
                RegistryEntry::new(
                    Arc::new(CodeContainer::empty_for_test()),
                    RegistrationSet::new(),
                    SystemTime::now(),
                ),
            );
        }

        let superseded = registry.supersede_previous_versions(&new);
        assert_eq!(superseded.len(), 1);
        assert_eq!(superseded[0].container.state(), crate::container::ContainerState::Unloading);

        assert!(!registry.contains(&old));
        assert!(registry.contains(&new));
        assert!(registry.contains(&other));
    }
}
