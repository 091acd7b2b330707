// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hw_core::{Artifact, RegistrationSet};
use hw_loader::ArtifactRegistry;
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::loader_trait::Loads;

const DEFAULT_QUIESCE_DELAY: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Quiescing,
    Reloading,
    ReloadingWithPending,
}

struct Inner {
    phase: Phase,
    buffered: Vec<Artifact>,
}

/// Single point of entry for every `ReloadTrigger` observed by any source
/// watcher. Collapses bursts via a quiesce delay and serializes loads: a
/// trigger that arrives mid-load is buffered and re-triggers a fresh
/// quiesce cycle the moment the in-flight load completes, rather than
/// being lost.
pub struct HotReloadCoordinator<L: Loads> {
    loader: Arc<L>,
    registry: Arc<ArtifactRegistry>,
    quiesce_delay: Duration,
    inner: Arc<Mutex<Inner>>,
    tx: watch::Sender<RegistrationSet>,
    poisoned: Arc<AtomicBool>,
}

impl<L: Loads> HotReloadCoordinator<L> {
    pub fn new(loader: Arc<L>, registry: Arc<ArtifactRegistry>) -> (Arc<Self>, watch::Receiver<RegistrationSet>) {
        Self::with_quiesce_delay(loader, registry, DEFAULT_QUIESCE_DELAY)
    }

    pub fn with_quiesce_delay(
        loader: Arc<L>,
        registry: Arc<ArtifactRegistry>,
        quiesce_delay: Duration,
    ) -> (Arc<Self>, watch::Receiver<RegistrationSet>) {
        let (tx, rx) = watch::channel(RegistrationSet::new());
        let coordinator = Arc::new(Self {
            loader,
            registry,
            quiesce_delay,
            inner: Arc::new(Mutex::new(Inner {
                phase: Phase::Idle,
                buffered: Vec::new(),
            })),
            tx,
            poisoned: Arc::new(AtomicBool::new(false)),
        });
        (coordinator, rx)
    }

    pub fn subscribe(&self) -> watch::Receiver<RegistrationSet> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> RegistrationSet {
        self.tx.borrow().clone()
    }

    /// Whether a load pass has previously panicked. A coordinator-internal
    /// panic is fatal to the coordinator: the embedder is expected to stop
    /// its watchers and let the rest of the process (the running worker)
    /// continue unaffected.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// Record a newly observed trigger. Artifacts carried by a feed-poller
    /// trigger, or an already-resolved directory listing for a filesystem
    /// rescan, are merged into whatever is currently buffered. A no-op once
    /// the coordinator is poisoned.
    pub fn handle_trigger(self: &Arc<Self>, artifacts: Vec<Artifact>) {
        if self.is_poisoned() {
            tracing::warn!("coordinator poisoned by a prior panic, dropping trigger");
            return;
        }
        let mut inner = self.inner.lock();
        inner.buffered.extend(artifacts);
        match inner.phase {
            Phase::Idle => {
                inner.phase = Phase::Quiescing;
                drop(inner);
                self.clone().arm_quiesce_timer();
            }
            Phase::Quiescing => {
                // Already armed; the new artifacts ride the existing timer.
            }
            Phase::Reloading => {
                inner.phase = Phase::ReloadingWithPending;
            }
            Phase::ReloadingWithPending => {}
        }
    }

    fn arm_quiesce_timer(self: Arc<Self>) {
        tokio::spawn(async move {
            tokio::time::sleep(self.quiesce_delay).await;
            self.begin_reload();
        });
    }

    fn begin_reload(self: Arc<Self>) {
        let artifacts = {
            let mut inner = self.inner.lock();
            inner.phase = Phase::Reloading;
            std::mem::take(&mut inner.buffered)
        };

        tokio::spawn(async move {
            self.clone().perform_load(artifacts).await;

            let reschedule = {
                let mut inner = self.inner.lock();
                match inner.phase {
                    Phase::ReloadingWithPending => {
                        inner.phase = Phase::Quiescing;
                        true
                    }
                    _ => {
                        inner.phase = Phase::Idle;
                        false
                    }
                }
            };
            if reschedule {
                self.arm_quiesce_timer();
            }
        });
    }

    async fn perform_load(self: Arc<Self>, artifacts: Vec<Artifact>) {
        if artifacts.is_empty() {
            tracing::debug!("reload pass triggered with no resolved artifacts, nothing to load");
            return;
        }

        let registry = self.registry.clone();
        let loader = self.loader.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut loaded_ids = Vec::new();
            for artifact in &artifacts {
                match loader.load(artifact) {
                    Ok(entry) => {
                        let id = artifact.identity();
                        registry.insert(id.clone(), entry);
                        let superseded = registry.supersede_previous_versions(&id);
                        if !superseded.is_empty() {
                            tracing::info!(
                                package = id.id,
                                superseded = superseded.len(),
                                "older version(s) of package superseded, marked unloading"
                            );
                            // Nothing in this process keeps a container reference
                            // once it drops out of the registry (task execution
                            // against a container's instance is out of scope
                            // here), so there is no separate "still referenced by
                            // in-flight work" interval to wait out.
                            for entry in &superseded {
                                entry.container.mark_collectible();
                            }
                        }
                        loaded_ids.push(id);
                    }
                    Err(e) => {
                        tracing::error!(artifact = %artifact.identity(), error = %e, "failed to load artifact, keeping previous version resident");
                    }
                }
            }
            loaded_ids
        })
        .await;

        match result {
            Ok(loaded_ids) if !loaded_ids.is_empty() => {
                let merged = self.registry.merged_registrations();
                tracing::info!(
                    artifacts = loaded_ids.len(),
                    tasks = merged.task_count(),
                    workflows = merged.workflow_count(),
                    "reload pass complete"
                );
                let _ = self.tx.send(merged);
            }
            Ok(_) => {
                tracing::warn!("reload pass loaded zero artifacts successfully");
            }
            Err(e) => {
                tracing::error!(error = %e, "reload pass panicked, poisoning coordinator");
                self.poisoned.store(true, Ordering::SeqCst);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_core::{ArtifactId, RegistryEntry};
    use hw_loader::CodeContainer;
    use std::path::PathBuf;
    use std::time::SystemTime;

    struct CountingLoader {
        calls: std::sync::atomic::AtomicU32,
    }

    impl Loads for CountingLoader {
        fn load(
            &self,
            artifact: &Artifact,
        ) -> Result<RegistryEntry<Arc<CodeContainer>>, hw_loader::LoaderError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let mut registrations = RegistrationSet::new();
            registrations.insert_task(hw_core::TaskHandle::new(
                format!("{}Task", artifact.id),
                artifact.identity(),
                1,
            ));
            Ok(RegistryEntry::new(
                Arc::new(CodeContainer::empty_for_test()),
                registrations,
                SystemTime::now(),
            ))
        }
    }

    fn artifact(id: &str) -> Artifact {
        Artifact::new(id, "1.0.0", PathBuf::from(format!("/tmp/{id}")))
    }

    #[tokio::test]
    async fn single_trigger_publishes_registrations() {
        let loader = Arc::new(CountingLoader {
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let (coordinator, mut rx) =
            HotReloadCoordinator::with_quiesce_delay(loader, Arc::new(ArtifactRegistry::new()), Duration::from_millis(20));

        coordinator.handle_trigger(vec![artifact("demo")]);

        rx.changed().await.unwrap();
        let registrations = rx.borrow().clone();
        assert_eq!(registrations.task_count(), 1);
    }

    #[tokio::test]
    async fn trigger_during_reload_is_buffered_and_reruns() {
        let loader = Arc::new(CountingLoader {
            calls: std::sync::atomic::AtomicU32::new(0),
        });
        let (coordinator, mut rx) =
            HotReloadCoordinator::with_quiesce_delay(loader.clone(), Arc::new(ArtifactRegistry::new()), Duration::from_millis(20));

        coordinator.handle_trigger(vec![artifact("first")]);
        rx.changed().await.unwrap();

        coordinator.handle_trigger(vec![artifact("second")]);
        rx.changed().await.unwrap();

        let registrations = rx.borrow().clone();
        assert_eq!(registrations.task_count(), 2);
        assert_eq!(loader.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    struct PanickingLoader;

    impl Loads for PanickingLoader {
        fn load(
            &self,
            _artifact: &Artifact,
        ) -> Result<RegistryEntry<Arc<CodeContainer>>, hw_loader::LoaderError> {
            panic!("simulated loader panic");
        }
    }

    #[tokio::test]
    async fn panic_during_load_poisons_coordinator_and_drops_further_triggers() {
        let (coordinator, _rx) = HotReloadCoordinator::with_quiesce_delay(
            Arc::new(PanickingLoader),
            Arc::new(ArtifactRegistry::new()),
            Duration::from_millis(10),
        );

        coordinator.handle_trigger(vec![artifact("boom")]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(coordinator.is_poisoned());

        // A trigger after poisoning is dropped rather than queued.
        coordinator.handle_trigger(vec![artifact("after")]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(coordinator.is_poisoned());
    }

    #[test]
    fn artifact_id_constructor() {
        let id = ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        };
        assert_eq!(id.to_string(), "demo@1.0.0");
    }
}
