// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use hw_adapters::OrchestrationClient;
use hw_core::{Config, Epoch, RegistrationSet};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::LifecycleError;

/// Replaced workers get this long to drain in-flight work after being
/// cancelled before the manager stops waiting on them.
const SOFT_DRAIN_CAP: Duration = Duration::from_secs(10);
/// Process shutdown gets this long for the final generation to drain
/// before the manager gives up and returns anyway.
const HARD_SHUTDOWN_CAP: Duration = Duration::from_secs(15);

struct Generation {
    epoch: Epoch,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct State {
    epoch: Epoch,
    current: Option<Generation>,
}

/// Owns the single currently-running worker generation and replaces it on
/// every reload, guarding each transition with a monotonic epoch so a slow
/// generation's completion can never clobber a newer one's bookkeeping.
pub struct WorkerLifecycleManager<C: OrchestrationClient> {
    client: Arc<C>,
    config: Config,
    baseline: RegistrationSet,
    state: Mutex<State>,
    current_registration: ArcSwap<RegistrationSet>,
    started_at: std::time::Instant,
}

impl<C: OrchestrationClient> WorkerLifecycleManager<C> {
    pub fn new(client: Arc<C>, config: Config, baseline: RegistrationSet) -> Arc<Self> {
        Arc::new(Self {
            client,
            config,
            current_registration: ArcSwap::from_pointee(baseline.clone()),
            baseline,
            state: Mutex::new(State {
                epoch: Epoch::INITIAL,
                current: None,
            }),
            started_at: std::time::Instant::now(),
        })
    }

    /// Current live registration set, readable without taking the state lock.
    pub fn current_registration(&self) -> Arc<RegistrationSet> {
        self.current_registration.load_full()
    }

    /// Whether a worker generation is currently live (health
    /// contract's `worker.isRunning`).
    pub fn is_running(&self) -> bool {
        self.state.lock().current.is_some()
    }

    /// Wall-clock time since this manager was constructed (health
    /// contract's `uptime`).
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Connect to the orchestration server and spawn the first worker
    /// generation. A failure here is fatal: the daemon should exit.
    pub async fn start(self: &Arc<Self>) -> Result<(), LifecycleError> {
        self.client.connect(&self.config.temporal_server).await?;
        self.spawn_generation(self.baseline.clone());
        Ok(())
    }

    /// Replace the live generation with one serving `registrations`. An
    /// empty set (edge case: a reload that discovered nothing
    /// loadable) falls back to the baseline set rather than leaving the
    /// worker with no registrations at all.
    pub fn reload(self: &Arc<Self>, registrations: RegistrationSet) {
        let registrations = if registrations.is_empty() {
            tracing::warn!("reload produced an empty registration set, falling back to baseline");
            self.baseline.clone()
        } else {
            registrations
        };
        self.spawn_generation(registrations);
    }

    /// Cancel the outgoing generation before the incoming one is spawned,
    /// so a new generation never begins polling the task queue before the
    /// old one's cancellation has been signalled. The new generation is still
    /// spawned immediately after, rather than waiting out the old
    /// generation's full drain, so the worker is never left with zero live
    /// generations while the old one finishes in-flight work in the
    /// background.
    fn spawn_generation(self: &Arc<Self>, registrations: RegistrationSet) {
        let mut state = self.state.lock();
        let epoch = state.epoch.next();
        state.epoch = epoch;

        let previous = state.current.take();
        if let Some(previous) = &previous {
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        self.current_registration.store(Arc::new(registrations.clone()));

        let client = self.client.clone();
        let queue = self.config.task_queue.clone();
        let cancel_for_run = cancel.clone();
        let this = self.clone_arc();
        let handle = tokio::spawn(async move {
            if let Err(e) = client.run(&queue, &registrations, cancel_for_run).await {
                tracing::error!(epoch = epoch.get(), error = %e, "worker generation exited with error");
            }
            this.on_generation_complete(epoch);
        });

        state.current = Some(Generation { epoch, cancel, handle });
        drop(state);

        if let Some(previous) = previous {
            drain_previous(previous);
        }
    }

    fn on_generation_complete(&self, epoch: Epoch) {
        let mut state = self.state.lock();
        // A generation only clears `current` if it is still the one
        // recorded there; a newer reload may have already replaced it.
        if matches!(&state.current, Some(g) if g.epoch == epoch) {
            state.current = None;
        }
    }

    /// Cancel the live generation and wait up to the hard shutdown cap for
    /// it to finish draining before returning.
    pub async fn stop(self: &Arc<Self>) {
        let current = self.state.lock().current.take();
        let Some(current) = current else {
            return;
        };
        current.cancel.cancel();
        match tokio::time::timeout(HARD_SHUTDOWN_CAP, current.handle).await {
            Ok(Ok(())) => tracing::info!("worker stopped cleanly"),
            Ok(Err(e)) => tracing::error!(error = %e, "worker task panicked during shutdown"),
            Err(_) => tracing::warn!("worker did not stop within the hard shutdown cap, giving up"),
        }
    }

    fn clone_arc(self: &Arc<Self>) -> Arc<Self> {
        Arc::clone(self)
    }
}

/// Wait out the soft drain cap for a generation already cancelled by
/// `spawn_generation`, in the background so reload never blocks on it.
fn drain_previous(previous: Generation) {
    let epoch = previous.epoch;
    tokio::spawn(async move {
        match tokio::time::timeout(SOFT_DRAIN_CAP, previous.handle).await {
            Ok(Ok(())) => tracing::info!(epoch = epoch.get(), "previous generation drained"),
            Ok(Err(e)) => tracing::error!(epoch = epoch.get(), error = %e, "previous generation task panicked"),
            Err(_) => tracing::warn!(epoch = epoch.get(), "previous generation did not drain within the soft cap, abandoning"),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_adapters::FakeOrchestrationClient;
    use hw_core::{ArtifactId, HotReloadMode, TaskHandle};
    use std::path::PathBuf;

    fn test_config() -> Config {
        Config {
            temporal_server: "localhost:7233".into(),
            task_queue: "default".into(),
            hot_reload_enabled: true,
            hot_reload_mode: HotReloadMode::FileSystem,
            watch_paths: vec![],
            file_filter: "*.wasm".into(),
            debounce: Duration::from_millis(1000),
            artifactory_feed_url: None,
            artifactory_username: None,
            artifactory_password: None,
            feed_poll_interval: Duration::from_secs(30),
            package_filters: vec![],
            download_path: PathBuf::from("/tmp/hw-artifactory"),
        }
    }

    fn owner() -> ArtifactId {
        ArtifactId {
            id: "demo".into(),
            version: "1.0.0".into(),
        }
    }

    #[tokio::test]
    async fn start_connects_and_spawns_baseline_generation() {
        let client = Arc::new(FakeOrchestrationClient::new());
        let manager = WorkerLifecycleManager::new(client.clone(), test_config(), RegistrationSet::new());
        manager.start().await.unwrap();
        assert_eq!(client.connects().len(), 1);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(client.runs().len(), 1);
        manager.stop().await;
    }

    #[tokio::test]
    async fn start_propagates_connect_failure() {
        let client = Arc::new(FakeOrchestrationClient::new());
        client.set_fail_connect(true);
        let manager = WorkerLifecycleManager::new(client, test_config(), RegistrationSet::new());
        assert!(manager.start().await.is_err());
    }

    #[tokio::test]
    async fn reload_with_empty_set_falls_back_to_baseline() {
        let client = Arc::new(FakeOrchestrationClient::new());
        let mut baseline = RegistrationSet::new();
        baseline.insert_task(TaskHandle::new("baselineTask", owner(), 1));
        let manager = WorkerLifecycleManager::new(client.clone(), test_config(), baseline);
        manager.start().await.unwrap();

        manager.reload(RegistrationSet::new());
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(manager.current_registration().task_count(), 1);
        manager.stop().await;
    }

    #[tokio::test]
    async fn reload_replaces_registration_and_drains_previous() {
        let client = Arc::new(FakeOrchestrationClient::new());
        let manager = WorkerLifecycleManager::new(client.clone(), test_config(), RegistrationSet::new());
        manager.start().await.unwrap();

        let mut next = RegistrationSet::new();
        next.insert_task(TaskHandle::new("newTask", owner(), 1));
        manager.reload(next);

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(manager.current_registration().task_count(), 1);
        assert_eq!(client.runs().len(), 2);
        manager.stop().await;
    }
}
