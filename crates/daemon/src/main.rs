// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! hwd: hot-reloading task-queue worker daemon.
//!
//! Watches for new plugin code (filesystem, remote feed, or both), loads
//! it into isolated containers, and hot-swaps the worker polling the
//! orchestration service without dropping in-flight work.

mod health;
mod rescan;

use std::sync::Arc;

use hw_adapters::{TcpOrchestrationClient, TracedOrchestrationClient};
use hw_core::{Config, RegistrationSet};
use hw_coordinator::HotReloadCoordinator;
use hw_loader::{ArtifactLoader, ArtifactRegistry};
use hw_watch::{CombinedWatcher, FilesystemWatcher, RemoteFeedPoller, WatcherHandle};
use hw_worker::WorkerLifecycleManager;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    info!(
        temporal_server = %config.temporal_server,
        task_queue = %config.task_queue,
        hot_reload_enabled = config.hot_reload_enabled,
        "starting hwd"
    );

    let client = Arc::new(TracedOrchestrationClient::new(TcpOrchestrationClient::new()));
    let manager = WorkerLifecycleManager::new(client, config.clone(), RegistrationSet::new());

    if let Err(e) = manager.start().await {
        error!(error = %e, "initial orchestration connection failed, exiting");
        std::process::exit(1);
    }

    let registry = Arc::new(ArtifactRegistry::new());
    let loader = Arc::new(ArtifactLoader::new(&config));
    let (coordinator, mut registrations_rx) = HotReloadCoordinator::new(loader, registry);

    if config.hot_reload_enabled {
        if let Some(handle) = start_watchers(&config) {
            spawn_trigger_forwarder(handle, coordinator.clone(), config.watch_paths.clone());
        }
    } else {
        info!("hot reload disabled, serving baseline registrations only");
    }

    tokio::spawn({
        let manager = manager.clone();
        async move {
            while registrations_rx.changed().await.is_ok() {
                let registrations = registrations_rx.borrow().clone();
                manager.reload(registrations);
            }
        }
    });

    let health_router = health::router(manager.clone());
    let health_listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(health_listener, health_router).await {
            error!(error = %e, "health endpoint server exited");
        }
    });

    wait_for_shutdown_signal().await?;
    info!("shutdown signal received, draining worker");
    manager.stop().await;
    Ok(())
}

fn start_watchers(config: &Config) -> Option<WatcherHandle> {
    let fs_handle = config.hot_reload_mode.watches_filesystem().then(|| {
        FilesystemWatcher::with_denylist(
            config.watch_paths.clone(),
            config.file_filter.clone(),
            config.debounce,
            config.platform_library_denylist().to_vec(),
        )
        .start()
    });
    let fs_handle = match fs_handle {
        Some(Ok(handle)) => Some(handle),
        Some(Err(e)) => {
            error!(error = %e, "failed to start filesystem watcher");
            None
        }
        None => None,
    };

    let feed_handle = config.hot_reload_mode.watches_feed().then(|| {
        config.artifactory_feed_url.clone().map(|url| {
            let client = hw_adapters::TracedFeedClient::new(hw_adapters::ReqwestFeedClient::new(
                url,
                config.artifactory_username.clone(),
                config.artifactory_password.clone(),
            ));
            RemoteFeedPoller::new(client, config).start()
        })
    });
    let feed_handle = feed_handle.flatten();

    match (fs_handle, feed_handle) {
        (Some(a), Some(b)) => Some(CombinedWatcher::start(a, b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

fn spawn_trigger_forwarder(
    mut handle: WatcherHandle,
    coordinator: Arc<HotReloadCoordinator<ArtifactLoader>>,
    watch_paths: Vec<std::path::PathBuf>,
) {
    tokio::spawn(async move {
        while let Some(trigger) = handle.triggers.recv().await {
            let artifacts = if trigger.is_rescan() {
                rescan::resolve(&watch_paths)
            } else {
                trigger.artifacts
            };
            coordinator.handle_trigger(artifacts);
            if coordinator.is_poisoned() {
                error!("coordinator poisoned, stopping watchers; worker keeps serving its last registration set");
                handle.stop();
                break;
            }
        }
    });
}

async fn wait_for_shutdown_signal() -> Result<(), std::io::Error> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
    Ok(())
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
