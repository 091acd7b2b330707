// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote package-feed poller.
//!
//! Polls one package at a time (never overlapping polls against the same
//! feed) on `feed_poll_interval`, diffs the feed's reported latest versions
//! against what was last seen, downloads newly observed packages into a
//! staging directory, and emits a [`hw_core::ReloadTrigger`] carrying the
//! downloaded [`hw_core::Artifact`]s.
//!
//! A circuit breaker suspends polling after `feed_failure_threshold`
//! consecutive failures for `feed_circuit_open_duration`; a 404 from the
//! feed (package not found) does not count as a failure. A cleanup pass
//! sweeps the staging directory for files older than
//! `feed_staging_retention` once every 60 poll cycles, rather than running
//! its own timer.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use hw_adapters::{FeedClient, FeedError};
use hw_core::{Artifact, Config, ReloadTrigger};
use sha2::{Digest, Sha256};
use tokio::sync::{mpsc, oneshot};

use crate::WatcherHandle;

const STAGING_CLEANUP_EVERY_N_POLLS: u64 = 60;

struct CircuitBreaker {
    consecutive_failures: u32,
    opened_at: Option<tokio::time::Instant>,
    threshold: u32,
    open_duration: Duration,
}

impl CircuitBreaker {
    fn new(threshold: u32, open_duration: Duration) -> Self {
        Self {
            consecutive_failures: 0,
            opened_at: None,
            threshold,
            open_duration,
        }
    }

    /// On expiry the breaker fully resets rather than just unlocking: the
    /// next failure alone must not re-open it, only a fresh run of
    /// `threshold` consecutive failures should.
    fn is_open(&mut self) -> bool {
        match self.opened_at {
            Some(opened_at) if opened_at.elapsed() < self.open_duration => true,
            Some(_) => {
                self.consecutive_failures = 0;
                self.opened_at = None;
                false
            }
            None => false,
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.opened_at = None;
    }

    /// Record a real failure. Callers must not invoke this for
    /// [`FeedError::NotFound`], which a missing package should not count
    /// as a feed-connectivity failure.
    fn record_failure(&mut self) {
        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.threshold {
            self.opened_at = Some(tokio::time::Instant::now());
        }
    }
}

pub struct RemoteFeedPoller<C> {
    client: C,
    package_filters: Vec<String>,
    poll_interval: Duration,
    download_path: PathBuf,
    failure_threshold: u32,
    circuit_open_duration: Duration,
    staging_retention: Duration,
}

impl<C: FeedClient> RemoteFeedPoller<C> {
    pub fn new(client: C, config: &Config) -> Self {
        Self {
            client,
            package_filters: config.package_filters.clone(),
            poll_interval: config.feed_poll_interval,
            download_path: config.download_path.clone(),
            failure_threshold: config.feed_failure_threshold(),
            circuit_open_duration: config.feed_circuit_open_duration(),
            staging_retention: config.feed_staging_retention(),
        }
    }

    pub fn start(self) -> WatcherHandle {
        let (trigger_tx, trigger_rx) = mpsc::channel::<ReloadTrigger>(16);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(poll_loop(self, trigger_tx, shutdown_rx));

        WatcherHandle::new(trigger_rx, shutdown_tx)
    }
}

async fn poll_loop<C: FeedClient>(
    poller: RemoteFeedPoller<C>,
    trigger_tx: mpsc::Sender<ReloadTrigger>,
    mut shutdown_rx: oneshot::Receiver<()>,
) {
    let RemoteFeedPoller {
        client,
        package_filters,
        poll_interval,
        download_path,
        failure_threshold,
        circuit_open_duration,
        staging_retention,
    } = poller;

    let mut breaker = CircuitBreaker::new(failure_threshold, circuit_open_duration);
    let mut last_seen: HashMap<String, String> = HashMap::new();
    let mut poll_count: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown_rx => {
                tracing::debug!("feed poller shutdown requested");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        if breaker.is_open() {
            tracing::debug!("feed circuit breaker open, skipping poll");
            continue;
        }

        poll_count += 1;

        match poll_once(&client, &package_filters, &download_path, &mut last_seen).await {
            Ok(artifacts) if !artifacts.is_empty() => {
                breaker.record_success();
                tracing::info!(count = artifacts.len(), "feed poll discovered new artifacts");
                if trigger_tx
                    .send(ReloadTrigger::with_artifacts(artifacts))
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Ok(_) => {
                breaker.record_success();
            }
            Err(FeedError::NotFound { .. }) => {
                tracing::debug!("feed reported not-found; not counted against circuit breaker");
            }
            Err(e) => {
                tracing::warn!(error = %e, "feed poll failed");
                breaker.record_failure();
            }
        }

        if poll_count % STAGING_CLEANUP_EVERY_N_POLLS == 0 {
            cleanup_staging(&download_path, staging_retention).await;
        }
    }
}

async fn poll_once<C: FeedClient>(
    client: &C,
    package_filters: &[String],
    download_path: &PathBuf,
    last_seen: &mut HashMap<String, String>,
) -> Result<Vec<Artifact>, FeedError> {
    let summaries = client.query_latest(package_filters).await?;
    let mut discovered = Vec::new();

    for summary in summaries {
        // The query endpoint's reported "latest" is a hint; the
        // registration-index endpoint is authoritative for which version is
        // actually newest, so resolve against it before trusting the query
        // result.
        let version = match client.list_versions(&summary.id).await {
            Ok(versions) => versions.into_iter().last().unwrap_or(summary.version),
            Err(FeedError::NotFound { .. }) => {
                tracing::debug!(package = %summary.id, "registration index has no entry, using query result as-is");
                summary.version
            }
            Err(e) => return Err(e),
        };

        if last_seen.get(&summary.id) == Some(&version) {
            continue;
        }
        let bytes = client.download(&summary.id, &version).await?;
        let hash = format!("{:x}", Sha256::digest(&bytes));

        let staged_path = download_path.join(format!("{}-{}.zip", summary.id, version));
        if let Some(parent) = staged_path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&staged_path, &bytes).await {
            tracing::warn!(path = %staged_path.display(), error = %e, "failed to stage downloaded artifact");
            continue;
        }

        last_seen.insert(summary.id.clone(), version.clone());
        discovered.push(Artifact::new(summary.id, version, staged_path).with_hash(hash));
    }

    Ok(discovered)
}

async fn cleanup_staging(download_path: &PathBuf, retention: Duration) {
    let Ok(mut entries) = tokio::fs::read_dir(download_path).await else {
        return;
    };
    let cutoff = SystemTime::now().checked_sub(retention);
    while let Ok(Some(entry)) = entries.next_entry().await {
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        if cutoff.is_some_and(|cutoff| modified < cutoff) {
            tracing::info!(path = %entry.path().display(), "cleaning up stale staged artifact");
            let _ = tokio::fs::remove_file(entry.path()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_adapters::FakeFeedClient;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn new_version_triggers_download_and_stage() {
        let dir = tempdir().unwrap();
        let client = FakeFeedClient::new()
            .with_package("demo-tasks", vec!["1.0.0".into()])
            .with_blob("demo-tasks", "1.0.0", b"zip-bytes".to_vec());

        let mut last_seen = HashMap::new();
        let artifacts = poll_once(&client, &[], &dir.path().to_path_buf(), &mut last_seen)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].id, "demo-tasks");
        assert!(artifacts[0].local_path.exists());

        // Second poll with the same last_seen state discovers nothing new.
        let artifacts_again = poll_once(&client, &[], &dir.path().to_path_buf(), &mut last_seen)
            .await
            .unwrap();
        assert!(artifacts_again.is_empty());
    }

    struct StaleQueryClient;

    #[async_trait::async_trait]
    impl FeedClient for StaleQueryClient {
        async fn query_latest(&self, _filters: &[String]) -> Result<Vec<hw_adapters::PackageSummary>, FeedError> {
            Ok(vec![hw_adapters::PackageSummary {
                id: "demo-tasks".into(),
                version: "1.0.0".into(),
            }])
        }

        async fn list_versions(&self, _package_id: &str) -> Result<Vec<String>, FeedError> {
            Ok(vec!["1.0.0".into(), "1.1.0".into()])
        }

        async fn download(&self, _package_id: &str, version: &str) -> Result<Vec<u8>, FeedError> {
            Ok(format!("bytes-{version}").into_bytes())
        }
    }

    #[tokio::test]
    async fn registration_index_overrides_stale_query_version() {
        let dir = tempdir().unwrap();
        let mut last_seen = HashMap::new();
        let artifacts = poll_once(&StaleQueryClient, &[], &dir.path().to_path_buf(), &mut last_seen)
            .await
            .unwrap();

        assert_eq!(artifacts.len(), 1);
        assert_eq!(artifacts[0].version, "1.1.0");
    }

    #[test]
    fn circuit_breaker_opens_after_threshold() {
        let mut breaker = CircuitBreaker::new(3, StdDuration::from_secs(60));
        assert!(!breaker.is_open());
        breaker.record_failure();
        breaker.record_failure();
        assert!(!breaker.is_open());
        breaker.record_failure();
        assert!(breaker.is_open());
    }

    #[test]
    fn circuit_breaker_resets_on_success() {
        let mut breaker = CircuitBreaker::new(2, StdDuration::from_secs(60));
        breaker.record_failure();
        breaker.record_success();
        breaker.record_failure();
        assert!(!breaker.is_open());
    }

    #[test]
    fn circuit_breaker_requires_fresh_failures_after_expiry() {
        let mut breaker = CircuitBreaker::new(2, StdDuration::from_millis(20));
        breaker.record_failure();
        breaker.record_failure();
        assert!(breaker.is_open());

        std::thread::sleep(StdDuration::from_millis(30));
        assert!(!breaker.is_open());

        breaker.record_failure();
        assert!(!breaker.is_open(), "a single failure after expiry must not re-open the breaker");
    }
}
