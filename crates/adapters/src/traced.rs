// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability.

use async_trait::async_trait;
use hw_core::RegistrationSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::feed::{FeedClient, FeedError, PackageSummary};
use crate::orchestration::{OrchestrationClient, OrchestrationError};

/// Wrapper that adds tracing to any `OrchestrationClient`.
#[derive(Clone)]
pub struct TracedOrchestrationClient<C> {
    inner: C,
}

impl<C> TracedOrchestrationClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: OrchestrationClient> OrchestrationClient for TracedOrchestrationClient<C> {
    async fn connect(&self, server: &str) -> Result<(), OrchestrationError> {
        async {
            tracing::info!(server, "connecting");
            let start = std::time::Instant::now();
            let result = self.inner.connect(server).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => tracing::info!(elapsed_ms, "connected"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "connect failed"),
            }
            result
        }
        .instrument(tracing::info_span!("orchestration.connect", server))
        .await
    }

    async fn run(
        &self,
        queue: &str,
        registrations: &RegistrationSet,
        cancel: CancellationToken,
    ) -> Result<(), OrchestrationError> {
        let span = tracing::info_span!("orchestration.run", queue, tasks = registrations.task_count());
        async {
            let result = self.inner.run(queue, registrations, cancel).await;
            if let Err(ref e) = result {
                tracing::error!(error = %e, "run failed");
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Wrapper that adds tracing to any `FeedClient`.
#[derive(Clone)]
pub struct TracedFeedClient<C> {
    inner: C,
}

impl<C> TracedFeedClient<C> {
    pub fn new(inner: C) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<C: FeedClient> FeedClient for TracedFeedClient<C> {
    async fn query_latest(&self, filters: &[String]) -> Result<Vec<PackageSummary>, FeedError> {
        let result = self.inner.query_latest(filters).await;
        match &result {
            Ok(packages) => tracing::debug!(count = packages.len(), "feed query returned"),
            Err(e) => tracing::error!(error = %e, "feed query failed"),
        }
        result
    }

    async fn list_versions(&self, package_id: &str) -> Result<Vec<String>, FeedError> {
        let result = self.inner.list_versions(package_id).await;
        if let Err(ref e) = result {
            tracing::warn!(package_id, error = %e, "list_versions failed");
        }
        result
    }

    async fn download(&self, package_id: &str, version: &str) -> Result<Vec<u8>, FeedError> {
        tracing::info_span!("feed.download", package_id, version).in_scope(|| {
            tracing::info!("downloading artifact");
        });
        let start = std::time::Instant::now();
        let result = self.inner.download(package_id, version).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(bytes) => tracing::info!(bytes = bytes.len(), elapsed_ms, "artifact downloaded"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "download failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FakeFeedClient;
    use crate::orchestration::FakeOrchestrationClient;

    #[tokio::test]
    async fn traced_feed_client_delegates() {
        let fake = FakeFeedClient::new().with_package("demo-tasks", vec!["1.0.0".into()]);
        let traced = TracedFeedClient::new(fake);
        let versions = traced.list_versions("demo-tasks").await.unwrap();
        assert_eq!(versions, vec!["1.0.0".to_string()]);
    }

    #[tokio::test]
    async fn traced_orchestration_client_delegates() {
        let fake = FakeOrchestrationClient::new();
        let traced = TracedOrchestrationClient::new(fake);
        traced.connect("example:7233").await.unwrap();
    }
}
