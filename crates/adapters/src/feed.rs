// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter to the remote package feed polled by `hw-watch`'s
//! `RemoteFeedPoller`.
//!
//! Implements a three-endpoint protocol: a query
//! endpoint returning the latest versions matching the configured package
//! filters, a registration-index endpoint returning a package's known
//! versions, and a flat-container endpoint serving the archive bytes
//! themselves.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("package {id} not found on feed")]
    NotFound { id: String },
    #[error("feed request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("feed response from {url} was not valid: {reason}")]
    InvalidResponse { url: String, reason: String },
}

/// One `(id, version)` pair returned by a feed query, identical in shape to
/// [`hw_core::ArtifactId`] but kept distinct: the feed speaks in terms of
/// package summaries before anything has been downloaded or identified as
/// an `Artifact`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PackageSummary {
    pub id: String,
    pub version: String,
}

/// Adapter to the remote package feed.
///
/// Implementations must distinguish "package not found" ([`FeedError::NotFound`])
/// from every other failure: the circuit breaker in `hw-watch::feed` does
/// not count 404s as poll failures.
#[async_trait]
pub trait FeedClient: Send + Sync + 'static {
    /// Query the feed for the latest version of every package matching
    /// `filters` (`ARTIFACTORY_PACKAGE_FILTERS`). An empty `filters`
    /// list means "all packages".
    async fn query_latest(&self, filters: &[String]) -> Result<Vec<PackageSummary>, FeedError>;

    /// List every known version of `package_id` (the registration-index endpoint).
    async fn list_versions(&self, package_id: &str) -> Result<Vec<String>, FeedError>;

    /// Download the archive bytes for `package_id`@`version` (the
    /// flat-container endpoint).
    async fn download(&self, package_id: &str, version: &str) -> Result<Vec<u8>, FeedError>;
}

/// Real `FeedClient` backed by `reqwest`, speaking the NuGet-flatcontainer-like
/// subset of endpoints this process needs.
pub struct ReqwestFeedClient {
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    http: reqwest::Client,
}

impl ReqwestFeedClient {
    pub fn new(base_url: impl Into<String>, username: Option<String>, password: Option<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username,
            password,
            http: reqwest::Client::new(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.username, &self.password) {
            (Some(u), pw) => builder.basic_auth(u, pw.clone()),
            (None, _) => builder,
        }
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Vec<PackageSummary>,
}

#[derive(Debug, Deserialize)]
struct RegistrationIndexResponse {
    versions: Vec<String>,
}

#[async_trait]
impl FeedClient for ReqwestFeedClient {
    async fn query_latest(&self, filters: &[String]) -> Result<Vec<PackageSummary>, FeedError> {
        let url = format!("{}/query", self.base_url);
        let mut request = self.authed(self.http.get(&url));
        if !filters.is_empty() {
            request = request.query(&[("q", filters.join(" "))]);
        }
        let response = request
            .send()
            .await
            .map_err(|source| FeedError::Request { url: url.clone(), source })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound { id: "*".to_string() });
        }
        let parsed: QueryResponse = response
            .error_for_status()
            .map_err(|source| FeedError::Request { url: url.clone(), source })?
            .json()
            .await
            .map_err(|source| FeedError::Request { url, source })?;
        Ok(parsed.data)
    }

    async fn list_versions(&self, package_id: &str) -> Result<Vec<String>, FeedError> {
        let url = format!("{}/registration/{}/index.json", self.base_url, package_id);
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|source| FeedError::Request { url: url.clone(), source })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound { id: package_id.to_string() });
        }
        let parsed: RegistrationIndexResponse = response
            .error_for_status()
            .map_err(|source| FeedError::Request { url: url.clone(), source })?
            .json()
            .await
            .map_err(|source| FeedError::Request { url, source })?;
        Ok(parsed.versions)
    }

    async fn download(&self, package_id: &str, version: &str) -> Result<Vec<u8>, FeedError> {
        let url = format!(
            "{}/flatcontainer/{}/{}/{}.{}.zip",
            self.base_url, package_id, version, package_id, version
        );
        let response = self
            .authed(self.http.get(&url))
            .send()
            .await
            .map_err(|source| FeedError::Request { url: url.clone(), source })?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FeedError::NotFound { id: package_id.to_string() });
        }
        let bytes = response
            .error_for_status()
            .map_err(|source| FeedError::Request { url: url.clone(), source })?
            .bytes()
            .await
            .map_err(|source| FeedError::Request { url, source })?;
        Ok(bytes.to_vec())
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FakeState {
        packages: HashMap<String, Vec<String>>,
        blobs: HashMap<(String, String), Vec<u8>>,
        query_calls: u32,
    }

    /// Test double holding an in-memory package catalog.
    #[derive(Clone)]
    pub struct FakeFeedClient {
        inner: Arc<Mutex<FakeState>>,
    }

    impl Default for FakeFeedClient {
        fn default() -> Self {
            Self {
                inner: Arc::new(Mutex::new(FakeState {
                    packages: HashMap::new(),
                    blobs: HashMap::new(),
                    query_calls: 0,
                })),
            }
        }
    }

    impl FakeFeedClient {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_package(self, id: impl Into<String>, versions: Vec<String>) -> Self {
            self.inner.lock().packages.insert(id.into(), versions);
            self
        }

        pub fn with_blob(self, id: impl Into<String>, version: impl Into<String>, bytes: Vec<u8>) -> Self {
            self.inner.lock().blobs.insert((id.into(), version.into()), bytes);
            self
        }

        pub fn query_call_count(&self) -> u32 {
            self.inner.lock().query_calls
        }
    }

    #[async_trait]
    impl FeedClient for FakeFeedClient {
        async fn query_latest(&self, filters: &[String]) -> Result<Vec<PackageSummary>, FeedError> {
            let mut state = self.inner.lock();
            state.query_calls += 1;
            let summaries = state
                .packages
                .iter()
                .filter(|(id, _)| filters.is_empty() || filters.iter().any(|f| f == *id))
                .filter_map(|(id, versions)| {
                    versions.last().map(|v| PackageSummary {
                        id: id.clone(),
                        version: v.clone(),
                    })
                })
                .collect();
            Ok(summaries)
        }

        async fn list_versions(&self, package_id: &str) -> Result<Vec<String>, FeedError> {
            self.inner
                .lock()
                .packages
                .get(package_id)
                .cloned()
                .ok_or_else(|| FeedError::NotFound { id: package_id.to_string() })
        }

        async fn download(&self, package_id: &str, version: &str) -> Result<Vec<u8>, FeedError> {
            self.inner
                .lock()
                .blobs
                .get(&(package_id.to_string(), version.to_string()))
                .cloned()
                .ok_or_else(|| FeedError::NotFound { id: package_id.to_string() })
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeFeedClient;

#[cfg(test)]
mod tests {
    use super::*;
    use yare::parameterized;

    #[tokio::test]
    async fn fake_query_respects_filters() {
        let client = FakeFeedClient::new()
            .with_package("demo-tasks", vec!["1.0.0".into(), "1.1.0".into()])
            .with_package("other-tasks", vec!["2.0.0".into()]);

        let filtered = client
            .query_latest(&["demo-tasks".to_string()])
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].version, "1.1.0");
        assert_eq!(client.query_call_count(), 1);
    }

    #[parameterized(
        empty_filter = { vec![], 2 },
        matching_filter = { vec!["demo-tasks".to_string()], 1 },
    )]
    fn query_call_counts(filters: Vec<String>, expected: usize) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let client = FakeFeedClient::new()
                .with_package("demo-tasks", vec!["1.0.0".into()])
                .with_package("other-tasks", vec!["2.0.0".into()]);
            let result = client.query_latest(&filters).await.unwrap();
            assert_eq!(result.len(), expected);
        });
    }

    #[tokio::test]
    async fn missing_package_is_not_found() {
        let client = FakeFeedClient::new();
        let err = client.list_versions("nope").await.unwrap_err();
        assert!(matches!(err, FeedError::NotFound { .. }));
    }
}
