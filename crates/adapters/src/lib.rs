// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Adapters for the two external-I/O seams this repo depends on: the
//! orchestration service the worker lifecycle manager connects to, and the
//! remote package feed the [`hw-watch`](../hw_watch) poller downloads from.

pub mod feed;
pub mod orchestration;
pub mod traced;

pub use feed::{FeedClient, FeedError, PackageSummary, ReqwestFeedClient};
pub use orchestration::{OrchestrationClient, OrchestrationError, TcpOrchestrationClient};
pub use traced::{TracedFeedClient, TracedOrchestrationClient};

#[cfg(any(test, feature = "test-support"))]
pub use feed::FakeFeedClient;
#[cfg(any(test, feature = "test-support"))]
pub use orchestration::FakeOrchestrationClient;
