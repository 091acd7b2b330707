// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Hot-Reload Coordinator: the idle/reloading state machine
//! that sits between the source watchers and the artifact loader.
//!
//! A burst of [`hw_core::ReloadTrigger`]s collapses into a single pass
//! through the loader via a quiesce delay; triggers that arrive while a
//! load is already in flight are buffered and re-enter the coordinator the
//! moment the in-flight load finishes, rather than being dropped. Per the
//! Design Notes' "collapse the two reload events" redesign, every
//! completed pass publishes exactly one
//! [`RegistrationSet`](hw_core::RegistrationSet) on a
//! `tokio::sync::watch` channel, whether the trigger came from the
//! filesystem watcher or the feed poller.

mod loader_trait;
mod state;

pub use loader_trait::Loads;
pub use state::HotReloadCoordinator;
