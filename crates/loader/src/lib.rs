// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Artifact Loader & Code Container: extracts downloaded or
//! discovered artifacts, compiles and instantiates their modules in
//! isolated Wasmtime containers, and scans for registrations via the
//! explicit `hw_plugin_register` entry-point protocol.

mod container;
mod entrypoint;
mod error;
mod extract;
mod loader;
mod registry;

pub use container::{CodeContainer, ContainerState};
pub use error::LoaderError;
pub use loader::ArtifactLoader;
pub use registry::ArtifactRegistry;
