// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The isolated, unloadable code container.
//!
//! Each loaded module gets its own Wasmtime `Engine`/`Store`/`Instance`:
//! sandboxed, `unsafe`-free, and requiring no explicit unload step, since
//! dropping the container's `Store` tears the instance down deterministically.
//! A `CodeContainer` aggregates every module an artifact contributed
//! (an artifact may declare more than one `library/<tag>/*.wasm`).

use parking_lot::Mutex;
use wasmtime::{Engine, Instance, Store};

use crate::entrypoint::HostState;

/// Lifecycle state of a loaded container, tracked by the holder
/// ([`hw_coordinator`](../hw_coordinator)) rather than by the container
/// itself: `Live` while serving traffic, `Unloading` once superseded by a
/// newer reload but still referenced by in-flight work, `Collectible` once
/// the last reference is released and the container can simply be dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Live,
    Unloading,
    Collectible,
}

struct LoadedModule {
    _store: Store<HostState>,
    _instance: Instance,
}

pub struct CodeContainer {
    _engine: Engine,
    modules: Vec<LoadedModule>,
    state: Mutex<ContainerState>,
}

impl CodeContainer {
    pub(crate) fn new(engine: Engine, modules: Vec<(Store<HostState>, Instance)>) -> Self {
        Self {
            _engine: engine,
            modules: modules
                .into_iter()
                .map(|(store, instance)| LoadedModule {
                    _store: store,
                    _instance: instance,
                })
                .collect(),
            state: Mutex::new(ContainerState::Live),
        }
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn state(&self) -> ContainerState {
        *self.state.lock()
    }

    /// Mark this container as superseded. The coordinator calls this once
    /// a newer reload has taken over; the container stays resident until
    /// its last `Arc` reference is dropped.
    pub fn mark_unloading(&self) {
        let mut state = self.state.lock();
        if *state == ContainerState::Live {
            *state = ContainerState::Unloading;
        }
    }

    pub fn mark_collectible(&self) {
        *self.state.lock() = ContainerState::Collectible;
    }

    /// An empty container holding no modules, for tests in downstream
    /// crates that exercise reload bookkeeping without compiling Wasm.
    #[cfg(any(test, feature = "test-support"))]
    pub fn empty_for_test() -> Self {
        Self::new(Engine::default(), Vec::new())
    }
}
