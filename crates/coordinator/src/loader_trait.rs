// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow seam over `hw_loader::ArtifactLoader` so the coordinator's state
//! machine can be exercised against a fake in tests without pulling in
//! Wasmtime.

use std::sync::Arc;

use hw_core::{Artifact, RegistryEntry};
use hw_loader::{ArtifactLoader, CodeContainer, LoaderError};

pub trait Loads: Send + Sync + 'static {
    fn load(&self, artifact: &Artifact) -> Result<RegistryEntry<Arc<CodeContainer>>, LoaderError>;
}

impl Loads for ArtifactLoader {
    fn load(&self, artifact: &Artifact) -> Result<RegistryEntry<Arc<CodeContainer>>, LoaderError> {
        ArtifactLoader::load(self, artifact)
    }
}
