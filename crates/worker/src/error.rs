// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("initial orchestration connection failed: {0}")]
    InitialConnect(#[from] hw_adapters::OrchestrationError),
}
