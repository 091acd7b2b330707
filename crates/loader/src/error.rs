// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("failed to open artifact archive {path}: {source}")]
    OpenArchive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read archive {path}: {source}")]
    ReadArchive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
    #[error("failed to extract {path} to {dest}: {source}")]
    Extract {
        path: PathBuf,
        dest: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to compile module {path}: {source}")]
    CompileModule {
        path: PathBuf,
        #[source]
        source: wasmtime::Error,
    },
    #[error("failed to instantiate module {path}: {source}")]
    Instantiate {
        path: PathBuf,
        #[source]
        source: wasmtime::Error,
    },
}
