// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ZIP archive extraction for downloaded or locally-discovered artifacts.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use hw_core::Artifact;

use crate::error::LoaderError;

static EXTRACT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Extract `artifact.local_path` (a ZIP archive) into a fresh, uniquely
/// named directory under the process temp dir. If `local_path` is already
/// a directory (the filesystem watcher may hand us one directly), it is
/// used as-is.
pub fn extract(artifact: &Artifact) -> Result<PathBuf, LoaderError> {
    if artifact.local_path.is_dir() {
        return Ok(artifact.local_path.clone());
    }

    let seq = EXTRACT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let dest = std::env::temp_dir().join(format!(
        "hw-artifact-{}-{}-{}",
        artifact.id, artifact.version, seq
    ));

    let file = File::open(&artifact.local_path).map_err(|source| LoaderError::OpenArchive {
        path: artifact.local_path.clone(),
        source,
    })?;
    let mut archive = zip::ZipArchive::new(file).map_err(|source| LoaderError::ReadArchive {
        path: artifact.local_path.clone(),
        source,
    })?;

    std::fs::create_dir_all(&dest).map_err(|source| LoaderError::Extract {
        path: artifact.local_path.clone(),
        dest: dest.clone(),
        source,
    })?;

    archive
        .extract(&dest)
        .map_err(|source| match source {
            zip::result::ZipError::Io(io) => LoaderError::Extract {
                path: artifact.local_path.clone(),
                dest: dest.clone(),
                source: io,
            },
            other => LoaderError::ReadArchive {
                path: artifact.local_path.clone(),
                source: other,
            },
        })?;

    Ok(dest)
}

/// Find every `*.wasm` file under `extract_dir/library/<framework-tag>/`,
/// excluding any filename matching `denylist`: platform/runtime
/// libraries are never treated as plugin modules.
pub fn locate_modules(extract_dir: &Path, denylist: &[&str]) -> Vec<PathBuf> {
    let library_root = extract_dir.join("library");
    let mut modules = Vec::new();
    let Ok(framework_dirs) = std::fs::read_dir(&library_root) else {
        return modules;
    };
    for framework_dir in framework_dirs.filter_map(|e| e.ok()) {
        let Ok(entries) = std::fs::read_dir(framework_dir.path()) else {
            continue;
        };
        for entry in entries.filter_map(|e| e.ok()) {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("wasm") {
                continue;
            }
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if denylist.iter().any(|d| name.contains(d)) {
                tracing::debug!(module = name, "skipping denylisted platform library");
                continue;
            }
            modules.push(path);
        }
    }
    modules
}

/// Recursively find every `*.wasm` file under `root`, excluding any
/// filename matching `denylist`. Used to scan the configured cache roots,
/// which have no fixed `library/<tag>/` layout the way an extracted
/// artifact does.
pub fn locate_modules_recursive(root: &Path, denylist: &[&str]) -> Vec<PathBuf> {
    let mut modules = Vec::new();
    walk_wasm_modules(root, denylist, &mut modules);
    modules
}

fn walk_wasm_modules(dir: &Path, denylist: &[&str], out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_dir() {
            walk_wasm_modules(&path, denylist, out);
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some("wasm") {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if denylist.iter().any(|d| name.contains(d)) {
            tracing::debug!(module = name, "skipping denylisted platform library");
            continue;
        }
        out.push(path);
    }
}
