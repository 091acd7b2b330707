// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resolves a bare filesystem "something changed, rescan" trigger (the
//! filesystem watcher reports no artifact list of its own)
//! into the concrete [`Artifact`] list the coordinator needs: one entry
//! per immediate child directory of each configured watch path.

use std::path::Path;

use hw_core::Artifact;

pub fn resolve(watch_paths: &[std::path::PathBuf]) -> Vec<Artifact> {
    let mut artifacts = Vec::new();
    for watch_path in watch_paths {
        artifacts.extend(artifacts_under(watch_path));
    }
    artifacts
}

fn artifacts_under(watch_path: &Path) -> Vec<Artifact> {
    let Ok(entries) = std::fs::read_dir(watch_path) else {
        tracing::warn!(path = %watch_path.display(), "watch path not readable during rescan");
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().into_owned();
            Some(Artifact::new(name, "local", e.path()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn resolves_one_artifact_per_subdirectory() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("demo-tasks")).unwrap();
        fs::create_dir(dir.path().join("other-tasks")).unwrap();
        fs::write(dir.path().join("manifest.json"), b"{}").unwrap();

        let artifacts = resolve(&[dir.path().to_path_buf()]);
        assert_eq!(artifacts.len(), 2);
    }

    #[test]
    fn missing_path_resolves_to_empty() {
        assert!(resolve(&[std::path::PathBuf::from("/nonexistent")]).is_empty());
    }
}
