// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ties archive extraction, module compilation, and registration scanning
//! together into the `ArtifactLoader` surface the coordinator drives.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use hw_core::{Artifact, Config, RegistrationSet, RegistryEntry};
use wasmtime::Engine;

use crate::container::CodeContainer;
use crate::error::LoaderError;
use crate::{entrypoint, extract};

pub struct ArtifactLoader {
    engine: Engine,
    denylist: Vec<&'static str>,
    max_params: usize,
    cache_roots: Vec<PathBuf>,
}

impl ArtifactLoader {
    pub fn new(config: &Config) -> Self {
        Self {
            engine: Engine::default(),
            denylist: config.platform_library_denylist().to_vec(),
            max_params: config.max_task_params(),
            cache_roots: config.cache_roots(),
        }
    }

    /// Extract `artifact`, compile and instantiate every module it
    /// declares under `library/<tag>/*.wasm` plus every eligible module
    /// found under the configured cache roots, deduplicated by
    /// canonicalized absolute path, and merge their registrations. A module
    /// missing `hw_plugin_register` contributes no registrations but is
    /// still kept resident — the absence is a warning, not a load failure.
    pub fn load(
        &self,
        artifact: &Artifact,
    ) -> Result<RegistryEntry<Arc<CodeContainer>>, LoaderError> {
        let extract_dir = extract::extract(artifact)?;
        let mut module_paths = extract::locate_modules(&extract_dir, &self.denylist);
        for cache_root in &self.cache_roots {
            module_paths.extend(extract::locate_modules_recursive(cache_root, &self.denylist));
        }
        dedup_by_canonical_path(&mut module_paths);

        if module_paths.is_empty() {
            tracing::warn!(artifact = %artifact.identity(), "artifact contains no eligible modules");
        }

        let mut registrations = RegistrationSet::new();
        let mut loaded = Vec::with_capacity(module_paths.len());

        for path in &module_paths {
            // A single module failing to compile or instantiate does not
            // abort the rest of the artifact: it is skipped with a warning
            // and the remaining modules still get a chance to load.
            match entrypoint::load_and_register(&self.engine, path, artifact.identity(), self.max_params) {
                Ok((store, instance, module_registrations)) => {
                    let collisions = registrations.merge(module_registrations);
                    for name in collisions {
                        tracing::warn!(
                            artifact = %artifact.identity(),
                            name,
                            "duplicate registration name within artifact, last loaded wins"
                        );
                    }
                    loaded.push((store, instance));
                }
                Err(e) => {
                    tracing::warn!(
                        artifact = %artifact.identity(),
                        module = %path.display(),
                        error = %e,
                        "failed to load module, skipping"
                    );
                }
            }
        }

        let container = Arc::new(CodeContainer::new(self.engine.clone(), loaded));

        Ok(RegistryEntry::new(
            container,
            registrations,
            std::time::SystemTime::now(),
        ))
    }
}

/// Drop later duplicates of a path already seen, canonicalizing so a
/// cache root that happens to overlap with the artifact's own extracted
/// directory (or a symlinked cache root) doesn't load the same module
/// twice. A path that fails to canonicalize (already gone, permission
/// denied) is kept as-is rather than silently dropped.
fn dedup_by_canonical_path(paths: &mut Vec<PathBuf>) {
    let mut seen = HashSet::new();
    paths.retain(|path| {
        let key = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
        seen.insert(key)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use hw_core::HotReloadMode;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            temporal_server: "localhost:7233".into(),
            task_queue: "default".into(),
            hot_reload_enabled: true,
            hot_reload_mode: HotReloadMode::FileSystem,
            watch_paths: vec![],
            file_filter: "*.wasm".into(),
            debounce: Duration::from_millis(1000),
            artifactory_feed_url: None,
            artifactory_username: None,
            artifactory_password: None,
            feed_poll_interval: Duration::from_secs(30),
            package_filters: vec![],
            download_path: PathBuf::from("/tmp/hw-artifactory"),
        }
    }

    #[test]
    fn artifact_with_no_library_dir_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = Artifact::new("demo", "1.0.0", dir.path().to_path_buf());
        let loader = ArtifactLoader::new(&test_config());
        let entry = loader.load(&artifact).unwrap();
        assert!(entry.registrations.is_empty());
        assert_eq!(entry.container.module_count(), 0);
    }

    #[test]
    fn one_bad_module_does_not_abort_the_rest_of_the_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let framework_dir = dir.path().join("library").join("wasm32");
        std::fs::create_dir_all(&framework_dir).unwrap();
        std::fs::write(framework_dir.join("corrupt.wasm"), b"not a real module").unwrap();
        std::fs::write(
            framework_dir.join("good.wasm"),
            [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00],
        )
        .unwrap();

        let artifact = Artifact::new("demo", "1.0.0", dir.path().to_path_buf());
        let loader = ArtifactLoader::new(&test_config());
        let entry = loader.load(&artifact).unwrap();

        assert_eq!(entry.container.module_count(), 1);
    }

    #[test]
    fn cache_root_modules_are_unioned_and_deduplicated() {
        let artifact_dir = tempfile::tempdir().unwrap();
        let cache_dir = tempfile::tempdir().unwrap();
        let cache_lib = cache_dir.path().join("extra");
        std::fs::create_dir_all(&cache_lib).unwrap();
        // Minimal valid empty Wasm module: magic number + version, no exports.
        std::fs::write(cache_lib.join("extra.wasm"), [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00]).unwrap();

        let artifact = Artifact::new("demo", "1.0.0", artifact_dir.path().to_path_buf());
        let loader = ArtifactLoader {
            engine: Engine::default(),
            denylist: Vec::new(),
            max_params: 8,
            // Listed twice: proves a cache root scanned into the same path
            // more than once is still loaded exactly once.
            cache_roots: vec![cache_dir.path().to_path_buf(), cache_dir.path().to_path_buf()],
        };

        let entry = loader.load(&artifact).unwrap();
        assert_eq!(entry.container.module_count(), 1);
        assert!(entry.registrations.is_empty());
    }
}
