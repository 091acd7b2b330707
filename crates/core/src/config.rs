// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment-variable configuration.
//!
//! Constructed once at process startup (see `hw-daemon::main`) and passed
//! explicitly to every subsystem from there on: nothing below this module
//! reads `std::env` directly.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Which source watchers are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotReloadMode {
    FileSystem,
    ArtifactoryFeed,
    Both,
}

impl HotReloadMode {
    fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw {
            "FileSystem" => Ok(Self::FileSystem),
            "ArtifactoryFeed" => Ok(Self::ArtifactoryFeed),
            "Both" => Ok(Self::Both),
            other => Err(ConfigError::InvalidValue {
                key: "HOT_RELOAD_MODE",
                value: other.to_string(),
                reason: "expected FileSystem, ArtifactoryFeed, or Both".to_string(),
            }),
        }
    }

    pub fn watches_filesystem(self) -> bool {
        matches!(self, Self::FileSystem | Self::Both)
    }

    pub fn watches_feed(self) -> bool {
        matches!(self, Self::ArtifactoryFeed | Self::Both)
    }
}

/// Everything every subsystem needs, resolved once from the environment
/// table.
#[derive(Debug, Clone)]
pub struct Config {
    pub temporal_server: String,
    pub task_queue: String,
    pub hot_reload_enabled: bool,
    pub hot_reload_mode: HotReloadMode,
    pub watch_paths: Vec<PathBuf>,
    pub file_filter: String,
    pub debounce: Duration,
    pub artifactory_feed_url: Option<String>,
    pub artifactory_username: Option<String>,
    pub artifactory_password: Option<String>,
    pub feed_poll_interval: Duration,
    pub package_filters: Vec<String>,
    pub download_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Testable entry point: takes a lookup function instead of reading
    /// `std::env` directly so unit tests can exercise parsing without
    /// mutating process-global environment state.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let temporal_server = lookup("TEMPORAL_SERVER").unwrap_or_else(|| "localhost:7233".into());
        let task_queue = lookup("TASK_QUEUE").unwrap_or_else(|| "default".into());

        let hot_reload_enabled = match lookup("HOT_RELOAD_ENABLED") {
            Some(raw) => parse_bool("HOT_RELOAD_ENABLED", &raw)?,
            None => true,
        };

        let hot_reload_mode = match lookup("HOT_RELOAD_MODE") {
            Some(raw) => HotReloadMode::parse(&raw)?,
            None => HotReloadMode::FileSystem,
        };

        let watch_paths = lookup("HOT_RELOAD_WATCH_PATHS")
            .map(|raw| raw.split(',').map(PathBuf::from).collect())
            .unwrap_or_default();

        let file_filter = lookup("HOT_RELOAD_FILE_FILTER").unwrap_or_else(|| "*.wasm".into());

        let debounce = match lookup("HOT_RELOAD_DEBOUNCE_MS") {
            Some(raw) => Duration::from_millis(parse_u64("HOT_RELOAD_DEBOUNCE_MS", &raw)?),
            None => Duration::from_millis(1000),
        };

        let artifactory_feed_url = lookup("ARTIFACTORY_FEED_URL");
        let artifactory_username = lookup("ARTIFACTORY_USERNAME");
        let artifactory_password = lookup("ARTIFACTORY_PASSWORD");

        let feed_poll_interval = match lookup("ARTIFACTORY_POLL_INTERVAL_SECONDS") {
            Some(raw) => {
                Duration::from_secs(parse_u64("ARTIFACTORY_POLL_INTERVAL_SECONDS", &raw)?)
            }
            None => Duration::from_secs(30),
        };

        let package_filters = lookup("ARTIFACTORY_PACKAGE_FILTERS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let download_path = lookup("ARTIFACTORY_DOWNLOAD_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("hw-artifactory"));

        Ok(Self {
            temporal_server,
            task_queue,
            hot_reload_enabled,
            hot_reload_mode,
            watch_paths,
            file_filter,
            debounce,
            artifactory_feed_url,
            artifactory_username,
            artifactory_password,
            feed_poll_interval,
            package_filters,
            download_path,
        })
    }

    /// Filenames that are never treated as plugin modules even if they
    /// match the file filter: runtime-platform libraries, temp files, and
    /// this workspace's own components. Not operator-tunable (the env
    /// table enumerates only the tunable knobs), hence no env override.
    pub fn platform_library_denylist(&self) -> &'static [&'static str] {
        &[
            "wasi_snapshot_preview1",
            "libwasmtime",
            "hw-runtime",
            ".tmp",
            "~",
        ]
    }

    /// Cap on a task's declared parameter count ("K≥4").
    pub fn max_task_params(&self) -> usize {
        8
    }

    /// Additional module sources unioned with the artifact explicitly
    /// passed to `ArtifactLoader::load`: the user-scope package cache, the
    /// system-scope package cache, and the daemon's own install directory.
    /// Not operator-tunable, hence no env override.
    pub fn cache_roots(&self) -> Vec<PathBuf> {
        let mut roots = Vec::new();
        if let Some(xdg_data_home) = std::env::var_os("XDG_DATA_HOME") {
            roots.push(PathBuf::from(xdg_data_home).join("hw/plugins"));
        } else if let Some(home) = std::env::var_os("HOME") {
            roots.push(PathBuf::from(home).join(".local/share/hw/plugins"));
        }
        roots.push(PathBuf::from("/usr/share/hw/plugins"));
        if let Ok(exe) = std::env::current_exe() {
            if let Some(install_dir) = exe.parent() {
                roots.push(install_dir.to_path_buf());
            }
        }
        roots
    }

    /// Feed circuit-breaker threshold (default F=5).
    pub fn feed_failure_threshold(&self) -> u32 {
        5
    }

    /// Feed circuit-breaker suspend duration (default T=5min).
    pub fn feed_circuit_open_duration(&self) -> Duration {
        Duration::from_secs(5 * 60)
    }

    /// Staged package retention window before cleanup (default 24h).
    pub fn feed_staging_retention(&self) -> Duration {
        Duration::from_secs(24 * 60 * 60)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key,
            value: other.to_string(),
            reason: "expected true/false".to_string(),
        }),
    }
}

fn parse_u64(key: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.parse::<u64>().map_err(|e| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(map: &HashMap<&str, &str>) -> impl Fn(&str) -> Option<String> + '_ {
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn defaults_match_spec_table() {
        let cfg = Config::from_lookup(|_| None).unwrap();
        assert_eq!(cfg.temporal_server, "localhost:7233");
        assert_eq!(cfg.task_queue, "default");
        assert!(cfg.hot_reload_enabled);
        assert_eq!(cfg.hot_reload_mode, HotReloadMode::FileSystem);
        assert_eq!(cfg.debounce, Duration::from_millis(1000));
        assert_eq!(cfg.feed_poll_interval, Duration::from_secs(30));
    }

    #[test]
    fn parses_overrides() {
        let map: HashMap<&str, &str> = [
            ("HOT_RELOAD_MODE", "Both"),
            ("HOT_RELOAD_DEBOUNCE_MS", "2500"),
            ("ARTIFACTORY_PACKAGE_FILTERS", "foo, bar ,,baz"),
            ("HOT_RELOAD_ENABLED", "false"),
        ]
        .into_iter()
        .collect();

        let cfg = Config::from_lookup(lookup_from(&map)).unwrap();
        assert_eq!(cfg.hot_reload_mode, HotReloadMode::Both);
        assert_eq!(cfg.debounce, Duration::from_millis(2500));
        assert_eq!(cfg.package_filters, vec!["foo", "bar", "baz"]);
        assert!(!cfg.hot_reload_enabled);
    }

    #[test]
    fn rejects_invalid_mode() {
        let map: HashMap<&str, &str> = [("HOT_RELOAD_MODE", "Bogus")].into_iter().collect();
        assert!(Config::from_lookup(lookup_from(&map)).is_err());
    }

    #[test]
    fn rejects_non_numeric_debounce() {
        let map: HashMap<&str, &str> = [("HOT_RELOAD_DEBOUNCE_MS", "soon")].into_iter().collect();
        assert!(Config::from_lookup(lookup_from(&map)).is_err());
    }
}
