//! The facade's tunables: arena parallelism, temp directory root, air-gapped
//! flag, per-step grace period, scanner worker-pool size — deserialized with
//! `serde` plus `#[serde(deny_unknown_fields)]` the same way every other
//! wire/config type in this workspace is.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub arena: ArenaSection,
    #[serde(default)]
    pub controller: ControllerSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArenaSection {
    /// Directory the fetch arena creates and unlinks realized layer buffers in.
    pub root: PathBuf,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ControllerSection {
    #[serde(default = "default_scan_concurrency")]
    pub scan_concurrency: usize,
    #[serde(default = "default_step_grace_period_secs")]
    pub step_grace_period_secs: u64,
    /// When set, `Indexer::new` drops any scanner whose `is_network()`
    /// returns true before handing the catalogue to the controller.
    #[serde(default)]
    pub air_gapped: bool,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            scan_concurrency: default_scan_concurrency(),
            step_grace_period_secs: default_step_grace_period_secs(),
            air_gapped: false,
        }
    }
}

fn default_fetch_concurrency() -> usize {
    8
}

fn default_scan_concurrency() -> usize {
    8
}

fn default_step_grace_period_secs() -> u64 {
    30
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    pub fn step_grace_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.controller.step_grace_period_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_minimal_config_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.toml");
        std::fs::write(&path, "[arena]\nroot = \"/var/tmp/indexer-arena\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.arena.fetch_concurrency, 8);
        assert_eq!(config.controller.scan_concurrency, 8);
        assert_eq!(config.controller.step_grace_period_secs, 30);
        assert!(!config.controller.air_gapped);
    }

    #[test]
    fn rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.toml");
        std::fs::write(
            &path,
            "[arena]\nroot = \"/var/tmp/indexer-arena\"\nbogus = 1\n",
        )
        .unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::ParseToml(_))));
    }

    #[test]
    fn overrides_apply_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("indexer.toml");
        std::fs::write(
            &path,
            "[arena]\nroot = \"/var/tmp/indexer-arena\"\nfetch_concurrency = 2\n\n[controller]\nair_gapped = true\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.arena.fetch_concurrency, 2);
        assert!(config.controller.air_gapped);
    }
}
