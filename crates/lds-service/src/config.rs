//! Configuration for the discovery service.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Result, ServiceError};

/// Top-level discovery configuration.
///
/// Loaded from the `[discovery]` section of `lds.toml` or from
/// `LDS_DISCOVERY__` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    /// Authority (root node) used when no snapshot can be restored.
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Directory holding the snapshot file.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Snapshot file name, without the `.json` extension.
    #[serde(default = "default_snapshot_name")]
    pub snapshot_name: String,

    /// Optional JSON node tree used to seed an empty registry.
    #[serde(default)]
    pub seed_file: Option<String>,

    /// Upper bound for registering or unregistering all methods.
    #[serde(default = "default_registration_timeout_ms")]
    pub registration_timeout_ms: u64,
}

fn default_authority() -> String {
    "localhost".to_string()
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_snapshot_name() -> String {
    "registry".to_string()
}

fn default_registration_timeout_ms() -> u64 {
    5000
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            data_dir: default_data_dir(),
            snapshot_name: default_snapshot_name(),
            seed_file: None,
            registration_timeout_ms: default_registration_timeout_ms(),
        }
    }
}

impl DiscoveryConfig {
    /// Load `{file_prefix}.toml` (optional) overlaid with environment
    /// variables. A missing `[discovery]` section yields the defaults.
    pub fn load(file_prefix: &str) -> Result<Self> {
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(file_prefix).required(false))
            .add_source(
                config::Environment::with_prefix("LDS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ServiceError::Config(e.to_string()))?;

        match cfg.get::<DiscoveryConfig>("discovery") {
            Ok(c) => Ok(c),
            Err(config::ConfigError::NotFound(_)) => Ok(DiscoveryConfig::default()),
            Err(e) => Err(ServiceError::Config(e.to_string())),
        }
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.authority, "localhost");
        assert_eq!(config.snapshot_name, "registry");
        assert_eq!(config.registration_timeout_ms, 5000);
        assert!(config.seed_file.is_none());
    }

    #[test]
    fn test_load_from_file_with_partial_section() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("lds.toml"),
            "[discovery]\nauthority = \"vcu.vin\"\nregistration_timeout_ms = 250\n",
        )
        .unwrap();

        let prefix = dir.path().join("lds");
        let config = DiscoveryConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.authority, "vcu.vin");
        assert_eq!(config.registration_timeout_ms, 250);
        assert_eq!(config.data_dir, "./data");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("absent");
        let config = DiscoveryConfig::load(prefix.to_str().unwrap()).unwrap();
        assert_eq!(config.snapshot_name, "registry");
    }

    #[test]
    fn test_invalid_section_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("bad.toml"),
            "[discovery]\nregistration_timeout_ms = \"soon\"\n",
        )
        .unwrap();

        let prefix = dir.path().join("bad");
        let err = DiscoveryConfig::load(prefix.to_str().unwrap()).unwrap_err();
        assert!(matches!(err, ServiceError::Config(_)));
    }
}
