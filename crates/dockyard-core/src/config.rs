//! dockyard.toml daemon configuration.
//!
//! Every section is optional; missing keys fall back to defaults so an
//! empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub runtime: RuntimeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `dockyard.redb`.
    pub data_dir: PathBuf,
    /// Keep records in memory only (lost on restart).
    pub in_memory: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("/var/lib/dockyard"),
            in_memory: false,
        }
    }
}

/// Which container runtime backend the daemon drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeKind {
    #[default]
    Docker,
    /// In-process runtime; nothing is actually run.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub kind: RuntimeKind,
    /// Docker endpoint, e.g. `unix:///var/run/docker.sock`. `None` uses the
    /// client's local defaults (`DOCKER_HOST` or the platform socket).
    pub docker_host: Option<String>,
    /// Per-request timeout for runtime calls.
    pub timeout_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            kind: RuntimeKind::Docker,
            docker_host: None,
            timeout_secs: 120,
        }
    }
}

impl DaemonConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: DaemonConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Path of the record database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.store.data_dir.join("dockyard.redb")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: DaemonConfig = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.runtime.kind, RuntimeKind::Docker);
        assert!(!config.store.in_memory);
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/dockyard/dockyard.redb"));
    }

    #[test]
    fn parse_partial() {
        let toml_str = r#"
[server]
port = 9000

[runtime]
kind = "memory"
timeout_secs = 5
"#;
        let config: DaemonConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.runtime.kind, RuntimeKind::Memory);
        assert_eq!(config.runtime.timeout_secs, 5);
    }

    #[test]
    fn round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dockyard.toml");

        let mut config = DaemonConfig::default();
        config.store.data_dir = dir.path().to_path_buf();
        config.runtime.docker_host = Some("unix:///run/docker.sock".into());
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();

        let loaded = DaemonConfig::from_file(&path).unwrap();
        assert_eq!(loaded.store.data_dir, dir.path());
        assert_eq!(loaded.runtime.docker_host.as_deref(), Some("unix:///run/docker.sock"));
    }

    #[test]
    fn unknown_runtime_kind_rejected() {
        assert!(toml::from_str::<DaemonConfig>("[runtime]\nkind = \"podman\"\n").is_err());
    }
}
