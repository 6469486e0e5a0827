//! Daemon-level configuration (spec §6 "Configuration file").
//!
//! Paths to the component config files (pricing, policy) and the bind
//! address/storage locations the daemon itself owns. The component configs
//! those paths point at are hot-reloadable through their own `ConfigHandle`
//! (spec §5); this struct is read once at startup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    pub host: String,
    pub port: u16,
    pub pricing_config_path: PathBuf,
    pub policy_config_path: PathBuf,
    pub task_store_path: Option<PathBuf>,
    pub session_store_path: Option<PathBuf>,
    pub memory_store_path: Option<PathBuf>,
    pub expected_embedding_dim: usize,
    pub task_deadline_secs: u64,
    pub cors_allowed_origins: Vec<String>,
    /// Base URL of the remote agent-executor service (spec §1 "out of
    /// scope ... treated as a remote call"). `None` runs with the
    /// zero-config stub, which fails every dispatch with a retryable
    /// `dependency_unavailable` error.
    pub agent_executor_url: Option<String>,
    /// Base URL of the remote planner service, same treatment.
    pub planner_url: Option<String>,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8088,
            pricing_config_path: PathBuf::from("config/pricing.toml"),
            policy_config_path: PathBuf::from("config/policy.toml"),
            task_store_path: None,
            session_store_path: None,
            memory_store_path: None,
            expected_embedding_dim: 3,
            task_deadline_secs: 300,
            cors_allowed_origins: vec!["*".to_string()],
            agent_executor_url: None,
            planner_url: None,
        }
    }
}

impl DaemonConfig {
    /// The directory `main.rs` looks in when `SHANNON_DAEMON_CONFIG` isn't
    /// set: `$HOME/.shannon/daemon.toml`, falling back to the current
    /// directory when the home directory can't be resolved.
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".shannon")
            .join("daemon.toml")
    }

    /// Load from a TOML file, falling back to defaults for anything the
    /// file omits and for a missing file entirely (spec §9 "in-process
    /// adapters over production infra", same tolerant-load posture as
    /// `shannon_core::config::ConfigHandle`).
    pub fn load_or_default(path: impl AsRef<std::path::Path>) -> Self {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => toml::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "malformed daemon config, using defaults");
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = std::env::temp_dir().join(format!("shannon-daemon-cfg-{}.toml", uuid::Uuid::new_v4()));
        let cfg = DaemonConfig::load_or_default(&path);
        assert_eq!(cfg.port, 8088);
        assert_eq!(cfg.bind_addr(), "127.0.0.1:8088");
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("shannon-daemon-cfg-{}.toml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "port = 9999\n").unwrap();
        let cfg = DaemonConfig::load_or_default(&path);
        assert_eq!(cfg.port, 9999);
        assert_eq!(cfg.host, "127.0.0.1");
    }

    #[test]
    fn default_config_path_lands_under_dot_shannon() {
        let path = DaemonConfig::default_config_path();
        assert!(path.ends_with(".shannon/daemon.toml"));
    }
}
