//! Node configuration.
//!
//! Constant groups hold compiled-in defaults; [`NodeConfig`] is the JSON file
//! a node is booted from.

use crate::error::{NodeError, Result};
use crate::identity::Identity;
use crate::process::Port;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Compiled-in node defaults.
pub struct NodeDefaults;

impl NodeDefaults {
    pub const NODE_VERSION: &'static str = env!("CARGO_PKG_VERSION");
    /// Application protocol version spoken by this node.
    pub const APP_PROTOCOL_VERSION: &'static str = "0.0.1";

    pub const RPC_HOST: &'static str = "127.0.0.1";
    pub const RPC_PORT: u16 = 3435;

    pub const APPS_DIR: &'static str = "apps";
    pub const LOCAL_DIR: &'static str = "local";
    pub const CONFIG_FILE_NAME: &'static str = "meshnode.json";

    pub const TRANSPORT_TYPES: &'static [&'static str] = &["messaging", "tcp"];

    /// Time a child process gets to exit after SIGTERM.
    pub const STOP_GRACE: Duration = Duration::from_secs(5);
}

/// One application installed on the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub app: String,
    pub version: String,
    #[serde(default = "default_protocol_version")]
    pub protocol_version: String,
    #[serde(default)]
    pub port: Port,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub auto_start: bool,
}

fn default_protocol_version() -> String {
    NodeDefaults::APP_PROTOCOL_VERSION.to_string()
}

fn default_apps_dir() -> PathBuf {
    PathBuf::from(NodeDefaults::APPS_DIR)
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(NodeDefaults::LOCAL_DIR)
}

fn default_transport_types() -> Vec<String> {
    NodeDefaults::TRANSPORT_TYPES
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// On-disk node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub local_identity: Identity,
    /// Directory holding application binaries.
    #[serde(default = "default_apps_dir")]
    pub apps_dir: PathBuf,
    /// Root of per-application working directories.
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
    #[serde(default)]
    pub apps: Vec<AppConfig>,
    #[serde(default = "default_transport_types")]
    pub transport_types: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            local_identity: Identity::NULL,
            apps_dir: default_apps_dir(),
            local_dir: default_local_dir(),
            apps: Vec::new(),
            transport_types: default_transport_types(),
        }
    }
}

impl NodeConfig {
    /// Load a configuration file, generating an identity if none is set.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::io_with_path(e, path))?;
        let mut config: NodeConfig = serde_json::from_str(&content)?;
        config.validate()?;
        if config.local_identity.is_null() {
            config.local_identity = Identity::generate();
            info!(
                "No identity in {}, generated {}",
                path.display(),
                config.local_identity
            );
        }
        debug!("Loaded config with {} apps from {}", config.apps.len(), path.display());
        Ok(config)
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| NodeError::io_with_path(e, parent))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| NodeError::io_with_path(e, path))?;
        debug!("Saved config to {}", path.display());
        Ok(())
    }

    /// Reject duplicate app names and duplicate non-zero auto-start ports.
    pub fn validate(&self) -> Result<()> {
        let mut names = std::collections::HashSet::new();
        let mut ports = std::collections::HashMap::new();
        for app in &self.apps {
            if app.app.is_empty() {
                return Err(NodeError::Config {
                    message: "app name must not be empty".into(),
                });
            }
            if !names.insert(app.app.as_str()) {
                return Err(NodeError::Config {
                    message: format!("app {} is configured twice", app.app),
                });
            }
            if app.auto_start && app.port != 0 {
                if let Some(other) = ports.insert(app.port, app.app.as_str()) {
                    return Err(NodeError::Config {
                        message: format!(
                            "apps {} and {} both auto-start on port {}",
                            other, app.app, app.port
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn app(&self, name: &str) -> Option<&AppConfig> {
        self.apps.iter().find(|a| a.app == name)
    }
}

/// Whether an application protocol version can be served by this node.
///
/// Uses caret semantics against [`NodeDefaults::APP_PROTOCOL_VERSION`].
pub fn protocol_compatible(version: &str) -> Result<bool> {
    let supported = semver::Version::parse(NodeDefaults::APP_PROTOCOL_VERSION)
        .map_err(|e| NodeError::Other(format!("bad built-in protocol version: {}", e)))?;
    let req = semver::VersionReq::parse(&format!("^{}", version.trim()))
        .map_err(|e| NodeError::invalid(format!("bad protocol version {:?}: {}", version, e)))?;
    Ok(req.matches(&supported))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn app(name: &str, port: Port, auto_start: bool) -> AppConfig {
        AppConfig {
            app: name.into(),
            version: "1.0".into(),
            protocol_version: "0.0.1".into(),
            port,
            args: vec![],
            auto_start,
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("meshnode.json");

        let config = NodeConfig {
            local_identity: Identity::generate(),
            apps: vec![app("foo", 10, true)],
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_generates_identity_and_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("meshnode.json");
        std::fs::write(&path, r#"{"apps":[{"app":"foo","version":"1.0"}]}"#).unwrap();

        let loaded = NodeConfig::load(&path).unwrap();
        assert!(!loaded.local_identity.is_null());
        assert_eq!(loaded.apps_dir, PathBuf::from("apps"));
        assert_eq!(loaded.local_dir, PathBuf::from("local"));
        assert_eq!(loaded.apps[0].protocol_version, "0.0.1");
        assert_eq!(loaded.transport_types, vec!["messaging", "tcp"]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = NodeConfig::load("/nonexistent/meshnode.json").unwrap_err();
        assert!(matches!(err, NodeError::Io { path: Some(_), .. }));
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let config = NodeConfig {
            apps: vec![app("foo", 1, false), app("foo", 2, false)],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = NodeConfig {
            apps: vec![app("foo", 5, true), app("bar", 5, true)],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Sharing a port is fine when only one of them auto-starts.
        let config = NodeConfig {
            apps: vec![app("foo", 5, true), app("bar", 5, false)],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_protocol_compatible() {
        assert!(protocol_compatible("0.0.1").unwrap());
        assert!(!protocol_compatible("0.0.2").unwrap());
        assert!(!protocol_compatible("1.0.0").unwrap());
        assert!(protocol_compatible("not-a-version").is_err());
    }
}
