//! Node configuration, loaded from a TOML file.

use benchnet_types::Role;
use serde::Deserialize;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid configuration {path}: {source}")]
    Format {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("cannot derive a listen address from url {url}")]
    ListenAddr { url: String },
}

/// Full node configuration.
///
/// ```toml
/// [node]
/// uuid = "agent-1"
/// url = "http://10.0.0.2:8988"
/// role = "agent"
/// contacts = ["http://10.0.0.1:8989"]
///
/// [tools]
/// manifest = "/etc/benchnet/tools.yaml"
///
/// [[descriptors]]
/// id = "001"
/// path = "/etc/benchnet/vnf-bd-001.yaml"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    #[serde(default)]
    pub tools: ToolsSection,
    /// Descriptor catalog, player only: descriptor id mapped to its
    /// template file.
    #[serde(default)]
    pub descriptors: Vec<DescriptorEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    pub uuid: String,
    /// Base url peers reach this node at; also decides the listen address.
    pub url: String,
    pub role: Role,
    /// Peers greeted shortly after startup.
    #[serde(default)]
    pub contacts: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsSection {
    /// Path to the YAML tool manifest, agents and monitors only.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DescriptorEntry {
    pub id: String,
    pub path: PathBuf,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Format {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The socket address to bind the message server on, derived from the
    /// authority part of the node url.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let url = &self.node.url;
        let authority = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))
            .unwrap_or(url);
        let authority = authority.split('/').next().unwrap_or(authority);
        authority
            .to_socket_addrs()
            .ok()
            .and_then(|mut addrs| addrs.next())
            .ok_or_else(|| ConfigError::ListenAddr { url: url.clone() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_full_config_parses() {
        let raw = r#"
            [node]
            uuid = "player-1"
            url = "http://127.0.0.1:8990"
            role = "player"
            contacts = ["http://127.0.0.1:8989"]

            [tools]
            manifest = "/etc/benchnet/tools.yaml"

            [[descriptors]]
            id = "001"
            path = "/etc/benchnet/vnf-bd-001.yaml"
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert_eq!(config.node.role, Role::Player);
        assert_eq!(config.node.contacts.len(), 1);
        assert_eq!(config.descriptors[0].id, "001");
        assert_eq!(
            config.listen_addr().unwrap(),
            "127.0.0.1:8990".parse().unwrap()
        );
    }

    #[test]
    fn test_minimal_config_defaults() {
        let raw = r#"
            [node]
            uuid = "agent-1"
            url = "http://127.0.0.1:8988"
            role = "agent"
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(raw.as_bytes()).unwrap();
        let config = NodeConfig::load(file.path()).unwrap();
        assert!(config.node.contacts.is_empty());
        assert!(config.tools.manifest.is_none());
        assert!(config.descriptors.is_empty());
    }

    #[test]
    fn test_unresolvable_url_rejected() {
        let raw = r#"
            [node]
            uuid = "agent-1"
            url = "http://"
            role = "agent"
        "#;
        let config: NodeConfig = toml::from_str(raw).unwrap();
        assert!(matches!(
            config.listen_addr(),
            Err(ConfigError::ListenAddr { .. })
        ));
    }
}
