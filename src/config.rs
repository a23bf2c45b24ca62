//! TOML configuration for a mesh member.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! single-member setup on `127.0.0.1:3000`. The binary applies CLI flags on
//! top of whatever was loaded here.

use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::membership::types::{MemberDescriptor, generate_member_id};
use crate::mesh::ring::{DEFAULT_RING_SEED, DEFAULT_RING_SIZE};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MeshConfig {
    /// Identity and listening addresses.
    pub node: NodeSection,
    /// Seeds and ring parameters.
    pub cluster: ClusterSection,
    /// Local storage tuning.
    pub storage: StorageSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Member id. A UUID v4 is generated when omitted.
    pub id: Option<String>,
    /// Host the HTTP API and gossip socket bind to, and that peers dial.
    pub host: String,
    /// HTTP API port.
    pub port: u16,
    /// Gossip UDP port.
    pub gossip_port: u16,
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            id: None,
            host: "127.0.0.1".to_string(),
            port: 3000,
            gossip_port: 4114,
        }
    }
}

/// `[cluster]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterSection {
    /// Gossip addresses (`host:port`) contacted until a peer is known.
    pub seeds: Vec<String>,
    /// Hash seed; must match on every member.
    pub ring_seed: u32,
    /// Ring slots per member; must match on every member.
    pub ring_size: u32,
}

impl Default for ClusterSection {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            ring_seed: DEFAULT_RING_SEED,
            ring_size: DEFAULT_RING_SIZE,
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// How often expired items are swept, in milliseconds.
    pub ttl_check_interval_ms: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            ttl_check_interval_ms: 10_000,
        }
    }
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl MeshConfig {
    /// Load from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("failed to read config {}", p.display()))?;
                Self::from_toml(&content)
                    .with_context(|| format!("failed to parse config {}", p.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Fill in a generated id if none was configured, and return it.
    pub fn ensure_id(&mut self) -> String {
        self.node.id.get_or_insert_with(generate_member_id).clone()
    }

    /// This member's descriptor. Generates an id if none is set.
    pub fn descriptor(&mut self) -> MemberDescriptor {
        let id = self.ensure_id();
        MemberDescriptor::new(id, self.node.host.clone(), self.node.port)
    }

    pub fn http_addr(&self) -> anyhow::Result<SocketAddr> {
        resolve(&self.node.host, self.node.port)
    }

    pub fn gossip_addr(&self) -> anyhow::Result<SocketAddr> {
        resolve(&self.node.host, self.node.gossip_port)
    }

    /// Seed gossip addresses, resolved.
    pub fn seed_addrs(&self) -> anyhow::Result<Vec<SocketAddr>> {
        self.cluster
            .seeds
            .iter()
            .map(|seed| {
                seed.to_socket_addrs()
                    .with_context(|| format!("invalid seed address {seed}"))?
                    .next()
                    .with_context(|| format!("seed {seed} resolved to nothing"))
            })
            .collect()
    }

    pub fn ttl_check_interval(&self) -> Duration {
        Duration::from_millis(self.storage.ttl_check_interval_ms.max(1))
    }
}

fn resolve(host: &str, port: u16) -> anyhow::Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("cannot resolve {host}:{port}"))?
        .next()
        .with_context(|| format!("{host}:{port} resolved to nothing"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = MeshConfig::from_toml("").unwrap();
        assert_eq!(config.node.port, 3000);
        assert_eq!(config.node.gossip_port, 4114);
        assert_eq!(config.cluster.ring_seed, 0xcafe_d00d);
        assert_eq!(config.cluster.ring_size, 128);
        assert_eq!(config.storage.ttl_check_interval_ms, 10_000);
        assert_eq!(config.log.level, "info");
        assert!(config.node.id.is_none());
    }

    #[test]
    fn test_parse_sections() {
        let config = MeshConfig::from_toml(
            r#"
            [node]
            id = "node-a"
            host = "127.0.0.1"
            port = 3100
            gossip_port = 4200

            [cluster]
            seeds = ["127.0.0.1:4114", "127.0.0.1:4115"]
            ring_size = 16
            "#,
        )
        .unwrap();

        assert_eq!(config.node.id.as_deref(), Some("node-a"));
        assert_eq!(config.http_addr().unwrap().port(), 3100);
        assert_eq!(config.gossip_addr().unwrap().port(), 4200);
        assert_eq!(config.seed_addrs().unwrap().len(), 2);
        assert_eq!(config.cluster.ring_size, 16);
        assert_eq!(config.cluster.ring_seed, DEFAULT_RING_SEED);
    }

    #[test]
    fn test_generated_id_is_stable() {
        let mut config = MeshConfig::default();
        let first = config.ensure_id();
        assert_eq!(config.descriptor().id, first);
    }

    #[test]
    fn test_bad_seed_is_rejected() {
        let mut config = MeshConfig::default();
        config.cluster.seeds = vec!["not an address".to_string()];
        assert!(config.seed_addrs().is_err());
    }
}
