// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Shared configuration types: endpoint defaults and the resource-pool
//! originals, loadable from a JSON file and overridable from the CLI of
//! each binary.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Original size of the classroom and laboratory pools, applied the first
/// time a term is referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    #[serde(default = "default_classrooms_orig")]
    pub classrooms_orig: u32,
    #[serde(default = "default_labs_orig")]
    pub labs_orig: u32,
}

fn default_classrooms_orig() -> u32 {
    380
}

fn default_labs_orig() -> u32 {
    60
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            classrooms_orig: default_classrooms_orig(),
            labs_orig: default_labs_orig(),
        }
    }
}

/// The three sockets a single broker instance exposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerEndpoints {
    /// ROUTER socket faculty clients connect to.
    pub front: String,
    /// DEALER socket allocation workers connect to.
    pub back: String,
    /// REP socket the health service probes for liveness.
    pub heartbeat: String,
}

impl BrokerEndpoints {
    pub fn primary(bind_host: &str) -> Self {
        Self {
            front: format!("tcp://{bind_host}:5555"),
            back: format!("tcp://{bind_host}:5560"),
            heartbeat: format!("tcp://{bind_host}:5570"),
        }
    }

    pub fn secondary(bind_host: &str) -> Self {
        Self {
            front: format!("tcp://{bind_host}:5556"),
            back: format!("tcp://{bind_host}:5561"),
            heartbeat: format!("tcp://{bind_host}:5571"),
        }
    }
}

/// Health service view of both brokers, used to decide which is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerTopology {
    pub primary: BrokerEndpoints,
    pub secondary: BrokerEndpoints,
}

impl Default for BrokerTopology {
    fn default() -> Self {
        Self {
            primary: BrokerEndpoints::primary("127.0.0.1"),
            secondary: BrokerEndpoints::secondary("127.0.0.1"),
        }
    }
}

impl BrokerTopology {
    /// Load topology + pool config overrides from a JSON file, falling back
    /// to built-in defaults for anything the file omits.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.display().to_string(), e.to_string()))?;
        serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}

/// Default address the faculty client's health-service REQ socket dials.
pub fn default_health_service_endpoint() -> String {
    "tcp://127.0.0.1:6000".to_string()
}

/// Errors loading configuration from disk.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(String, String),
    #[error("failed to parse config file: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_defaults_match_spec() {
        let pools = PoolConfig::default();
        assert_eq!(pools.classrooms_orig, 380);
        assert_eq!(pools.labs_orig, 60);
    }

    #[test]
    fn broker_endpoints_follow_default_port_scheme() {
        let primary = BrokerEndpoints::primary("10.0.0.1");
        assert_eq!(primary.front, "tcp://10.0.0.1:5555");
        assert_eq!(primary.back, "tcp://10.0.0.1:5560");
        assert_eq!(primary.heartbeat, "tcp://10.0.0.1:5570");

        let secondary = BrokerEndpoints::secondary("10.0.0.2");
        assert_eq!(secondary.front, "tcp://10.0.0.2:5556");
        assert_eq!(secondary.heartbeat, "tcp://10.0.0.2:5571");
    }

    #[test]
    fn topology_loads_from_file() {
        let dir = tempfile_dir();
        let path = dir.join("topology.json");
        let topology = BrokerTopology::default();
        std::fs::write(&path, serde_json::to_string(&topology).unwrap()).unwrap();

        let loaded = BrokerTopology::from_file(&path).unwrap();
        assert_eq!(loaded.primary.front, topology.primary.front);
    }

    fn tempfile_dir() -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("aulas-proto-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
