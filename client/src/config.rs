//! Client configuration with TOML file support.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use bftb_types::QuorumParams;
use bftb_work::Difficulty;

use crate::ClientError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of every replica, in replica id order.
    #[serde(default)]
    pub replica_urls: Vec<String>,

    /// Tolerated Byzantine replicas (f).
    #[serde(default = "default_faults")]
    pub faults: usize,

    /// Per-replica deadline for each call.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Leading zero bits of write proof-of-work. Must match the replicas.
    #[serde(default = "default_work_difficulty_bits")]
    pub work_difficulty_bits: u32,
}

fn default_faults() -> usize {
    1
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_work_difficulty_bits() -> u32 {
    Difficulty::DEFAULT.bits()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            replica_urls: Vec::new(),
            faults: default_faults(),
            request_timeout_ms: default_request_timeout_ms(),
            work_difficulty_bits: default_work_difficulty_bits(),
        }
    }
}

impl ClientConfig {
    pub fn from_toml_file(path: &Path) -> Result<Self, ClientError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ClientError> {
        toml::from_str(contents).map_err(|e| ClientError::Config(e.to_string()))
    }

    /// `replicas` local replicas listening on consecutive ports.
    pub fn local(host: &str, base_port: u16, replicas: usize, faults: usize) -> Self {
        Self {
            replica_urls: (0..replicas)
                .map(|i| format!("http://{host}:{}", base_port as usize + i))
                .collect(),
            faults,
            ..Self::default()
        }
    }

    pub fn quorum_params(&self) -> Result<QuorumParams, ClientError> {
        QuorumParams::new(self.replica_urls.len(), self.faults)
            .map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn difficulty(&self) -> Result<Difficulty, ClientError> {
        Difficulty::new(self.work_difficulty_bits).map_err(|e| ClientError::Config(e.to_string()))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_with_defaults() {
        let config = ClientConfig::from_toml_str(
            r#"
            replica_urls = ["http://a:1", "http://b:2", "http://c:3"]
            "#,
        )
        .unwrap();
        assert_eq!(config.faults, 1);
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.quorum_params().unwrap().threshold(), 2);
    }

    #[test]
    fn local_urls_follow_ports() {
        let config = ClientConfig::local("127.0.0.1", 8080, 4, 1);
        assert_eq!(config.replica_urls[3], "http://127.0.0.1:8083");
    }

    #[test]
    fn too_few_replicas_is_a_config_error() {
        let config = ClientConfig::local("127.0.0.1", 8080, 2, 1);
        assert!(matches!(config.quorum_params(), Err(ClientError::Config(_))));
    }
}
