//! Replica configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use bftb_ledger::DEFAULT_ENDOWMENT;
use bftb_types::{Balance, QuorumParams};
use bftb_work::Difficulty;

use crate::{ReplicaError, DEFAULT_MAX_KEYS};

/// Configuration for one replica of an `N`-replica deployment.
///
/// Can be loaded from a TOML file via [`ReplicaConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// This replica's index, `0..replicas`.
    #[serde(default)]
    pub id: usize,

    /// Total number of replicas (N).
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Tolerated Byzantine replicas (f).
    #[serde(default = "default_faults")]
    pub faults: usize,

    /// Interface the HTTP server binds to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Replica `i` listens on `base_port + i`.
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    /// Directory for ledger snapshots. `None` keeps the ledger in memory only.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Starting balance of new accounts.
    #[serde(default = "default_endowment")]
    pub endowment: Balance,

    /// Leading zero bits required of write proof-of-work.
    #[serde(default = "default_work_difficulty_bits")]
    pub work_difficulty_bits: u32,

    /// How long startup waits for every replica's key.
    #[serde(default = "default_key_exchange_timeout_secs")]
    pub key_exchange_timeout_secs: u64,

    /// Optional per-account write rate limit.
    #[serde(default)]
    pub throttle: Option<ThrottleConfig>,

    /// Distinct keys that may hold outstanding nonces at once.
    #[serde(default = "default_max_nonce_keys")]
    pub max_nonce_keys: usize,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// At most `max_writes` write requests per account per `window_secs`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    pub max_writes: u64,
    pub window_secs: u64,
}

impl ThrottleConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_replicas() -> usize {
    4
}

fn default_faults() -> usize {
    1
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    8080
}

fn default_endowment() -> Balance {
    DEFAULT_ENDOWMENT
}

fn default_work_difficulty_bits() -> u32 {
    Difficulty::DEFAULT.bits()
}

fn default_key_exchange_timeout_secs() -> u64 {
    30
}

fn default_max_nonce_keys() -> usize {
    DEFAULT_MAX_KEYS
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            id: 0,
            replicas: default_replicas(),
            faults: default_faults(),
            host: default_host(),
            base_port: default_base_port(),
            data_dir: None,
            endowment: default_endowment(),
            work_difficulty_bits: default_work_difficulty_bits(),
            key_exchange_timeout_secs: default_key_exchange_timeout_secs(),
            throttle: None,
            max_nonce_keys: default_max_nonce_keys(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

impl ReplicaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Fields missing from the file use their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, ReplicaError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ReplicaError> {
        toml::from_str(contents).map_err(|e| ReplicaError::Config(e.to_string()))
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<(), ReplicaError> {
        self.quorum_params()?;
        self.difficulty()?;
        if self.id >= self.replicas {
            return Err(ReplicaError::Config(format!(
                "replica id {} out of range for {} replicas",
                self.id, self.replicas
            )));
        }
        if self.endowment <= 0 {
            return Err(ReplicaError::Config("endowment must be positive".into()));
        }
        if self.max_nonce_keys == 0 {
            return Err(ReplicaError::Config("max_nonce_keys must be positive".into()));
        }
        if let Some(throttle) = &self.throttle {
            if throttle.max_writes == 0 || throttle.window_secs == 0 {
                return Err(ReplicaError::Config(
                    "throttle max_writes and window_secs must be positive".into(),
                ));
            }
        }
        let last_port = u32::from(self.base_port) + self.replicas as u32 - 1;
        if last_port > u32::from(u16::MAX) {
            return Err(ReplicaError::Config(format!(
                "base port {} leaves no room for {} replicas",
                self.base_port, self.replicas
            )));
        }
        Ok(())
    }

    pub fn quorum_params(&self) -> Result<QuorumParams, ReplicaError> {
        Ok(QuorumParams::new(self.replicas, self.faults)?)
    }

    pub fn difficulty(&self) -> Result<Difficulty, ReplicaError> {
        Ok(Difficulty::new(self.work_difficulty_bits)?)
    }

    pub fn port_of(&self, replica: usize) -> u16 {
        self.base_port.saturating_add(replica as u16)
    }

    pub fn listen_port(&self) -> u16 {
        self.port_of(self.id)
    }

    /// Base URL of replica `replica` in this deployment.
    pub fn replica_url(&self, replica: usize) -> String {
        format!("http://{}:{}", self.host, self.port_of(replica))
    }

    pub fn key_exchange_timeout(&self) -> Duration {
        Duration::from_secs(self.key_exchange_timeout_secs)
    }
}
