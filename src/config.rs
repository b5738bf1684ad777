//! Bridge configuration, persisted as TOML.
//!
//! Every field has a serde default so partial config files are valid; the
//! CLI layers `--host`/`--port`/`--staging-dir` on top of whatever was loaded.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for a [`Connector`](crate::connector::Connector) and the
/// memory layer built on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Reasoning server host.
    #[serde(default = "default_host")]
    pub host: String,
    /// Reasoning server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Directory receiving one file per command while offline.
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,
    /// Upper bound on a single connect attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long `evaluate` waits for a reply before giving up.
    #[serde(default = "default_response_window_ms")]
    pub response_window_ms: u64,
    /// Sleep between non-blocking read attempts inside the response window.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum bytes taken from the socket per receive.
    #[serde(default = "default_receive_buffer")]
    pub receive_buffer: usize,
    /// Upper bound on one `evaluate` reply; anything beyond is discarded.
    #[serde(default = "default_max_reply_bytes")]
    pub max_reply_bytes: usize,
    /// Name prefix of the synthetic space-marker concept.
    #[serde(default = "default_space_prefix")]
    pub space_prefix: String,
    /// Name prefix of evolution before/after state concepts.
    #[serde(default = "default_state_prefix")]
    pub state_prefix: String,
    /// Name prefix of evolution operation predicates.
    #[serde(default = "default_operation_prefix")]
    pub operation_prefix: String,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    17001
}
fn default_staging_dir() -> PathBuf {
    std::env::temp_dir().join("cogserver_commands")
}
fn default_connect_timeout_ms() -> u64 {
    500
}
fn default_response_window_ms() -> u64 {
    100
}
fn default_poll_interval_ms() -> u64 {
    5
}
fn default_receive_buffer() -> usize {
    4096
}
fn default_max_reply_bytes() -> usize {
    1 << 20
}
fn default_space_prefix() -> String {
    "Space_".into()
}
fn default_state_prefix() -> String {
    "State_".into()
}
fn default_operation_prefix() -> String {
    "Operation_".into()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            staging_dir: default_staging_dir(),
            connect_timeout_ms: default_connect_timeout_ms(),
            response_window_ms: default_response_window_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            receive_buffer: default_receive_buffer(),
            max_reply_bytes: default_max_reply_bytes(),
            space_prefix: default_space_prefix(),
            state_prefix: default_state_prefix(),
            operation_prefix: default_operation_prefix(),
        }
    }
}

impl BridgeConfig {
    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    /// Config pointing at a specific endpoint, everything else default.
    pub fn with_endpoint(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// `host:port` as used for resolution and logging.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.max(1))
    }

    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
