//! Configuration system for Ferry.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $FERRY_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ferry/config.toml
//!   3. ~/.config/ferry/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ProtocolError;
use crate::wire::MAX_PAYLOAD;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FerryConfig {
    pub network: NetworkConfig,
    pub transfer: TransferConfig,
    pub fault: FaultConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to listen on.
    pub listen_addr: String,
    /// TCP port for transfer connections.
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Chunk payload size in bytes. Must be in 1..=MAX_PAYLOAD.
    pub chunk_size: usize,
    /// Per-operation read/write timeout in seconds. A stalled peer aborts
    /// its own session after this long, it never pins a worker.
    pub io_timeout_secs: u64,
    /// Resend attempts per sequence number before the session fails.
    pub max_resend_attempts: u32,
    /// Upper bound on the length-prefixed upload.
    pub max_upload_bytes: u64,
    /// Where uploaded files are stored.
    pub storage_path: PathBuf,
}

/// Deliberate chunk corruption/loss on the send path, for exercising
/// recovery against a live server. Both zero in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Percent of data frames to corrupt (0-100).
    pub corrupt_percent: u8,
    /// Percent of data frames to drop on the first pass (0-100).
    pub drop_percent: u8,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for FerryConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            transfer: TransferConfig::default(),
            fault: FaultConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1".to_string(),
            port: 4815,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1024,
            io_timeout_secs: 30,
            max_resend_attempts: 3,
            max_upload_bytes: 256 * 1024 * 1024,
            storage_path: data_dir().join("files"),
        }
    }
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            corrupt_percent: 0,
            drop_percent: 0,
        }
    }
}

impl TransferConfig {
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".config"))
        .join("ferry")
}

pub fn data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs_or_home().join(".local").join("share"))
        .join("ferry")
}

fn dirs_or_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl FerryConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            toml::from_str(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            FerryConfig::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("FERRY_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&FerryConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    /// Reject configurations the protocol cannot run with. Fatal at
    /// startup, never per-session.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.transfer.chunk_size == 0 {
            return Err(ProtocolError::InvalidConfig(
                "transfer.chunk_size must be greater than zero".into(),
            ));
        }
        if self.transfer.chunk_size > MAX_PAYLOAD {
            return Err(ProtocolError::InvalidConfig(format!(
                "transfer.chunk_size {} exceeds maximum payload {}",
                self.transfer.chunk_size, MAX_PAYLOAD
            )));
        }
        if self.transfer.io_timeout_secs == 0 {
            return Err(ProtocolError::InvalidConfig(
                "transfer.io_timeout_secs must be greater than zero".into(),
            ));
        }
        if self.fault.corrupt_percent > 100 || self.fault.drop_percent > 100 {
            return Err(ProtocolError::InvalidConfig(
                "fault percentages must be 0-100".into(),
            ));
        }
        Ok(())
    }

    /// Apply FERRY_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("FERRY_NETWORK__LISTEN_ADDR") {
            self.network.listen_addr = v;
        }
        if let Ok(v) = std::env::var("FERRY_NETWORK__PORT") {
            if let Ok(p) = v.parse() {
                self.network.port = p;
            }
        }
        if let Ok(v) = std::env::var("FERRY_TRANSFER__CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.transfer.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_TRANSFER__IO_TIMEOUT_SECS") {
            if let Ok(n) = v.parse() {
                self.transfer.io_timeout_secs = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_TRANSFER__STORAGE_PATH") {
            self.transfer.storage_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("FERRY_FAULT__CORRUPT_PERCENT") {
            if let Ok(n) = v.parse() {
                self.fault.corrupt_percent = n;
            }
        }
        if let Ok(v) = std::env::var("FERRY_FAULT__DROP_PERCENT") {
            if let Ok(n) = v.parse() {
                self.fault.drop_percent = n;
            }
        }
    }
}
