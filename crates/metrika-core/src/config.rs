//! Server and agent configuration.
//!
//! Each process resolves its settings from up to three layers: command-line
//! flags (with environment fallbacks), an optional config file, and built-in
//! defaults. The `*FileConfig` types describe one layer with every field
//! optional; `merge` stacks two layers and `resolve` applies defaults to
//! produce the final [`ServerConfig`] / [`AgentConfig`].
//!
//! Config files are JSON or TOML, picked by extension (`.toml` → TOML,
//! anything else → JSON).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ADDRESS: &str = "localhost:8080";
pub const DEFAULT_STORE_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_RESTORE: bool = true;
pub const DEFAULT_REPORT_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
pub const DEFAULT_RATE_LIMIT: usize = 3;

fn load_layer<T: for<'de> Deserialize<'de>>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let layer = if is_toml {
        toml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(layer)
}

/// Zero and empty values count as "not set", so a lower layer still applies.
fn positive(v: Option<u64>) -> Option<u64> {
    v.filter(|v| *v > 0)
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|v| !v.is_empty())
}

fn non_empty_path(v: Option<PathBuf>) -> Option<PathBuf> {
    v.filter(|p| !p.as_os_str().is_empty())
}

// ── Server ─────────────────────────────────────────────────────────

/// One layer of server settings. Keys match the JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerFileConfig {
    pub address: Option<String>,
    pub grpc_address: Option<String>,
    pub store_interval: Option<u64>,
    pub store_file: Option<PathBuf>,
    pub restore: Option<bool>,
    pub database_dsn: Option<String>,
    pub key: Option<String>,
    pub crypto_key: Option<PathBuf>,
}

impl ServerFileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        load_layer(path)
    }

    /// Fields set in `self` win; unset fields fall through to `lower`.
    pub fn merge(self, lower: Self) -> Self {
        Self {
            address: non_empty(self.address).or(lower.address),
            grpc_address: non_empty(self.grpc_address).or(lower.grpc_address),
            store_interval: positive(self.store_interval).or(lower.store_interval),
            store_file: non_empty_path(self.store_file).or(lower.store_file),
            restore: self.restore.or(lower.restore),
            database_dsn: non_empty(self.database_dsn).or(lower.database_dsn),
            key: non_empty(self.key).or(lower.key),
            crypto_key: non_empty_path(self.crypto_key).or(lower.crypto_key),
        }
    }

    pub fn resolve(self) -> ServerConfig {
        ServerConfig {
            address: non_empty(self.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            grpc_address: non_empty(self.grpc_address),
            store_interval: Duration::from_secs(
                positive(self.store_interval).unwrap_or(DEFAULT_STORE_INTERVAL_SECS),
            ),
            store_file: non_empty_path(self.store_file),
            restore: self.restore.unwrap_or(DEFAULT_RESTORE),
            database_path: non_empty(self.database_dsn).map(PathBuf::from),
            key: non_empty(self.key),
            crypto_key: non_empty_path(self.crypto_key),
        }
    }
}

/// Fully resolved server settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// HTTP listen address, `host:port`.
    pub address: String,
    /// gRPC listen address; the gRPC server is off when unset.
    pub grpc_address: Option<String>,
    pub store_interval: Duration,
    /// Snapshot file for the file-backed store.
    pub store_file: Option<PathBuf>,
    pub restore: bool,
    /// redb database file; takes priority over `store_file`.
    pub database_path: Option<PathBuf>,
    /// HMAC secret.
    pub key: Option<String>,
    /// PEM private key for decrypting agent batches.
    pub crypto_key: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerFileConfig::default().resolve()
    }
}

// ── Agent ──────────────────────────────────────────────────────────

/// One layer of agent settings. Keys match the JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentFileConfig {
    pub address: Option<String>,
    pub grpc_address: Option<String>,
    pub report_interval: Option<u64>,
    pub poll_interval: Option<u64>,
    pub key: Option<String>,
    pub rate_limit: Option<u64>,
    pub crypto_key: Option<PathBuf>,
}

impl AgentFileConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        load_layer(path)
    }

    /// Fields set in `self` win; unset fields fall through to `lower`.
    pub fn merge(self, lower: Self) -> Self {
        Self {
            address: non_empty(self.address).or(lower.address),
            grpc_address: non_empty(self.grpc_address).or(lower.grpc_address),
            report_interval: positive(self.report_interval).or(lower.report_interval),
            poll_interval: positive(self.poll_interval).or(lower.poll_interval),
            key: non_empty(self.key).or(lower.key),
            rate_limit: positive(self.rate_limit).or(lower.rate_limit),
            crypto_key: non_empty_path(self.crypto_key).or(lower.crypto_key),
        }
    }

    pub fn resolve(self) -> AgentConfig {
        AgentConfig {
            address: non_empty(self.address).unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            grpc_address: non_empty(self.grpc_address),
            report_interval: Duration::from_secs(
                positive(self.report_interval).unwrap_or(DEFAULT_REPORT_INTERVAL_SECS),
            ),
            poll_interval: Duration::from_secs(
                positive(self.poll_interval).unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            key: non_empty(self.key),
            rate_limit: positive(self.rate_limit)
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(DEFAULT_RATE_LIMIT),
            crypto_key: non_empty_path(self.crypto_key),
        }
    }
}

/// Fully resolved agent settings.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Server HTTP address, `host:port`.
    pub address: String,
    /// When set, batches go over gRPC to this address instead of HTTP.
    pub grpc_address: Option<String>,
    pub report_interval: Duration,
    pub poll_interval: Duration,
    pub key: Option<String>,
    /// Number of delivery workers, and the queue capacity.
    pub rate_limit: usize,
    /// PEM public key for encrypting batches.
    pub crypto_key: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentFileConfig::default().resolve()
    }
}
