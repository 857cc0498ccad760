// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Runtime configuration
//!
//! All settings are read once at start-up and handed to the components that
//! need them; nothing reads the environment afterwards.

use std::path::PathBuf;
use std::time::Duration;

/// Default API listen port
pub const DEFAULT_API_PORT: u16 = 8080;

/// Default timeout for one `dig` or `nsupdate` invocation
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_KEYRING_PATH: &str = "/etc/bind/zonekeeper.keys";

pub const DEFAULT_DNS_SERVER: &str = "127.0.0.1";

/// Engine and server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// HTTP listen port
    pub api_port: u16,
    /// Directory holding ephemeral key files
    pub key_dir: PathBuf,
    pub dig_path: PathBuf,
    pub nsupdate_path: PathBuf,
    /// Timeout per external invocation, in seconds
    pub operation_timeout_secs: u64,
    /// Keyring file with TSIG secrets and server bindings
    pub keyring_path: PathBuf,
    /// Server used for keys the keyring binds to no server
    pub dns_server: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            key_dir: default_key_dir(),
            dig_path: PathBuf::from("dig"),
            nsupdate_path: PathBuf::from("nsupdate"),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            keyring_path: PathBuf::from(DEFAULT_KEYRING_PATH),
            dns_server: DEFAULT_DNS_SERVER.to_string(),
        }
    }
}

fn default_key_dir() -> PathBuf {
    std::env::temp_dir().join("zonekeeper-keys")
}

impl EngineConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `API_PORT`: HTTP listen port (default: 8080)
    /// - `KEY_DIR`: key file directory (default: `<tmp>/zonekeeper-keys`)
    /// - `DIG_PATH`: `dig` binary (default: `dig`)
    /// - `NSUPDATE_PATH`: `nsupdate` binary (default: `nsupdate`)
    /// - `OPERATION_TIMEOUT_SECS`: per-invocation timeout (default: 30)
    /// - `TSIG_KEYRING`: keyring file (default: `/etc/bind/zonekeeper.keys`)
    /// - `DNS_SERVER`: fallback server address (default: `127.0.0.1`)
    ///
    /// Unparseable numbers fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let api_port = std::env::var("API_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.api_port);

        let operation_timeout_secs = std::env::var("OPERATION_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.operation_timeout_secs);

        let path_var = |name: &str, default: PathBuf| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(default)
        };

        Self {
            api_port,
            key_dir: path_var("KEY_DIR", defaults.key_dir),
            dig_path: path_var("DIG_PATH", defaults.dig_path),
            nsupdate_path: path_var("NSUPDATE_PATH", defaults.nsupdate_path),
            operation_timeout_secs,
            keyring_path: path_var("TSIG_KEYRING", defaults.keyring_path),
            dns_server: std::env::var("DNS_SERVER")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.dns_server),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.api_port == 0 {
            return Err("api_port must be greater than 0".to_string());
        }

        if self.operation_timeout_secs == 0 {
            return Err("operation_timeout_secs must be greater than 0".to_string());
        }

        if self.key_dir.as_os_str().is_empty() {
            return Err("key_dir must not be empty".to_string());
        }

        if self.dns_server.trim().is_empty() {
            return Err("dns_server must not be empty".to_string());
        }

        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}
