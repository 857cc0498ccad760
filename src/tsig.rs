// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG key material and zone connection settings
//!
//! A [`TsigKey`] holds the shared secret used to authenticate transfers and
//! updates. It is built per request from the keyring (or from caller-supplied
//! plaintext), never printed in clear, and rendered to disk only through
//! [`crate::keyfile::KeyFileManager`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Placeholder written wherever a secret would otherwise appear
pub const REDACTED: &str = "[REDACTED]";

/// Errors raised while building key material
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TsigError {
    #[error("Unsupported TSIG algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Invalid TSIG key name: {0}")]
    InvalidKeyName(String),

    #[error("Invalid TSIG secret for key {0}: must be non-empty base64")]
    InvalidSecret(String),
}

/// HMAC algorithm of a TSIG key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum TsigAlgorithm {
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
}

impl TsigAlgorithm {
    /// Algorithm name as written in BIND key stanzas
    pub fn as_str(&self) -> &'static str {
        match self {
            TsigAlgorithm::HmacMd5 => "hmac-md5",
            TsigAlgorithm::HmacSha1 => "hmac-sha1",
            TsigAlgorithm::HmacSha224 => "hmac-sha224",
            TsigAlgorithm::HmacSha256 => "hmac-sha256",
            TsigAlgorithm::HmacSha384 => "hmac-sha384",
            TsigAlgorithm::HmacSha512 => "hmac-sha512",
        }
    }
}

impl FromStr for TsigAlgorithm {
    type Err = TsigError;

    /// Accepts "hmac-sha256", "HMAC-SHA256", "sha256" and the legacy
    /// "hmac-md5.sig-alg.reg.int" spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().trim_end_matches('.').to_ascii_lowercase();
        let short = lower
            .trim_end_matches(".sig-alg.reg.int")
            .trim_start_matches("hmac-");
        match short {
            "md5" => Ok(TsigAlgorithm::HmacMd5),
            "sha1" => Ok(TsigAlgorithm::HmacSha1),
            "sha224" => Ok(TsigAlgorithm::HmacSha224),
            "sha256" => Ok(TsigAlgorithm::HmacSha256),
            "sha384" => Ok(TsigAlgorithm::HmacSha384),
            "sha512" => Ok(TsigAlgorithm::HmacSha512),
            _ => Err(TsigError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for TsigAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// TSIG key material: name, algorithm and base64 secret
#[derive(Clone, PartialEq, Eq)]
pub struct TsigKey {
    name: String,
    algorithm: TsigAlgorithm,
    secret: String,
}

impl TsigKey {
    /// Build key material, rejecting anything that could not be written into a
    /// key stanza verbatim (quotes, braces, whitespace, non-base64 secrets).
    pub fn new(
        name: impl Into<String>,
        algorithm: TsigAlgorithm,
        secret: impl Into<String>,
    ) -> Result<Self, TsigError> {
        let name = name.into();
        let secret = secret.into();

        let name_ok = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !name_ok {
            return Err(TsigError::InvalidKeyName(name));
        }

        let secret_ok = !secret.is_empty()
            && secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '='));
        if !secret_ok {
            return Err(TsigError::InvalidSecret(name));
        }

        Ok(Self {
            name,
            algorithm,
            secret,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn algorithm(&self) -> TsigAlgorithm {
        self.algorithm
    }

    #[cfg(test)]
    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }

    /// BIND key stanza consumed by `dig -k` and `nsupdate -k`
    ///
    /// ```text
    /// key "update-key" {
    ///     algorithm hmac-sha256;
    ///     secret "dGVzdC1zZWNyZXQ=";
    /// };
    /// ```
    pub(crate) fn to_key_stanza(&self) -> String {
        format!(
            "key \"{}\" {{\n    algorithm {};\n    secret \"{}\";\n}};\n",
            self.name, self.algorithm, self.secret
        )
    }

    /// Replace every occurrence of the secret in `text`
    pub fn redact(&self, text: &str) -> String {
        text.replace(&self.secret, REDACTED)
    }
}

impl fmt::Debug for TsigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TsigKey")
            .field("name", &self.name)
            .field("algorithm", &self.algorithm)
            .field("secret", &REDACTED)
            .finish()
    }
}

/// Where and how to reach the authoritative server for a key
///
/// The secret is injected separately and never stored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ZoneConfig {
    /// Keyring identifier of the key
    pub id: String,
    /// Server address, optionally with a port ("10.0.0.1", "10.0.0.1:5353", "[::1]:53")
    pub server: String,
    pub key_name: String,
    pub algorithm: TsigAlgorithm,
}

impl ZoneConfig {
    /// Split `server` into host and optional port
    pub fn server_endpoint(&self) -> (String, Option<u16>) {
        split_server(&self.server)
    }
}

/// Split a server string into host and optional port
pub fn split_server(server: &str) -> (String, Option<u16>) {
    let server = server.trim();

    // [v6]:port or [v6]
    if let Some(rest) = server.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host.to_string(), port);
        }
    }

    // host:port, but leave bare IPv6 literals alone
    if server.matches(':').count() == 1 {
        if let Some((host, port)) = server.split_once(':') {
            if let Ok(port) = port.parse() {
                return (host.to_string(), Some(port));
            }
        }
    }

    (server.to_string(), None)
}
