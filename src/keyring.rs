// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! TSIG keyring
//!
//! Secrets are supplied out of band in a BIND-style key file. The same grammar
//! as `named.conf` key stanzas is accepted, plus `server` blocks that bind a
//! server to a key and an `options` block for defaults:
//!
//! ```text
//! key "example-update" {
//!     algorithm hmac-sha256;
//!     secret "c2VjcmV0LWtleS1tYXRlcmlhbA==";
//! };
//!
//! server 10.0.0.53 {
//!     key "example-update";
//!     port 5353;
//! };
//!
//! options {
//!     default-server 127.0.0.1;
//!     default-key "example-update";
//! };
//! ```
//!
//! `//`, `#` and `/* */` comments are allowed anywhere whitespace is.
//!
//! # Examples
//!
//! ```rust
//! use zonekeeper::keyring::parse_keyring_str;
//!
//! let keyring = parse_keyring_str(r#"
//! key "update-key" {
//!     algorithm hmac-sha256;
//!     secret "dGVzdC1zZWNyZXQ=";
//! };
//! "#).unwrap();
//!
//! let config = keyring.zone_config("update-key").unwrap();
//! assert_eq!(config.key_name, "update-key");
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace1},
    combinator::{map, map_res, value},
    multi::many0,
    sequence::{delimited, preceded, terminated, tuple},
    IResult,
};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::tsig::{TsigAlgorithm, TsigError, TsigKey, ZoneConfig};

/// Server used when neither a `server` block nor `default-server` names one
pub const FALLBACK_SERVER: &str = "127.0.0.1";

/// Keyring load errors
#[derive(Debug, Error)]
pub enum KeyringParseError {
    #[error("Keyring syntax error near: {0}")]
    Syntax(String),

    #[error("Key {name} is missing its {field}")]
    MissingField { name: String, field: &'static str },

    #[error("Key {name}: {source}")]
    InvalidKey { name: String, source: TsigError },

    #[error("Failed to read keyring {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Binding of a server address to a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerBinding {
    pub address: String,
    pub key: Option<String>,
    pub port: Option<u16>,
}

impl ServerBinding {
    /// `address` or `address:port` (`[v6]:port` for IPv6 literals)
    pub fn endpoint(&self) -> String {
        match self.port {
            None => self.address.clone(),
            Some(port) if self.address.parse::<IpAddr>().map_or(false, |ip| ip.is_ipv6()) => {
                format!("[{}]:{}", self.address, port)
            }
            Some(port) => format!("{}:{}", self.address, port),
        }
    }
}

/// Keys and server bindings loaded from a keyring file
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: BTreeMap<String, TsigKey>,
    servers: Vec<ServerBinding>,
    default_server: Option<String>,
    default_key: Option<String>,
    fallback_server: Option<String>,
}

impl Keyring {
    /// Server to use when the keyring names none (e.g. from `DNS_SERVER`)
    pub fn with_fallback_server(mut self, server: impl Into<String>) -> Self {
        self.fallback_server = Some(server.into());
        self
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key_ids(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    pub fn servers(&self) -> &[ServerBinding] {
        &self.servers
    }

    /// A per-request copy of the key material
    pub fn key(&self, key_id: &str) -> Option<TsigKey> {
        self.keys.get(key_id).cloned()
    }

    /// The key to use when a request names none: `default-key`, or the only
    /// key when there is exactly one
    pub fn default_key(&self) -> Option<&str> {
        match &self.default_key {
            Some(id) => Some(id.as_str()),
            None if self.keys.len() == 1 => self.keys.keys().next().map(String::as_str),
            None => None,
        }
    }

    /// Resolve a requested key id, falling back to [`default_key`](Self::default_key)
    pub fn resolve_key_id<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .or_else(|| self.default_key())
    }

    /// Connection settings for `key_id`, without the secret
    ///
    /// The server comes from the first `server` block bound to the key, then
    /// `default-server`, then the fallback server.
    pub fn zone_config(&self, key_id: &str) -> Option<ZoneConfig> {
        let key = self.keys.get(key_id)?;

        let server = self
            .servers
            .iter()
            .find(|binding| binding.key.as_deref() == Some(key_id))
            .map(ServerBinding::endpoint)
            .or_else(|| self.default_server.clone())
            .or_else(|| self.fallback_server.clone())
            .unwrap_or_else(|| FALLBACK_SERVER.to_string());

        Some(ZoneConfig {
            id: key_id.to_string(),
            server,
            key_name: key.name().to_string(),
            algorithm: key.algorithm(),
        })
    }
}

/// Parse keyring text
pub fn parse_keyring_str(input: &str) -> Result<Keyring, KeyringParseError> {
    let (rest, statements) = match keyring(input) {
        Ok(parsed) => parsed,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(KeyringParseError::Syntax(snippet(e.input)))
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(KeyringParseError::Syntax("unexpected end of input".to_string()))
        }
    };

    if !rest.trim().is_empty() {
        return Err(KeyringParseError::Syntax(snippet(rest)));
    }

    let mut ring = Keyring::default();

    for statement in statements {
        match statement {
            Statement::Key(raw) => {
                let key = raw.into_key()?;
                // Later definitions replace earlier ones, as in named.conf includes
                ring.keys.insert(key.name().to_string(), key);
            }
            Statement::Server(binding) => ring.servers.push(binding),
            Statement::Options(options) => {
                for option in options {
                    match option {
                        OptionEntry::DefaultServer(server) => ring.default_server = Some(server),
                        OptionEntry::DefaultKey(key) => ring.default_key = Some(key),
                    }
                }
            }
        }
    }

    debug!(
        "Parsed keyring with {} keys and {} server bindings",
        ring.keys.len(),
        ring.servers.len()
    );

    Ok(ring)
}

/// Read and parse a keyring file
pub fn load_keyring(path: &Path) -> Result<Keyring, KeyringParseError> {
    let content = std::fs::read_to_string(path).map_err(|source| KeyringParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ring = parse_keyring_str(&content)?;
    info!("Loaded {} TSIG keys from {}", ring.len(), path.display());
    Ok(ring)
}

/// First line of the unparsed input, for error messages
fn snippet(input: &str) -> String {
    input
        .trim_start()
        .lines()
        .next()
        .unwrap_or_default()
        .chars()
        .take(60)
        .collect()
}

#[derive(Debug)]
struct RawKey {
    name: String,
    algorithm: Option<String>,
    secret: Option<String>,
}

impl RawKey {
    fn into_key(self) -> Result<TsigKey, KeyringParseError> {
        let missing = |field| KeyringParseError::MissingField {
            name: self.name.clone(),
            field,
        };
        let algorithm = self.algorithm.as_deref().ok_or_else(|| missing("algorithm"))?;
        let secret = self.secret.clone().ok_or_else(|| missing("secret"))?;

        let invalid = |source| KeyringParseError::InvalidKey {
            name: self.name.clone(),
            source,
        };
        let algorithm = algorithm.parse::<TsigAlgorithm>().map_err(invalid)?;
        TsigKey::new(self.name.clone(), algorithm, secret).map_err(invalid)
    }
}

#[derive(Debug)]
enum Statement {
    Key(RawKey),
    Server(ServerBinding),
    Options(Vec<OptionEntry>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum OptionEntry {
    DefaultServer(String),
    DefaultKey(String),
}

enum KeyEntry {
    Algorithm(String),
    Secret(String),
}

enum ServerEntry {
    Key(String),
    Port(u16),
}

fn keyring(input: &str) -> IResult<&str, Vec<Statement>> {
    terminated(many0(padded(statement)), skip)(input)
}

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        map(key_block, Statement::Key),
        map(server_block, Statement::Server),
        map(options_block, Statement::Options),
    ))(input)
}

/// Whitespace and comments
fn skip(input: &str) -> IResult<&str, ()> {
    value(
        (),
        many0(alt((
            value((), multispace1),
            value((), preceded(tag("//"), take_while(|c| c != '\n'))),
            value((), preceded(char('#'), take_while(|c| c != '\n'))),
            value((), tuple((tag("/*"), take_until("*/"), tag("*/")))),
        ))),
    )(input)
}

fn padded<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(skip, inner, skip)
}

fn end_of_statement(input: &str) -> IResult<&str, char> {
    padded(char(';'))(input)
}

/// `{ entry* } ;`
fn block<'a, O, F>(entry: F) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(
        padded(char('{')),
        many0(padded(entry)),
        tuple((padded(char('}')), end_of_statement)),
    )
}

/// `"text"` with `\"` and `\\` escapes
fn quoted(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            many0(alt((
                preceded(char('\\'), alt((value("\"", char('"')), value("\\", char('\\'))))),
                take_while1(|c| c != '"' && c != '\\'),
            ))),
            |parts: Vec<&str>| parts.concat(),
        ),
        char('"'),
    )(input)
}

/// Bare word: names, algorithms, hostnames and IPv4/IPv6 literals
fn word(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))(input)
}

fn quoted_or_word(input: &str) -> IResult<&str, String> {
    alt((quoted, map(word, str::to_string)))(input)
}

fn port(input: &str) -> IResult<&str, u16> {
    map_res(digit1, str::parse::<u16>)(input)
}

/// `name value;`
fn setting<'a, O, F>(name: &'static str, parser: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(tuple((tag(name), skip)), parser, end_of_statement)
}

fn key_block(input: &str) -> IResult<&str, RawKey> {
    let (input, name) = preceded(tuple((tag("key"), skip)), quoted_or_word)(input)?;
    let (input, entries) = block(alt((
        map(setting("algorithm", word), |a: &str| KeyEntry::Algorithm(a.to_string())),
        map(setting("secret", quoted), KeyEntry::Secret),
    )))(input)?;

    let mut key = RawKey {
        name,
        algorithm: None,
        secret: None,
    };
    for entry in entries {
        match entry {
            KeyEntry::Algorithm(a) => key.algorithm = Some(a),
            KeyEntry::Secret(s) => key.secret = Some(s),
        }
    }
    Ok((input, key))
}

fn server_block(input: &str) -> IResult<&str, ServerBinding> {
    let (input, address) = preceded(tuple((tag("server"), skip)), word)(input)?;
    let (input, entries) = block(alt((
        map(setting("key", quoted_or_word), ServerEntry::Key),
        map(setting("port", port), ServerEntry::Port),
    )))(input)?;

    let mut binding = ServerBinding {
        address: address.to_string(),
        key: None,
        port: None,
    };
    for entry in entries {
        match entry {
            ServerEntry::Key(k) => binding.key = Some(k),
            ServerEntry::Port(p) => binding.port = Some(p),
        }
    }
    Ok((input, binding))
}

fn options_block(input: &str) -> IResult<&str, Vec<OptionEntry>> {
    preceded(
        tag("options"),
        block(alt((
            map(setting("default-server", quoted_or_word), OptionEntry::DefaultServer),
            map(setting("default-key", quoted_or_word), OptionEntry::DefaultKey),
        ))),
    )(input)
}

#[cfg(test)]
#[path = "keyring_test.rs"]
mod tests;
