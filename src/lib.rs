// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! zonekeeper - DNS zone record engine and HTTP API
//!
//! Manages the records of DNS zones hosted on an authoritative server through
//! its zone-transfer and dynamic-update protocols, authenticated with TSIG
//! keys.
//!
//! # Features
//!
//! - Parse `dig AXFR` output into structured records
//! - Canonicalize and validate A, AAAA, CNAME, MX, TXT, SRV, NS, PTR, CAA,
//!   SOA and SSHFP records
//! - Detect conflicts across a change set (CNAME coexistence, duplicates,
//!   deletion of required apex records) before anything is sent
//! - Write TSIG keys to owner-only files that live exactly as long as one
//!   `dig`/`nsupdate` invocation
//! - Prometheus metrics integration
//!
//! # Usage
//!
//! ## Validating a change set
//!
//! ```rust
//! use zonekeeper::conflict::validate_batch;
//! use zonekeeper::record::{DnsRecord, PendingChange, RecordType};
//!
//! let changes = vec![
//!     PendingChange::add("example.com", "update-key",
//!         DnsRecord::new("www", RecordType::CNAME, "web.example.com.", 300)),
//!     PendingChange::add("example.com", "update-key",
//!         DnsRecord::new("www", RecordType::A, "192.0.2.10", 300)),
//! ];
//!
//! let result = validate_batch(&changes, "example.com");
//! assert!(!result.is_valid());
//! ```
//!
//! ## Reading a zone
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use zonekeeper::{
//!     keyfile::KeyFileManager, keyring::parse_keyring_str,
//!     orchestrator::ZoneOrchestrator, transport::BindToolsTransport,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let keyring = parse_keyring_str(r#"
//!         key "update-key" { algorithm hmac-sha256; secret "dGVzdC1zZWNyZXQ="; };
//!     "#)?;
//!     let orchestrator = ZoneOrchestrator::new(
//!         KeyFileManager::new("/run/zonekeeper/keys"),
//!         Arc::new(BindToolsTransport::new("dig", "nsupdate", Duration::from_secs(30))),
//!     );
//!
//!     let config = keyring.zone_config("update-key").unwrap();
//!     let key = keyring.key("update-key").unwrap();
//!     let zone = orchestrator.list_records(&config, "example.com", &key).await?;
//!     println!("{} records", zone.records.len());
//!     Ok(())
//! }
//! ```
//!
//! ## As a Binary
//!
//! ```bash
//! TSIG_KEYRING=/etc/bind/zonekeeper.keys zonekeeper
//! ```

pub mod config;
pub mod conflict;
pub mod formatter;
pub mod keyfile;
pub mod keyring;
pub mod metrics;
pub mod middleware;
pub mod orchestrator;
pub mod record;
pub mod records;
pub mod transfer_parser;
pub mod transport;
pub mod tsig;
pub mod types;
pub mod validator;

// Re-export commonly used types

// Data model
pub use record::{Change, DnsRecord, PendingChange, RecordType, RecordValue, SoaValue, ValidationResult};
pub use tsig::{TsigAlgorithm, TsigKey, ZoneConfig};

// Engine
pub use conflict::{validate_batch, ConflictDetector};
pub use formatter::{format_record, FormatError, RecordData};
pub use keyfile::{KeyFile, KeyFileError, KeyFileManager};
pub use orchestrator::{EngineError, ZoneOrchestrator};
pub use transfer_parser::{parse_records, parse_soa, ParseWarning};
pub use transport::{BindToolsTransport, TransportError, ZoneTransport};
pub use validator::validate_record;

// Error types
pub use types::{ApiError, AppState, ErrorResponse};

#[cfg(test)]
mod keyfile_test;
#[cfg(test)]
mod metrics_test;
#[cfg(test)]
mod middleware_test;
#[cfg(test)]
mod records_test;
#[cfg(test)]
mod types_test;
