// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Transfer and update orchestration
//!
//! Every operation follows the same lifecycle:
//!
//! ```text
//! Idle -> KeyMaterialized -> ProcessRunning -> {Parsed | Failed} -> CleanedUp
//! ```
//!
//! The key file is released on every path out of `KeyMaterialized`: after
//! success, after a tool failure or timeout, and (through the key file's
//! `Drop`) when the calling future is cancelled. Cleanup failures are logged
//! and never replace the operation's own result.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::conflict::ConflictDetector;
use crate::formatter::{format_record, FormatError};
use crate::keyfile::{KeyFileError, KeyFileManager};
use crate::metrics;
use crate::record::{Change, DnsRecord, PendingChange, ValidationResult};
use crate::transfer_parser::{parse_transfer, TransferOutput};
use crate::transport::{build_update_script, TransportError, ZoneTransport};
use crate::tsig::{TsigKey, ZoneConfig};

/// Engine-level failures
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    KeyFile(#[from] KeyFileError),

    /// Tool failure; the message has been redacted
    #[error("{operation} failed: {message}")]
    Process {
        operation: &'static str,
        message: String,
    },

    #[error("Change set rejected: {}", .0.errors().join("; "))]
    Rejected(ValidationResult),

    #[error(transparent)]
    Format(#[from] FormatError),
}

/// Lifecycle of one orchestrated operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Idle,
    KeyMaterialized,
    ProcessRunning,
    Parsed,
    Failed,
    CleanedUp,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Idle => "IDLE",
            OperationState::KeyMaterialized => "KEY_MATERIALIZED",
            OperationState::ProcessRunning => "PROCESS_RUNNING",
            OperationState::Parsed => "PARSED",
            OperationState::Failed => "FAILED",
            OperationState::CleanedUp => "CLEANED_UP",
        };
        f.write_str(name)
    }
}

/// Result of an applied change set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub zone: String,
    pub applied: usize,
}

/// Drives key materialization, tool invocation and parsing
#[derive(Clone)]
pub struct ZoneOrchestrator {
    key_files: KeyFileManager,
    transport: Arc<dyn ZoneTransport>,
}

impl ZoneOrchestrator {
    pub fn new(key_files: KeyFileManager, transport: Arc<dyn ZoneTransport>) -> Self {
        Self {
            key_files,
            transport,
        }
    }

    pub fn key_files(&self) -> &KeyFileManager {
        &self.key_files
    }

    /// Transfer `zone` and parse the records it contains
    pub async fn list_records(
        &self,
        config: &ZoneConfig,
        zone: &str,
        key: &TsigKey,
    ) -> Result<TransferOutput, EngineError> {
        info!("Listing records of zone {} via {}", zone, config.server);

        let transport = &self.transport;
        let raw = self
            .with_key_file("transfer", key, |path| async move {
                transport.transfer(&config.server, zone, &path).await
            })
            .await?;

        let output = parse_transfer(&raw);
        info!(
            "Zone {} returned {} records ({} warnings)",
            zone,
            output.records.len(),
            output.warnings.len()
        );
        Ok(output)
    }

    /// Validate `changes` and apply them as one transaction
    pub async fn apply_changes(
        &self,
        config: &ZoneConfig,
        zone: &str,
        key: &TsigKey,
        changes: &[PendingChange],
    ) -> Result<UpdateOutcome, EngineError> {
        self.apply_validated(ConflictDetector::new(zone), config, zone, key, changes)
            .await
    }

    /// Like [`apply_changes`](Self::apply_changes), but transfers the zone
    /// first so conflicts with live records are caught too
    pub async fn apply_changes_checked(
        &self,
        config: &ZoneConfig,
        zone: &str,
        key: &TsigKey,
        changes: &[PendingChange],
    ) -> Result<UpdateOutcome, EngineError> {
        let live = self.list_records(config, zone, key).await?;
        let detector = ConflictDetector::new(zone).with_existing(live.records);
        self.apply_validated(detector, config, zone, key, changes)
            .await
    }

    async fn apply_validated(
        &self,
        detector: ConflictDetector,
        config: &ZoneConfig,
        zone: &str,
        key: &TsigKey,
        changes: &[PendingChange],
    ) -> Result<UpdateOutcome, EngineError> {
        let verdict = detector.validate(changes);
        if !verdict.is_valid() {
            info!(
                "Rejected change set for zone {}: {} errors",
                zone,
                verdict.errors().len()
            );
            metrics::record_change_batch("rejected");
            return Err(EngineError::Rejected(verdict));
        }

        let formatted = changes
            .iter()
            .map(|pending| format_change(&pending.change, zone))
            .collect::<Result<Vec<_>, _>>()?;

        let script = build_update_script(&config.server, zone, &formatted);

        info!(
            "Applying {} changes to zone {} via {}",
            formatted.len(),
            zone,
            config.server
        );

        let transport = &self.transport;
        let script = &script;
        let result = self
            .with_key_file("update", key, |path| async move {
                transport.update(&config.server, script, &path).await
            })
            .await;

        match result {
            Ok(_) => {
                metrics::record_change_batch("applied");
                Ok(UpdateOutcome {
                    zone: zone.to_string(),
                    applied: formatted.len(),
                })
            }
            Err(e) => {
                metrics::record_change_batch("failed");
                Err(e)
            }
        }
    }

    /// Run `operation` with `key` materialized for exactly its duration
    async fn with_key_file<F, Fut>(
        &self,
        operation: &'static str,
        key: &TsigKey,
        run: F,
    ) -> Result<String, EngineError>
    where
        F: FnOnce(PathBuf) -> Fut,
        Fut: Future<Output = Result<String, TransportError>>,
    {
        log_state(operation, OperationState::Idle);

        let key_file = self.key_files.acquire(key)?;
        log_state(operation, OperationState::KeyMaterialized);

        log_state(operation, OperationState::ProcessRunning);
        let result = run(key_file.path().to_path_buf()).await;

        match &result {
            Ok(_) => log_state(operation, OperationState::Parsed),
            Err(e) => {
                log_state(operation, OperationState::Failed);
                warn!("{} failed: {}", operation, key.redact(&e.to_string()));
            }
        }

        if let Err(e) = key_file.release() {
            warn!("{}", e);
        }
        log_state(operation, OperationState::CleanedUp);

        result.map_err(|e| EngineError::Process {
            operation,
            message: key.redact(&e.to_string()),
        })
    }
}

fn log_state(operation: &str, state: OperationState) {
    debug!(operation, state = %state, "operation state");
}

/// Canonicalize one change for the update script
///
/// Both sides of a MODIFY go through the formatter. Types without dedicated
/// rules are refused, so no `update delete` line can lose its type or value.
pub fn format_change(change: &Change, zone: &str) -> Result<Change, FormatError> {
    Ok(match change {
        Change::Add { record } => Change::Add {
            record: format_supported(record, zone)?,
        },
        Change::Modify {
            original_record,
            new_record,
        } => Change::Modify {
            original_record: format_supported(original_record, zone)?,
            new_record: format_supported(new_record, zone)?,
        },
        Change::Delete { record } => Change::Delete {
            record: format_supported(record, zone)?,
        },
    })
}

fn format_supported(record: &DnsRecord, zone: &str) -> Result<DnsRecord, FormatError> {
    if !record.record_type.is_supported() {
        return Err(FormatError::UnsupportedType(record.record_type.clone()));
    }
    format_record(record, zone)
}
