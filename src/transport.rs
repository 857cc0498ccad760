// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! External DNS tool transport
//!
//! Zone transfers and dynamic updates are performed by BIND's `dig` and
//! `nsupdate` utilities. The [`ZoneTransport`] trait hides the process
//! boundary so the orchestrator can be exercised without spawning anything;
//! [`BindToolsTransport`] is the production implementation.
//!
//! Both tools authenticate with a key file (`-k`) written by
//! [`crate::keyfile::KeyFileManager`]; the secret never appears on a command
//! line.

use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error, warn};

use crate::metrics;
use crate::record::{Change, DnsRecord, RecordType};
use crate::tsig::split_server;

/// Marker `dig` prints (with exit status 0) when the server refuses a transfer
pub const TRANSFER_FAILED_MARKER: &str = "; Transfer failed";

/// Port used when the server string has none
pub const DEFAULT_DNS_PORT: u16 = 53;

pub const DIG: &str = "dig";
pub const NSUPDATE: &str = "nsupdate";

/// External tool failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("{tool} could not be run: {message}")]
    Io { tool: &'static str, message: String },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("{tool} failed: {message}")]
    Failed { tool: &'static str, message: String },
}

/// Transfer and update operations against an authoritative server
#[async_trait]
pub trait ZoneTransport: Send + Sync {
    /// Perform an AXFR of `zone` and return the raw answer text
    async fn transfer(&self, server: &str, zone: &str, key_file: &Path)
        -> Result<String, TransportError>;

    /// Submit an `nsupdate` script as a single transaction
    async fn update(&self, server: &str, script: &str, key_file: &Path)
        -> Result<String, TransportError>;
}

/// [`ZoneTransport`] backed by the `dig` and `nsupdate` binaries
#[derive(Debug, Clone)]
pub struct BindToolsTransport {
    dig_path: PathBuf,
    nsupdate_path: PathBuf,
    timeout: Duration,
}

impl BindToolsTransport {
    pub fn new(
        dig_path: impl Into<PathBuf>,
        nsupdate_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            dig_path: dig_path.into(),
            nsupdate_path: nsupdate_path.into(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `cmd` to completion within the configured timeout
    ///
    /// The child is spawned with `kill_on_drop`, so when the timeout fires the
    /// dropped future takes the process down with it.
    async fn run(
        &self,
        tool: &'static str,
        mut cmd: Command,
        stdin: Option<&str>,
    ) -> Result<Output, TransportError> {
        let start = Instant::now();

        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

        let execution = async {
            let mut child = cmd
                .spawn()
                .with_context(|| format!("Failed to spawn {} process", tool))?;

            if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
                pipe.write_all(input.as_bytes())
                    .await
                    .with_context(|| format!("Failed to write to {} stdin", tool))?;
                pipe.flush().await.context("Failed to flush stdin")?;
            }

            let output = child
                .wait_with_output()
                .await
                .with_context(|| format!("Failed to wait for {}", tool))?;
            Ok::<_, anyhow::Error>(output)
        };

        let result = tokio::time::timeout(self.timeout, execution).await;
        let duration = start.elapsed().as_secs_f64();

        match result {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(e)) => {
                metrics::record_command(tool, false, duration);
                Err(TransportError::Io {
                    tool,
                    message: format!("{:#}", e),
                })
            }
            Err(_) => {
                metrics::record_command(tool, false, duration);
                error!("{} timed out after {:.3}s, process killed", tool, duration);
                Err(TransportError::Timeout {
                    tool,
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

#[async_trait]
impl ZoneTransport for BindToolsTransport {
    async fn transfer(
        &self,
        server: &str,
        zone: &str,
        key_file: &Path,
    ) -> Result<String, TransportError> {
        let start = Instant::now();
        let (host, port) = split_server(server);

        let mut cmd = Command::new(&self.dig_path);
        cmd.arg("-k").arg(key_file).arg(format!("@{}", host));
        if let Some(port) = port {
            cmd.arg("-p").arg(port.to_string());
        }
        cmd.arg(zone).arg("AXFR").arg("+noall").arg("+answer");

        debug!("Executing: {:?}", cmd.as_std());

        let output = self.run(DIG, cmd, None).await?;
        let duration = start.elapsed().as_secs_f64();

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() || stdout.contains(TRANSFER_FAILED_MARKER) {
            let message = parse_dig_error(&stdout, &stderr, output.status.code());
            error!("dig AXFR of {} from {} failed: {}", zone, server, message);
            metrics::record_command(DIG, false, duration);
            return Err(TransportError::Failed { tool: DIG, message });
        }

        if !stderr.trim().is_empty() {
            warn!("dig reported on stderr: {}", stderr.trim());
        }

        metrics::record_command(DIG, true, duration);
        debug!(
            "dig AXFR of {} completed in {:.3}s ({} bytes)",
            zone,
            duration,
            stdout.len()
        );

        Ok(stdout)
    }

    async fn update(
        &self,
        server: &str,
        script: &str,
        key_file: &Path,
    ) -> Result<String, TransportError> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.nsupdate_path);
        cmd.arg("-k").arg(key_file);

        debug!("Executing nsupdate against {} with script:\n{}", server, script);

        let output = self.run(NSUPDATE, cmd, Some(script)).await?;
        let duration = start.elapsed().as_secs_f64();

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = parse_nsupdate_error(&stderr);
            error!("nsupdate failed: {}", message);
            metrics::record_command(NSUPDATE, false, duration);
            return Err(TransportError::Failed {
                tool: NSUPDATE,
                message,
            });
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            warn!("nsupdate reported on stderr: {}", stderr.trim());
        }

        metrics::record_command(NSUPDATE, true, duration);
        debug!("nsupdate completed successfully in {:.3}s", duration);

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Build the `nsupdate` script for one transaction
///
/// `changes` must already be formatted (absolute names, canonical values).
/// A MODIFY deletes the exact original record and adds the new one, so the
/// whole batch lands or fails together on `send`.
///
/// ```text
/// server 10.0.0.1 53
/// zone example.com.
/// update delete www.example.com. A 192.0.2.1
/// update add www.example.com. 300 IN A 192.0.2.2
/// send
/// ```
pub fn build_update_script(server: &str, zone: &str, changes: &[Change]) -> String {
    let (host, port) = split_server(server);
    let mut script = format!(
        "server {} {}\nzone {}\n",
        host,
        port.unwrap_or(DEFAULT_DNS_PORT),
        crate::formatter::absolute(zone.trim())
    );

    for change in changes {
        match change {
            Change::Add { record } => script.push_str(&add_line(record)),
            Change::Modify {
                original_record,
                new_record,
            } => {
                script.push_str(&delete_line(original_record));
                script.push_str(&add_line(new_record));
            }
            Change::Delete { record } => script.push_str(&delete_line(record)),
        }
    }

    script.push_str("send\n");
    script
}

fn add_line(record: &DnsRecord) -> String {
    format!(
        "update add {} {} {} {} {}\n",
        single_line(&record.name),
        record.ttl,
        single_line(&record.class),
        record.record_type,
        script_value(record)
    )
}

fn delete_line(record: &DnsRecord) -> String {
    format!(
        "update delete {} {} {}\n",
        single_line(&record.name),
        record.record_type,
        script_value(record)
    )
}

/// Record value as nsupdate expects it; TXT data is quoted unless it already is
fn script_value(record: &DnsRecord) -> String {
    let value = single_line(record.value.to_text().trim());
    if record.record_type == RecordType::TXT && !value.starts_with('"') {
        format!("\"{}\"", value.replace('"', "\\\""))
    } else {
        value
    }
}

/// A line break inside a field would start a new nsupdate command
fn single_line(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

/// Summarize a failed transfer from dig's output
fn parse_dig_error(stdout: &str, stderr: &str, code: Option<i32>) -> String {
    if let Some(line) = stdout
        .lines()
        .find(|line| line.contains(TRANSFER_FAILED_MARKER))
    {
        return line.trim_start_matches(';').trim().to_string();
    }

    let stderr = stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    match code {
        Some(9) => "No reply from server".to_string(),
        Some(code) => format!("exited with status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// Parse nsupdate error messages into human-readable format
///
/// Maps common nsupdate error codes to helpful messages
fn parse_nsupdate_error(stderr: &str) -> String {
    if stderr.contains("REFUSED") {
        "Zone refused the update (check allow-update configuration)".to_string()
    } else if stderr.contains("NOTAUTH") {
        "Not authorized (check TSIG key configuration)".to_string()
    } else if stderr.contains("SERVFAIL") {
        "Server failure (check BIND9 logs)".to_string()
    } else if stderr.contains("NOTZONE") {
        "Zone not found on server".to_string()
    } else if stderr.contains("FORMERR") {
        "Format error (check record syntax)".to_string()
    } else if stderr.contains("NXDOMAIN") {
        "Domain name does not exist".to_string()
    } else if stderr.contains("YXRRSET") || stderr.contains("NXRRSET") {
        "Prerequisite failed (record set changed concurrently)".to_string()
    } else {
        stderr.trim().to_string()
    }
}
