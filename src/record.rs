// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record data model
//!
//! This module defines the records exchanged between the zone-transfer parser,
//! the formatter/validator and the HTTP layer:
//! - [`DnsRecord`]: a single resource record as seen on the wire or in a request
//! - [`RecordValue`]: a record value, either plain text or a structured object
//! - [`ValidationResult`]: an all-or-nothing list of validation problems
//! - [`PendingChange`]: one add/modify/delete operation of a change set

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Largest TTL allowed by RFC 2181 (2^31 - 1)
pub const MAX_TTL: u32 = 2_147_483_647;

/// Default TTL applied when a request omits one
pub const DEFAULT_TTL: u32 = 3600;

/// DNS record type
///
/// The types the engine knows how to format and validate have dedicated
/// variants. Anything else found in transfer output (RRSIG, DNSKEY, HINFO...)
/// is carried through as [`RecordType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    MX,
    TXT,
    SRV,
    NS,
    PTR,
    CAA,
    SOA,
    SSHFP,
    Other(String),
}

impl RecordType {
    pub fn as_str(&self) -> &str {
        match self {
            RecordType::A => "A",
            RecordType::AAAA => "AAAA",
            RecordType::CNAME => "CNAME",
            RecordType::MX => "MX",
            RecordType::TXT => "TXT",
            RecordType::SRV => "SRV",
            RecordType::NS => "NS",
            RecordType::PTR => "PTR",
            RecordType::CAA => "CAA",
            RecordType::SOA => "SOA",
            RecordType::SSHFP => "SSHFP",
            RecordType::Other(other) => other,
        }
    }

    /// Parse a type mnemonic, case-insensitively
    pub fn parse(s: &str) -> Self {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "A" => RecordType::A,
            "AAAA" => RecordType::AAAA,
            "CNAME" => RecordType::CNAME,
            "MX" => RecordType::MX,
            "TXT" => RecordType::TXT,
            "SRV" => RecordType::SRV,
            "NS" => RecordType::NS,
            "PTR" => RecordType::PTR,
            "CAA" => RecordType::CAA,
            "SOA" => RecordType::SOA,
            "SSHFP" => RecordType::SSHFP,
            _ => RecordType::Other(upper),
        }
    }

    /// Whether the engine has dedicated formatting and validation rules for this type
    pub fn is_supported(&self) -> bool {
        !matches!(self, RecordType::Other(_))
    }
}

impl FromStr for RecordType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(RecordType::parse(s))
    }
}

impl From<String> for RecordType {
    fn from(s: String) -> Self {
        RecordType::parse(&s)
    }
}

impl From<RecordType> for String {
    fn from(t: RecordType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SOA record value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SoaValue {
    /// Primary nameserver (e.g., "ns1.example.com.")
    pub mname: String,
    /// Responsible mailbox in name form (e.g., "admin.example.com.")
    pub rname: String,
    pub serial: u32,
    pub refresh: u32,
    pub retry: u32,
    pub expire: u32,
    /// Negative caching TTL
    pub minimum: u32,
}

impl fmt::Display for SoaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {} {}",
            self.mname, self.rname, self.serial, self.refresh, self.retry, self.expire, self.minimum
        )
    }
}

/// MX record value in structured form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MxValue {
    pub priority: u16,
    pub target: String,
}

/// SRV record value in structured form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SrvValue {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub target: String,
}

/// Record value as supplied by a caller or produced by the parser
///
/// Plain records carry a string. TXT records may carry a list of strings, and
/// SOA, MX and SRV records may carry a structured object instead of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordValue {
    Text(String),
    Strings(Vec<String>),
    Soa(SoaValue),
    Srv(SrvValue),
    Mx(MxValue),
}

impl RecordValue {
    /// Render the value as presentation text, space-joining any parts
    pub fn to_text(&self) -> String {
        match self {
            RecordValue::Text(text) => text.clone(),
            RecordValue::Strings(parts) => parts.join(" "),
            RecordValue::Soa(soa) => soa.to_string(),
            RecordValue::Mx(mx) => format!("{} {}", mx.priority, mx.target),
            RecordValue::Srv(srv) => {
                format!("{} {} {} {}", srv.priority, srv.weight, srv.port, srv.target)
            }
        }
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Text(s)
    }
}

impl From<SoaValue> for RecordValue {
    fn from(soa: SoaValue) -> Self {
        RecordValue::Soa(soa)
    }
}

fn default_ttl() -> u32 {
    DEFAULT_TTL
}

fn default_class() -> String {
    "IN".to_string()
}

/// A single DNS resource record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DnsRecord {
    /// Record name: relative ("www"), "@" for the apex, or absolute ("www.example.com.")
    pub name: String,

    /// Record type (e.g., "A", "AAAA", "CNAME", "MX", "TXT")
    #[serde(rename = "type")]
    #[schema(value_type = String)]
    pub record_type: RecordType,

    /// Record value: a string, a list of strings (TXT) or an SOA/MX/SRV object
    #[schema(value_type = Object)]
    pub value: RecordValue,

    /// TTL in seconds (default: 3600)
    #[serde(default = "default_ttl")]
    pub ttl: u32,

    /// Record class (default: "IN")
    #[serde(default = "default_class")]
    pub class: String,
}

impl DnsRecord {
    /// Create an IN-class record
    pub fn new(
        name: impl Into<String>,
        record_type: RecordType,
        value: impl Into<RecordValue>,
        ttl: u32,
    ) -> Self {
        Self {
            name: name.into(),
            record_type,
            value: value.into(),
            ttl,
            class: default_class(),
        }
    }
}

impl fmt::Display for DnsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {}",
            self.name,
            self.ttl,
            self.class,
            self.record_type,
            self.value.to_text()
        )
    }
}

/// Outcome of validating a record or a change set
///
/// Either valid with no errors, or invalid with at least one error. The
/// constructors are the only way to build one, and deserialization goes
/// through the same check, so the two never disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "RawValidationResult")]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<String> {
        self.errors
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawValidationResult {
    is_valid: bool,
    #[serde(default)]
    errors: Vec<String>,
}

impl TryFrom<RawValidationResult> for ValidationResult {
    type Error = String;

    fn try_from(raw: RawValidationResult) -> Result<Self, Self::Error> {
        if raw.is_valid != raw.errors.is_empty() {
            return Err(format!(
                "isValid is {} but {} error(s) were given",
                raw.is_valid,
                raw.errors.len()
            ));
        }
        Ok(Self::from_errors(raw.errors))
    }
}

/// A single operation of a change set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Change {
    Add {
        record: DnsRecord,
    },
    #[serde(rename_all = "camelCase")]
    Modify {
        original_record: DnsRecord,
        new_record: DnsRecord,
    },
    Delete {
        record: DnsRecord,
    },
}

impl Change {
    pub fn action(&self) -> &'static str {
        match self {
            Change::Add { .. } => "ADD",
            Change::Modify { .. } => "MODIFY",
            Change::Delete { .. } => "DELETE",
        }
    }

    /// The record this change leaves in the zone, if any
    pub fn resulting_record(&self) -> Option<&DnsRecord> {
        match self {
            Change::Add { record } => Some(record),
            Change::Modify { new_record, .. } => Some(new_record),
            Change::Delete { .. } => None,
        }
    }

    /// The record this change takes out of the zone, if any
    pub fn removed_record(&self) -> Option<&DnsRecord> {
        match self {
            Change::Add { .. } => None,
            Change::Modify {
                original_record, ..
            } => Some(original_record),
            Change::Delete { record } => Some(record),
        }
    }
}

/// A change bound to the zone and TSIG key it applies to
///
/// Owned by the caller; the engine only reads it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingChange {
    pub zone: String,
    pub key_id: String,
    #[serde(flatten)]
    pub change: Change,
}

impl PendingChange {
    pub fn add(zone: &str, key_id: &str, record: DnsRecord) -> Self {
        Self {
            zone: zone.to_string(),
            key_id: key_id.to_string(),
            change: Change::Add { record },
        }
    }

    pub fn modify(zone: &str, key_id: &str, original: DnsRecord, new: DnsRecord) -> Self {
        Self {
            zone: zone.to_string(),
            key_id: key_id.to_string(),
            change: Change::Modify {
                original_record: original,
                new_record: new,
            },
        }
    }

    pub fn delete(zone: &str, key_id: &str, record: DnsRecord) -> Self {
        Self {
            zone: zone.to_string(),
            key_id: key_id.to_string(),
            change: Change::Delete { record },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_result_round_trips_consistent_json() {
        let result = ValidationResult::from_errors(vec!["bad".to_string()]);
        let json = serde_json::to_string(&result).unwrap();
        assert_eq!(json, r#"{"isValid":false,"errors":["bad"]}"#);
        assert_eq!(serde_json::from_str::<ValidationResult>(&json).unwrap(), result);

        let valid: ValidationResult = serde_json::from_str(r#"{"isValid":true}"#).unwrap();
        assert_eq!(valid, ValidationResult::valid());
    }

    #[test]
    fn test_validation_result_rejects_contradictory_json() {
        let err = serde_json::from_str::<ValidationResult>(r#"{"isValid":true,"errors":["x"]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("isValid is true but 1 error(s)"));

        assert!(serde_json::from_str::<ValidationResult>(r#"{"isValid":false,"errors":[]}"#).is_err());
    }

    #[test]
    fn test_record_type_parse_is_case_insensitive() {
        assert_eq!(RecordType::parse("aaaa"), RecordType::AAAA);
        assert_eq!(RecordType::parse(" any "), RecordType::Other("ANY".to_string()));
        assert!(!RecordType::parse("").is_supported());
    }
}
