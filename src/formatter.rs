// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record formatting
//!
//! Converts a caller-supplied [`DnsRecord`] into the exact representation used
//! in `nsupdate` scripts:
//! - names become absolute (`@` -> zone apex, relative names get the zone
//!   appended, PTR names in reverse zones get their octets reversed)
//! - values are parsed into a typed [`RecordData`] and rendered canonically
//!
//! # Examples
//!
//! ```rust
//! use zonekeeper::formatter::format_record;
//! use zonekeeper::record::{DnsRecord, RecordType};
//!
//! let record = DnsRecord::new("@", RecordType::MX, "10 mail.example.com", 3600);
//! let formatted = format_record(&record, "example.com").unwrap();
//! assert_eq!(formatted.name, "example.com.");
//! assert_eq!(formatted.value.to_text(), "10 mail.example.com.");
//! ```

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use thiserror::Error;

use crate::record::{DnsRecord, MxValue, RecordType, RecordValue, SoaValue, SrvValue};

/// Reverse-mapping suffix for IPv4 addresses
pub const IN_ADDR_ARPA: &str = "in-addr.arpa";

/// Record value formatting errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Invalid IPv4 address: {0}")]
    InvalidIpv4(String),

    #[error("Invalid IPv6 address: {0}")]
    InvalidIpv6(String),

    #[error("{record_type} value must have {expected} fields, found {found}: '{value}'")]
    FieldCount {
        record_type: RecordType,
        expected: usize,
        found: usize,
        value: String,
    },

    #[error("{record_type} {field} is not a number: '{value}'")]
    NotANumber {
        record_type: RecordType,
        field: &'static str,
        value: String,
    },

    #[error("{record_type} {field} {value} is out of range ({min}-{max})")]
    OutOfRange {
        record_type: RecordType,
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("Invalid {record_type} target: '{value}'")]
    InvalidTarget {
        record_type: RecordType,
        value: String,
    },

    #[error("Invalid CAA tag '{0}': expected issue, issuewild or iodef")]
    InvalidCaaTag(String),

    #[error("Invalid SSHFP fingerprint '{0}': expected hexadecimal")]
    InvalidFingerprint(String),

    #[error("Unsupported record type: '{0}'")]
    UnsupportedType(RecordType),

    #[error("{record_type} records do not accept a {shape} value")]
    UnexpectedShape {
        record_type: RecordType,
        shape: &'static str,
    },
}

/// CAA property tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaaTag {
    Issue,
    IssueWild,
    Iodef,
}

impl CaaTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaaTag::Issue => "issue",
            CaaTag::IssueWild => "issuewild",
            CaaTag::Iodef => "iodef",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "issue" => Some(CaaTag::Issue),
            "issuewild" => Some(CaaTag::IssueWild),
            "iodef" => Some(CaaTag::Iodef),
            _ => None,
        }
    }
}

/// Typed record data, one variant per record kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    /// Eight hex groups as written, upper-cased
    Aaaa(Vec<String>),
    Cname(String),
    Ns(String),
    Mx {
        priority: u16,
        exchange: String,
    },
    Txt(String),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
    Caa {
        flags: u8,
        tag: CaaTag,
        value: String,
    },
    Sshfp {
        algorithm: u8,
        fp_type: u8,
        fingerprint: String,
    },
    Soa(SoaValue),
    /// PTR, textual SOA and any type without dedicated rules
    Other(String),
}

impl RecordData {
    /// Parse a record value according to its type
    pub fn parse(record_type: &RecordType, value: &RecordValue) -> Result<Self, FormatError> {
        match record_type {
            RecordType::A => parse_a(&text_of(record_type, value)?),
            RecordType::AAAA => parse_aaaa(&text_of(record_type, value)?),
            RecordType::CNAME => parse_target(record_type, &text_of(record_type, value)?)
                .map(RecordData::Cname),
            RecordType::NS => {
                parse_target(record_type, &text_of(record_type, value)?).map(RecordData::Ns)
            }
            RecordType::MX => match value {
                RecordValue::Mx(mx) => parse_mx_struct(mx),
                _ => parse_mx(&text_of(record_type, value)?),
            },
            RecordType::TXT => match value {
                RecordValue::Text(text) => Ok(RecordData::Txt(text.clone())),
                RecordValue::Strings(parts) => Ok(RecordData::Txt(parts.join(" "))),
                other => Err(unexpected_shape(record_type, other)),
            },
            RecordType::SRV => match value {
                RecordValue::Srv(srv) => parse_srv_struct(srv),
                _ => parse_srv(&text_of(record_type, value)?),
            },
            RecordType::CAA => parse_caa(&text_of(record_type, value)?),
            RecordType::SSHFP => parse_sshfp(&text_of(record_type, value)?),
            RecordType::SOA => match value {
                RecordValue::Soa(soa) => Ok(RecordData::Soa(soa.clone())),
                other => Ok(RecordData::Other(other.to_text())),
            },
            RecordType::PTR | RecordType::Other(_) => Ok(RecordData::Other(value.to_text())),
        }
    }
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::A(addr) => write!(f, "{}", addr),
            RecordData::Aaaa(groups) => f.write_str(&groups.join(":")),
            RecordData::Cname(target) | RecordData::Ns(target) => f.write_str(target),
            RecordData::Mx { priority, exchange } => write!(f, "{} {}", priority, exchange),
            RecordData::Txt(text) => f.write_str(text),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RecordData::Caa { flags, tag, value } => {
                write!(f, "{} {} \"{}\"", flags, tag.as_str(), value.replace('"', "\\\""))
            }
            RecordData::Sshfp {
                algorithm,
                fp_type,
                fingerprint,
            } => write!(f, "{} {} {}", algorithm, fp_type, fingerprint),
            RecordData::Soa(soa) => write!(f, "{}", soa),
            RecordData::Other(text) => f.write_str(text),
        }
    }
}

/// Canonicalize a record's name and value for the update protocol
///
/// The input record is left untouched.
pub fn format_record(record: &DnsRecord, zone: &str) -> Result<DnsRecord, FormatError> {
    let data = RecordData::parse(&record.record_type, &record.value)?;

    Ok(DnsRecord {
        name: canonical_name(&record.name, &record.record_type, zone),
        record_type: record.record_type.clone(),
        value: RecordValue::Text(data.to_string()),
        ttl: record.ttl,
        class: record.class.clone(),
    })
}

/// Canonicalize a record name into an absolute name inside `zone`
///
/// 1. `@` (or an empty name) is the zone apex
/// 2. relative PTR names in an `in-addr.arpa` zone are written in address
///    order and get reversed (`1.2.3.4` -> `4.3.2.1.in-addr.arpa`)
/// 3. names ending in a dot are already absolute
/// 4. other names outside the zone get the zone appended
/// 5. the result always ends with a dot
pub fn canonical_name(name: &str, record_type: &RecordType, zone: &str) -> String {
    let zone = zone.trim().trim_end_matches('.');
    let name = name.trim();

    if name.is_empty() || name == "@" {
        return absolute(zone);
    }

    let mut name = name.to_string();

    // Absolute names are taken as already written in reverse order
    if *record_type == RecordType::PTR && !name.ends_with('.') && is_reverse_v4_zone(zone) {
        if let Some(reversed) = reverse_ptr_name(&name) {
            name = reversed;
        }
    }

    if name.ends_with('.') {
        return name;
    }

    if !in_zone(&name, zone) {
        name = if zone.is_empty() {
            name
        } else {
            format!("{}.{}", name, zone)
        };
    }

    absolute(&name)
}

/// Recover the forward IPv4 address order from a reverse-mapping name
///
/// `4.3.2.1.in-addr.arpa.` -> `1.2.3.4`
pub fn ptr_address(name: &str) -> String {
    let trimmed = name.trim().trim_end_matches('.');
    let octets = strip_suffix_ignore_case(trimmed, IN_ADDR_ARPA)
        .map(|s| s.trim_end_matches('.'))
        .unwrap_or(trimmed);
    octets.split('.').rev().collect::<Vec<_>>().join(".")
}

/// Whether `zone` (without trailing dot) is an IPv4 reverse zone
pub fn is_reverse_v4_zone(zone: &str) -> bool {
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    zone == IN_ADDR_ARPA || zone.ends_with(&format!(".{}", IN_ADDR_ARPA))
}

/// Whether `name` (without trailing dot) is the zone or a name below it
pub fn in_zone(name: &str, zone: &str) -> bool {
    let name = name.trim_end_matches('.').to_ascii_lowercase();
    let zone = zone.trim_end_matches('.').to_ascii_lowercase();
    zone.is_empty() || name == zone || name.ends_with(&format!(".{}", zone))
}

/// Append the trailing dot of an absolute name if missing
pub fn absolute(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Reverse the octets of a PTR owner name written in address order
///
/// Returns `None` when the labels are not all decimal octets. A name that
/// was a full address, or carried the `in-addr.arpa` suffix, gets the suffix
/// back so it is absolute under the reverse tree; shorter names stay
/// relative to the zone.
fn reverse_ptr_name(name: &str) -> Option<String> {
    let trimmed = name.trim_end_matches('.');
    let (octets, had_suffix) = match strip_suffix_ignore_case(trimmed, IN_ADDR_ARPA) {
        Some(rest) => (rest.trim_end_matches('.'), true),
        None => (trimmed, false),
    };

    let labels: Vec<&str> = octets.split('.').collect();
    if labels.is_empty() || labels.len() > 4 || !labels.iter().all(|l| is_octet(l)) {
        return None;
    }

    let reversed = labels.into_iter().rev().collect::<Vec<_>>().join(".");
    if had_suffix || reversed.split('.').count() == 4 {
        Some(format!("{}.{}", reversed, IN_ADDR_ARPA))
    } else {
        Some(reversed)
    }
}

fn strip_suffix_ignore_case<'a>(s: &'a str, suffix: &str) -> Option<&'a str> {
    if s.len() >= suffix.len() && s.is_char_boundary(s.len() - suffix.len()) {
        let (head, tail) = s.split_at(s.len() - suffix.len());
        if tail.eq_ignore_ascii_case(suffix) {
            return Some(head);
        }
    }
    None
}

fn is_octet(label: &str) -> bool {
    !label.is_empty()
        && label.len() <= 3
        && label.bytes().all(|b| b.is_ascii_digit())
        && label.parse::<u16>().map_or(false, |v| v <= 255)
}

fn text_of(record_type: &RecordType, value: &RecordValue) -> Result<String, FormatError> {
    match value {
        RecordValue::Text(text) => Ok(text.trim().to_string()),
        other => Err(unexpected_shape(record_type, other)),
    }
}

fn unexpected_shape(record_type: &RecordType, value: &RecordValue) -> FormatError {
    let shape = match value {
        RecordValue::Text(_) => "string",
        RecordValue::Strings(_) => "string list",
        RecordValue::Soa(_) => "SOA object",
        RecordValue::Mx(_) => "MX object",
        RecordValue::Srv(_) => "SRV object",
    };
    FormatError::UnexpectedShape {
        record_type: record_type.clone(),
        shape,
    }
}

/// Parse a decimal field and check it lies in `[min, max]`
pub(crate) fn parse_number(
    record_type: &RecordType,
    field: &'static str,
    token: &str,
    min: u64,
    max: u64,
) -> Result<u64, FormatError> {
    let not_a_number = || FormatError::NotANumber {
        record_type: record_type.clone(),
        field,
        value: token.to_string(),
    };

    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(not_a_number());
    }
    let value = token.parse::<u64>().map_err(|_| not_a_number())?;
    if value < min || value > max {
        return Err(FormatError::OutOfRange {
            record_type: record_type.clone(),
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

fn field_count(
    record_type: &RecordType,
    expected: usize,
    fields: &[&str],
    value: &str,
) -> Result<(), FormatError> {
    if fields.len() != expected {
        return Err(FormatError::FieldCount {
            record_type: record_type.clone(),
            expected,
            found: fields.len(),
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Four dot-separated decimal octets
pub(crate) fn parse_ipv4(text: &str) -> Option<Ipv4Addr> {
    let parts: Vec<&str> = text.split('.').collect();
    if parts.len() != 4 || !parts.iter().all(|p| is_octet(p)) {
        return None;
    }
    let octets: Vec<u8> = parts.iter().filter_map(|p| p.parse().ok()).collect();
    match octets.as_slice() {
        [a, b, c, d] => Some(Ipv4Addr::new(*a, *b, *c, *d)),
        _ => None,
    }
}

fn parse_a(text: &str) -> Result<RecordData, FormatError> {
    parse_ipv4(text)
        .map(RecordData::A)
        .ok_or_else(|| FormatError::InvalidIpv4(text.to_string()))
}

/// Expand `::` to zero groups; every written group keeps its digits
fn parse_aaaa(text: &str) -> Result<RecordData, FormatError> {
    let addr = text
        .parse::<Ipv6Addr>()
        .map_err(|_| FormatError::InvalidIpv6(text.to_string()))?;

    // An embedded IPv4 tail has no hex groups to keep
    if text.contains('.') {
        let groups = addr.segments().iter().map(|s| format!("{:X}", s)).collect();
        return Ok(RecordData::Aaaa(groups));
    }

    let written = |part: &str| -> Vec<String> {
        part.split(':')
            .filter(|group| !group.is_empty())
            .map(str::to_ascii_uppercase)
            .collect()
    };

    let groups = match text.split_once("::") {
        Some((head, tail)) => {
            let head = written(head);
            let tail = written(tail);
            let fill = 8usize.saturating_sub(head.len() + tail.len());
            head.into_iter()
                .chain(std::iter::repeat("0".to_string()).take(fill))
                .chain(tail)
                .collect()
        }
        None => written(text),
    };
    Ok(RecordData::Aaaa(groups))
}

/// A single-token name, returned with a trailing dot
fn parse_target(record_type: &RecordType, text: &str) -> Result<String, FormatError> {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return Err(FormatError::InvalidTarget {
            record_type: record_type.clone(),
            value: text.to_string(),
        });
    }
    Ok(absolute(text))
}

fn parse_mx(text: &str) -> Result<RecordData, FormatError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    field_count(&RecordType::MX, 2, &fields, text)?;
    let priority = parse_number(&RecordType::MX, "priority", fields[0], 0, 65535)?;
    Ok(RecordData::Mx {
        priority: priority as u16,
        exchange: parse_target(&RecordType::MX, fields[1])?,
    })
}

fn parse_mx_struct(mx: &MxValue) -> Result<RecordData, FormatError> {
    Ok(RecordData::Mx {
        priority: mx.priority,
        exchange: parse_target(&RecordType::MX, mx.target.trim())?,
    })
}

fn parse_srv(text: &str) -> Result<RecordData, FormatError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    field_count(&RecordType::SRV, 4, &fields, text)?;
    let srv = &RecordType::SRV;
    Ok(RecordData::Srv {
        priority: parse_number(srv, "priority", fields[0], 0, 65535)? as u16,
        weight: parse_number(srv, "weight", fields[1], 0, 65535)? as u16,
        port: parse_number(srv, "port", fields[2], 0, 65535)? as u16,
        target: parse_target(srv, fields[3])?,
    })
}

fn parse_srv_struct(srv: &SrvValue) -> Result<RecordData, FormatError> {
    Ok(RecordData::Srv {
        priority: srv.priority,
        weight: srv.weight,
        port: srv.port,
        target: parse_target(&RecordType::SRV, srv.target.trim())?,
    })
}

/// Split a CAA value into flags, tag and the (possibly spaced) value
pub(crate) fn split_caa(text: &str) -> Vec<&str> {
    let mut fields = Vec::with_capacity(3);
    let mut rest = text.trim_start();
    for _ in 0..2 {
        match rest.split_once(char::is_whitespace) {
            Some((head, tail)) => {
                fields.push(head);
                rest = tail.trim_start();
            }
            None => {
                if !rest.is_empty() {
                    fields.push(rest);
                }
                return fields;
            }
        }
    }
    if !rest.trim().is_empty() {
        fields.push(rest.trim_end());
    }
    fields
}

/// Drop one pair of surrounding quotes and undo `\"` escapes
pub(crate) fn unquote(value: &str) -> String {
    let inner = if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    };
    inner.replace("\\\"", "\"")
}

fn parse_caa(text: &str) -> Result<RecordData, FormatError> {
    let fields = split_caa(text);
    field_count(&RecordType::CAA, 3, &fields, text)?;
    let flags = parse_number(&RecordType::CAA, "flags", fields[0], 0, 255)? as u8;
    let tag = CaaTag::parse(fields[1])
        .ok_or_else(|| FormatError::InvalidCaaTag(fields[1].to_string()))?;
    Ok(RecordData::Caa {
        flags,
        tag,
        value: unquote(fields[2]),
    })
}

fn parse_sshfp(text: &str) -> Result<RecordData, FormatError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    field_count(&RecordType::SSHFP, 3, &fields, text)?;
    let algorithm = parse_number(&RecordType::SSHFP, "algorithm", fields[0], 1, 4)? as u8;
    let fp_type = parse_number(&RecordType::SSHFP, "fingerprint type", fields[1], 1, 2)? as u8;
    let fingerprint = fields[2];
    if fingerprint.is_empty() || !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(FormatError::InvalidFingerprint(fingerprint.to_string()));
    }
    Ok(RecordData::Sshfp {
        algorithm,
        fp_type,
        fingerprint: fingerprint.to_ascii_lowercase(),
    })
}
