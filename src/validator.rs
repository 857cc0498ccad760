// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record validation
//!
//! [`validate_record`] checks a single record against the syntax rules of its
//! type and reports every problem it finds, not just the first one. It never
//! rewrites the record; see [`crate::formatter`] for that.

use std::net::Ipv6Addr;

use crate::formatter::{self, CaaTag};
use crate::record::{DnsRecord, RecordType, RecordValue, SoaValue, ValidationResult, MAX_TTL};

/// Longest textual domain name (RFC 1035, without the trailing dot)
pub const MAX_NAME_LENGTH: usize = 253;

/// Longest single label
pub const MAX_LABEL_LENGTH: usize = 63;

/// Longest TXT character-string
pub const MAX_TXT_SEGMENT: usize = 255;

/// Record types accepted for updates
pub const SUPPORTED_TYPES: &[&str] = &[
    "A", "AAAA", "CNAME", "MX", "TXT", "SRV", "NS", "PTR", "CAA", "SOA", "SSHFP",
];

/// Validate one record destined for `zone`
pub fn validate_record(record: &DnsRecord, zone: &str) -> ValidationResult {
    let mut errors = Vec::new();

    validate_name(&record.name, zone, &mut errors);

    let rt = &record.record_type;
    let value = &record.value;
    match rt {
        RecordType::A => validate_a(value, &mut errors),
        RecordType::AAAA => validate_aaaa(value, &mut errors),
        RecordType::CNAME | RecordType::NS | RecordType::PTR => {
            validate_target_value(rt, value, &mut errors)
        }
        RecordType::MX => validate_mx(value, &mut errors),
        RecordType::TXT => validate_txt(value, &mut errors),
        RecordType::SRV => validate_srv(value, &mut errors),
        RecordType::CAA => validate_caa(value, &mut errors),
        RecordType::SSHFP => validate_sshfp(value, &mut errors),
        RecordType::SOA => validate_soa(value, &mut errors),
        RecordType::Other(other) => errors.push(format!(
            "Unsupported record type: {}. Supported types: {}",
            other,
            SUPPORTED_TYPES.join(", ")
        )),
    }

    validate_ttl(record.ttl, &mut errors);

    ValidationResult::from_errors(errors)
}

/// Hostname grammar: dot-separated labels of letters, digits and hyphens,
/// 1-63 characters each, not starting or ending with a hyphen, at most 253
/// characters in total. One trailing dot is allowed.
pub fn is_valid_hostname(name: &str) -> bool {
    labels_valid(name, false)
}

/// Owner names additionally allow a leading `*` wildcard label and
/// underscore-prefixed service labels (`_sip._tcp`).
pub fn is_valid_owner_name(name: &str) -> bool {
    labels_valid(name, true)
}

fn labels_valid(name: &str, owner: bool) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_NAME_LENGTH {
        return false;
    }

    name.split('.').enumerate().all(|(i, label)| {
        if owner && i == 0 && label == "*" {
            return true;
        }
        let label = if owner {
            label.strip_prefix('_').unwrap_or(label)
        } else {
            label
        };
        !label.is_empty()
            && label.len() <= MAX_LABEL_LENGTH
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

fn validate_name(name: &str, zone: &str, errors: &mut Vec<String>) {
    let name = name.trim();
    if name.is_empty() || name == "@" {
        return;
    }

    if !is_valid_owner_name(name) {
        errors.push(format!("Invalid record name: {}", name));
        return;
    }

    // Absolute names must not escape the zone
    if name.ends_with('.') && !zone.is_empty() && !formatter::in_zone(name, zone) {
        errors.push(format!(
            "Record name {} is outside zone {}",
            name,
            formatter::absolute(zone)
        ));
    }
}

fn validate_ttl(ttl: u32, errors: &mut Vec<String>) {
    if ttl > MAX_TTL {
        errors.push(format!("TTL {} exceeds the maximum of {}", ttl, MAX_TTL));
    }
}

/// Text of a value that must be a plain string
fn expect_text<'a>(rt: &RecordType, value: &'a RecordValue, errors: &mut Vec<String>) -> Option<&'a str> {
    match value {
        RecordValue::Text(text) => Some(text.trim()),
        _ => {
            errors.push(format!("{} record value must be a string", rt));
            None
        }
    }
}

/// Run a numeric range check, recording its error if any
fn check_number(
    rt: &RecordType,
    field: &'static str,
    token: &str,
    min: u64,
    max: u64,
    errors: &mut Vec<String>,
) {
    if let Err(e) = formatter::parse_number(rt, field, token, min, max) {
        errors.push(e.to_string());
    }
}

fn check_target(rt: &RecordType, target: &str, errors: &mut Vec<String>) {
    if !is_valid_hostname(target) {
        errors.push(format!("Invalid {} target hostname: {}", rt, target));
    }
}

fn validate_a(value: &RecordValue, errors: &mut Vec<String>) {
    if let Some(text) = expect_text(&RecordType::A, value, errors) {
        if formatter::parse_ipv4(text).is_none() {
            errors.push(format!("Invalid IPv4 address: {}", text));
        }
    }
}

fn validate_aaaa(value: &RecordValue, errors: &mut Vec<String>) {
    if let Some(text) = expect_text(&RecordType::AAAA, value, errors) {
        if text.parse::<Ipv6Addr>().is_err() {
            errors.push(format!("Invalid IPv6 address: {}", text));
        }
    }
}

fn validate_target_value(rt: &RecordType, value: &RecordValue, errors: &mut Vec<String>) {
    if let Some(text) = expect_text(rt, value, errors) {
        check_target(rt, text, errors);
    }
}

fn validate_mx(value: &RecordValue, errors: &mut Vec<String>) {
    let mx = &RecordType::MX;
    match value {
        RecordValue::Mx(structured) => check_target(mx, structured.target.trim(), errors),
        _ => {
            let Some(text) = expect_text(mx, value, errors) else {
                return;
            };
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() != 2 {
                errors.push(format!(
                    "MX value must be 'priority target', got: {}",
                    text
                ));
                return;
            }
            check_number(mx, "priority", fields[0], 0, 65535, errors);
            check_target(mx, fields[1], errors);
        }
    }
}

fn validate_srv(value: &RecordValue, errors: &mut Vec<String>) {
    let srv = &RecordType::SRV;
    let (numbers, target): (Vec<(&'static str, String)>, String) = match value {
        // Structured numbers are range-checked by their u16 type
        RecordValue::Srv(structured) => (Vec::new(), structured.target.trim().to_string()),
        _ => {
            let Some(text) = expect_text(srv, value, errors) else {
                return;
            };
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() != 4 {
                errors.push(format!(
                    "SRV value must be 'priority weight port target', got: {}",
                    text
                ));
                return;
            }
            (
                vec![
                    ("priority", fields[0].to_string()),
                    ("weight", fields[1].to_string()),
                    ("port", fields[2].to_string()),
                ],
                fields[3].to_string(),
            )
        }
    };

    for (field, token) in &numbers {
        check_number(srv, field, token, 0, 65535, errors);
    }

    // "." means the service is decidedly not available
    if target != "." {
        check_target(srv, &target, errors);
    }
}

fn validate_txt(value: &RecordValue, errors: &mut Vec<String>) {
    let segments: Vec<String> = match value {
        RecordValue::Strings(parts) => parts.clone(),
        RecordValue::Text(text) => txt_segments(text),
        _ => {
            errors.push("TXT record value must be a string or a list of strings".to_string());
            return;
        }
    };

    for (i, segment) in segments.iter().enumerate() {
        if let Some(c) = segment.chars().find(|c| !(' '..='~').contains(c)) {
            errors.push(format!(
                "TXT segment {} contains a non-printable or non-ASCII character: {:?}",
                i + 1,
                c
            ));
        }
        if segment.len() > MAX_TXT_SEGMENT {
            errors.push(format!(
                "TXT segment {} is {} characters long (maximum {})",
                i + 1,
                segment.len(),
                MAX_TXT_SEGMENT
            ));
        }
    }
}

/// Split TXT text into its quoted character-strings, or treat it as one
fn txt_segments(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if !trimmed.starts_with('"') {
        return vec![trimmed.to_string()];
    }

    let mut segments = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;
    for c in trimmed.chars() {
        match c {
            _ if escaped => {
                escaped = false;
                current.push(c);
            }
            '\\' if in_quotes => escaped = true,
            '"' if in_quotes => {
                in_quotes = false;
                segments.push(std::mem::take(&mut current));
            }
            '"' => in_quotes = true,
            _ if in_quotes => current.push(c),
            _ => {}
        }
    }
    if in_quotes {
        segments.push(current);
    }
    segments
}

fn validate_caa(value: &RecordValue, errors: &mut Vec<String>) {
    let caa = &RecordType::CAA;
    let Some(text) = expect_text(caa, value, errors) else {
        return;
    };
    let fields = formatter::split_caa(text);
    if fields.len() != 3 {
        errors.push(format!("CAA value must be 'flags tag value', got: {}", text));
        return;
    }
    check_number(caa, "flags", fields[0], 0, 255, errors);
    if CaaTag::parse(fields[1]).is_none() {
        errors.push(format!(
            "Invalid CAA tag '{}': expected issue, issuewild or iodef",
            fields[1]
        ));
    }
}

fn validate_sshfp(value: &RecordValue, errors: &mut Vec<String>) {
    let sshfp = &RecordType::SSHFP;
    let Some(text) = expect_text(sshfp, value, errors) else {
        return;
    };
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != 3 {
        errors.push(format!(
            "SSHFP value must be 'algorithm fptype fingerprint', got: {}",
            text
        ));
        return;
    }
    check_number(sshfp, "algorithm", fields[0], 1, 4, errors);
    check_number(sshfp, "fingerprint type", fields[1], 1, 2, errors);

    let fingerprint = fields[2];
    if !fingerprint.chars().all(|c| c.is_ascii_hexdigit()) {
        errors.push(format!(
            "Invalid SSHFP fingerprint '{}': expected hexadecimal",
            fingerprint
        ));
        return;
    }
    // SHA-1 and SHA-256 digests
    let expected_len = match fields[1] {
        "1" => Some(40),
        "2" => Some(64),
        _ => None,
    };
    if let Some(len) = expected_len {
        if fingerprint.len() != len {
            errors.push(format!(
                "SSHFP fingerprint has {} hex digits, expected {} for type {}",
                fingerprint.len(),
                len,
                fields[1]
            ));
        }
    }
}

fn validate_soa(value: &RecordValue, errors: &mut Vec<String>) {
    match value {
        RecordValue::Soa(soa) => validate_soa_names(soa, errors),
        RecordValue::Text(text) => {
            let cleaned = text.replace(['(', ')'], " ");
            let fields: Vec<&str> = cleaned.split_whitespace().collect();
            if fields.len() != 7 {
                errors.push(format!(
                    "SOA value must contain mname, rname, serial, refresh, retry, expire and minimum, got: {}",
                    text.trim()
                ));
                return;
            }
            for (name, field) in ["mname", "rname"].iter().zip(&fields[..2]) {
                if !is_valid_hostname(field) {
                    errors.push(format!("Invalid SOA {}: {}", name, field));
                }
            }
            let numeric = ["serial", "refresh", "retry", "expire", "minimum"];
            for (name, field) in numeric.iter().zip(&fields[2..]) {
                if field.parse::<u32>().is_err() || !field.bytes().all(|b| b.is_ascii_digit()) {
                    errors.push(format!(
                        "SOA {} must be a non-negative integer: {}",
                        name, field
                    ));
                }
            }
        }
        _ => errors.push("SOA record value must be a string or an SOA object".to_string()),
    }
}

fn validate_soa_names(soa: &SoaValue, errors: &mut Vec<String>) {
    if !is_valid_hostname(&soa.mname) {
        errors.push(format!("Invalid SOA mname: {}", soa.mname));
    }
    if !is_valid_hostname(&soa.rname) {
        errors.push(format!("Invalid SOA rname: {}", soa.rname));
    }
}
