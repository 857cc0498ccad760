// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone transfer output parser
//!
//! Turns the answer section printed by `dig ... AXFR` into [`DnsRecord`]s.
//! Each line has the shape:
//!
//! ```text
//! www.example.com.  3600  IN  A  192.0.2.1
//! ```
//!
//! Records keep the order of the transfer. Malformed lines are skipped and
//! reported as [`ParseWarning`]s instead of failing the whole transfer.
//!
//! # Examples
//!
//! ```rust
//! use zonekeeper::transfer_parser::parse_records;
//!
//! let records = parse_records("www.example.com. 3600 IN A 10.0.0.1\n");
//! assert_eq!(records.len(), 1);
//! assert_eq!(records[0].ttl, 3600);
//! ```

use nom::{
    branch::alt,
    bytes::complete::{take_till1, take_until},
    character::complete::{char, multispace0, multispace1},
    combinator::rest,
    sequence::{preceded, terminated},
    IResult,
};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};
use utoipa::ToSchema;

use crate::record::{DnsRecord, RecordType, RecordValue, SoaValue};

/// A transfer line that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ParseWarning {
    /// 1-based line number where the skipped record starts
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Records and warnings from one transfer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferOutput {
    pub records: Vec<DnsRecord>,
    pub warnings: Vec<ParseWarning>,
}

/// Parse transfer output, keeping only the records
pub fn parse_records(raw: &str) -> Vec<DnsRecord> {
    parse_transfer(raw).records
}

/// Parse transfer output into records plus warnings for skipped lines
pub fn parse_transfer(raw: &str) -> TransferOutput {
    let mut output = TransferOutput::default();

    for (line_no, line) in logical_lines(raw) {
        match parse_line(&line) {
            Ok(record) => output.records.push(record),
            Err(reason) => {
                warn!("Skipping transfer line {}: {}", line_no, reason);
                output.warnings.push(ParseWarning {
                    line: line_no,
                    reason,
                });
            }
        }
    }

    debug!(
        "Parsed {} records ({} skipped lines)",
        output.records.len(),
        output.warnings.len()
    );

    output
}

/// Parse one logical line: `name ttl class type value...`
fn parse_line(line: &str) -> Result<DnsRecord, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(format!(
            "expected at least 4 fields (name ttl class type), found {}",
            fields.len()
        ));
    }

    // Dropping the line keeps every emitted record's TTL meaningful
    let ttl = fields[1]
        .parse::<u32>()
        .map_err(|_| format!("invalid TTL '{}'", fields[1]))?;

    let record_type = RecordType::parse(fields[3]);
    let value_text = fields[4..].join(" ");

    let value = match record_type {
        RecordType::SOA => RecordValue::Soa(parse_soa(&value_text)),
        _ => RecordValue::Text(strip_grouping(&value_text)),
    };

    Ok(DnsRecord {
        name: fields[0].to_string(),
        record_type,
        value,
        ttl,
        class: fields[2].to_string(),
    })
}

/// Parse an SOA body: `mname rname ( serial refresh retry expire minimum )`
///
/// The parentheses may span lines and carry `;` comments. Without a
/// parenthesized group the numbers are read from the tokens after the two
/// names. Missing numbers default to 0.
///
/// ```rust
/// use zonekeeper::transfer_parser::parse_soa;
///
/// let soa = parse_soa("ns1.example.com. admin.example.com. ( 2024010100 3600 900 604800 86400 )");
/// assert_eq!(soa.serial, 2024010100);
/// assert_eq!(soa.minimum, 86400);
/// ```
pub fn parse_soa(text: &str) -> SoaValue {
    let text = strip_comments(text);

    let (mname, rname, numbers) = match soa_parts(&text) {
        Ok((_, (mname, rname, numbers))) => (mname.to_string(), rname.to_string(), numbers),
        Err(_) => {
            let mut tokens = text.split_whitespace();
            (
                tokens.next().unwrap_or_default().to_string(),
                String::new(),
                "",
            )
        }
    };

    let mut values = numbers
        .split(|c: char| c == ';' || c.is_whitespace())
        .filter(|t| !t.is_empty() && t.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|t| t.parse::<u32>().ok());

    SoaValue {
        mname,
        rname,
        serial: values.next().unwrap_or(0),
        refresh: values.next().unwrap_or(0),
        retry: values.next().unwrap_or(0),
        expire: values.next().unwrap_or(0),
        minimum: values.next().unwrap_or(0),
    }
}

/// A name token ends at whitespace, an opening parenthesis or a comment
fn name_token(input: &str) -> IResult<&str, &str> {
    take_till1(|c: char| c.is_whitespace() || c == '(' || c == ';')(input)
}

/// Split an SOA body into mname, rname and the numeric section
fn soa_parts(input: &str) -> IResult<&str, (&str, &str, &str)> {
    let (input, mname) = preceded(multispace0, name_token)(input)?;
    let (input, rname) = preceded(multispace1, name_token)(input)?;
    let (input, _) = multispace0(input)?;
    let (input, numbers) = alt((
        preceded(char('('), alt((terminated(take_until(")"), char(')')), rest))),
        rest,
    ))(input)?;
    Ok((input, (mname, rname, numbers)))
}

/// Join parenthesized continuation lines and drop comments
///
/// Returns `(line number, text)` pairs; blank and comment-only lines are
/// dropped. An open group also ends at the next line that starts a record,
/// so one stray `(` cannot swallow the rest of the transfer.
fn logical_lines(raw: &str) -> Vec<(usize, String)> {
    let mut lines = Vec::new();
    let mut pending: Option<(usize, String)> = None;
    let mut depth: i32 = 0;

    for (idx, physical) in raw.lines().enumerate() {
        if pending.is_none() && physical.trim_start().starts_with(';') {
            continue;
        }

        let text = strip_comments(physical);

        if starts_record(&text) {
            if let Some(line) = pending.take() {
                debug!("Unterminated group at line {}", line.0);
                lines.push(line);
            }
            depth = 0;
        }

        depth += paren_balance(&text);

        match pending.as_mut() {
            Some((_, buf)) => {
                buf.push(' ');
                buf.push_str(text.trim());
            }
            None => {
                if text.trim().is_empty() {
                    continue;
                }
                pending = Some((idx + 1, text.trim().to_string()));
            }
        }

        if depth <= 0 {
            depth = 0;
            if let Some(line) = pending.take() {
                lines.push(line);
            }
        }
    }

    // Unterminated group at end of input: keep what we have
    if let Some(line) = pending {
        lines.push(line);
    }

    lines
}

/// An owner name at the start of the line followed by a numeric TTL
fn starts_record(line: &str) -> bool {
    if line.starts_with(char::is_whitespace) {
        return false;
    }
    let mut tokens = line.split_whitespace();
    match (tokens.next(), tokens.next()) {
        (Some(owner), Some(ttl)) => {
            !owner.chars().all(|c| c.is_ascii_digit())
                && !owner.starts_with(['(', ')'])
                && ttl.chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

/// Remove a trailing `;` comment, ignoring semicolons inside quoted strings
fn strip_comments(text: &str) -> String {
    text.lines()
        .map(|line| {
            let mut in_quotes = false;
            let mut escaped = false;
            for (i, c) in line.char_indices() {
                match c {
                    _ if escaped => escaped = false,
                    '\\' => escaped = true,
                    '"' => in_quotes = !in_quotes,
                    ';' if !in_quotes => return &line[..i],
                    _ => {}
                }
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Net count of unquoted parentheses on a line
fn paren_balance(text: &str) -> i32 {
    let mut in_quotes = false;
    let mut escaped = false;
    let mut balance = 0;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => balance += 1,
            ')' if !in_quotes => balance -= 1,
            _ => {}
        }
    }
    balance
}

/// Remove unquoted grouping parentheses from a multi-line value
fn strip_grouping(value: &str) -> String {
    if !value.contains('(') && !value.contains(')') {
        return value.to_string();
    }

    let mut out = String::with_capacity(value.len());
    let mut in_quotes = false;
    let mut escaped = false;
    for c in value.chars() {
        match c {
            _ if escaped => {
                escaped = false;
                out.push(c);
            }
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_quotes = !in_quotes;
                out.push(c);
            }
            '(' | ')' if !in_quotes => out.push(' '),
            _ => out.push(c),
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_comments_keeps_quoted_semicolons() {
        assert_eq!(strip_comments("a \"x;y\" ; note"), "a \"x;y\" ");
        assert_eq!(strip_comments("no comment"), "no comment");
    }

    #[test]
    fn test_paren_balance() {
        assert_eq!(paren_balance("soa ( 1 2"), 1);
        assert_eq!(paren_balance("3 4 5 )"), -1);
        assert_eq!(paren_balance("\"(\" text"), 0);
    }

    #[test]
    fn test_strip_grouping() {
        assert_eq!(strip_grouping("257 3 13 ( abc def )"), "257 3 13 abc def");
        assert_eq!(strip_grouping("\"(kept)\""), "\"(kept)\"");
    }

    #[test]
    fn test_starts_record() {
        assert!(starts_record("www.example.com. 300 IN A 10.0.0.1"));
        assert!(!starts_record("   2024010100 ; serial"));
        assert!(!starts_record("1 2 3 4 5 )"));
        assert!(!starts_record("ns1.example.com. admin.example.com. ("));
    }

    #[test]
    fn test_stray_paren_does_not_swallow_following_records() {
        let raw = "bad.example.com. 300 IN TXT (unbalanced\n\
                   www.example.com. 300 IN A 10.0.0.1\n\
                   api.example.com. 300 IN A 10.0.0.2\n";
        let lines = logical_lines(raw);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], (2, "www.example.com. 300 IN A 10.0.0.1".to_string()));
        assert_eq!(lines[2].0, 3);
    }

    #[test]
    fn test_logical_lines_join_groups() {
        let raw = "a. 60 IN SOA ns. admin. (\n 1 ; serial\n 2 3 4 5 )\nb. 60 IN A 10.0.0.1\n";
        let lines = logical_lines(raw);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, 1);
        assert!(lines[0].1.contains("( 1 2 3 4 5 )"));
        assert_eq!(lines[1].0, 4);
    }
}
