// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Change-set conflict detection
//!
//! A change set is accepted or rejected as a whole. Validation runs in two
//! passes:
//!
//! 1. Build the picture of every name after the batch: records already in the
//!    zone (when known, see [`ConflictDetector::with_existing`]) minus the ones
//!    the batch removes, plus everything the batch adds or modifies into place.
//! 2. Check each change: single-record validation (both sides of a MODIFY),
//!    CNAME coexistence, duplicates introduced by the batch, and removal of
//!    required apex records (SOA, NS) by a DELETE or a MODIFY.
//!
//! Every problem is reported; error messages are prefixed with the 1-based
//! position and action of the change they belong to.

use std::collections::{HashMap, HashSet};
use std::net::Ipv6Addr;
use tracing::debug;

use crate::formatter::{self, format_record};
use crate::record::{Change, DnsRecord, PendingChange, RecordType, ValidationResult};
use crate::validator::validate_record;

/// Validate a batch of changes for `zone` without knowledge of the live zone
pub fn validate_batch(changes: &[PendingChange], zone: &str) -> ValidationResult {
    ConflictDetector::new(zone).validate(changes)
}

/// Normalized identity of a record: owner name, type and canonical value
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    name: String,
    record_type: RecordType,
    value: String,
}

/// Where a post-batch record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Existing,
    Change(usize),
}

#[derive(Debug)]
struct Entry {
    key: RecordKey,
    origin: Origin,
}

/// Batch validator for one zone
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    zone: String,
    existing: Vec<DnsRecord>,
}

impl ConflictDetector {
    pub fn new(zone: &str) -> Self {
        Self {
            zone: zone.trim().trim_end_matches('.').to_string(),
            existing: Vec::new(),
        }
    }

    /// Seed the detector with the records currently in the zone
    pub fn with_existing(mut self, records: impl IntoIterator<Item = DnsRecord>) -> Self {
        self.existing.extend(records);
        self
    }

    pub fn zone(&self) -> &str {
        &self.zone
    }

    /// Validate `changes` as one atomic batch
    pub fn validate(&self, changes: &[PendingChange]) -> ValidationResult {
        let by_name = self.resulting_names(changes);
        let mut errors = Vec::new();

        for (index, pending) in changes.iter().enumerate() {
            let prefix = format!("Change {} ({})", index + 1, pending.change.action());
            let mut push = |message: String| errors.push(format!("{}: {}", prefix, message));

            if !same_zone(&pending.zone, &self.zone) {
                push(format!(
                    "change is bound to zone {} but the batch targets {}",
                    pending.zone, self.zone
                ));
            }

            for (label, record) in records_to_validate(&pending.change) {
                for error in validate_record(record, &self.zone).into_errors() {
                    match label {
                        Some(label) => push(format!("{}: {}", label, error)),
                        None => push(error),
                    }
                }
            }

            match &pending.change {
                Change::Delete { record } if self.is_required_apex_record(record) => {
                    push(format!(
                        "cannot delete the {} record at the zone apex: it is a required record",
                        record.record_type
                    ));
                }
                Change::Modify {
                    original_record,
                    new_record,
                } if self.is_required_apex_record(original_record)
                    && !(new_record.record_type == original_record.record_type
                        && self.is_required_apex_record(new_record)) =>
                {
                    push(format!(
                        "cannot replace the {} record at the zone apex with a {} record at {}: it is a required record",
                        original_record.record_type,
                        new_record.record_type,
                        formatter::canonical_name(
                            &new_record.name,
                            &new_record.record_type,
                            &self.zone
                        )
                    ));
                }
                _ => {}
            }

            if let Some(record) = pending.change.resulting_record() {
                let key = self.key_of(record);
                let neighbours = by_name.get(&key.name).map(Vec::as_slice).unwrap_or(&[]);
                for message in check_neighbours(index, &key, neighbours) {
                    push(message);
                }
            }
        }

        debug!(
            "Validated {} changes for zone {}: {} errors",
            changes.len(),
            self.zone,
            errors.len()
        );

        ValidationResult::from_errors(errors)
    }

    /// Pass 1: every record that would exist after the batch, grouped by name
    fn resulting_names(&self, changes: &[PendingChange]) -> HashMap<String, Vec<Entry>> {
        let removed: HashSet<RecordKey> = changes
            .iter()
            .filter_map(|p| p.change.removed_record())
            .map(|r| self.key_of(r))
            .collect();

        let mut by_name: HashMap<String, Vec<Entry>> = HashMap::new();

        let existing = self
            .existing
            .iter()
            .map(|r| self.key_of(r))
            .filter(|key| !removed.contains(key))
            .map(|key| Entry {
                key,
                origin: Origin::Existing,
            });

        let added = changes.iter().enumerate().filter_map(|(i, p)| {
            p.change.resulting_record().map(|r| Entry {
                key: self.key_of(r),
                origin: Origin::Change(i),
            })
        });

        for entry in existing.chain(added) {
            by_name.entry(entry.key.name.clone()).or_default().push(entry);
        }

        by_name
    }

    fn key_of(&self, record: &DnsRecord) -> RecordKey {
        let name = formatter::canonical_name(&record.name, &record.record_type, &self.zone)
            .to_ascii_lowercase();

        let text = format_record(record, &self.zone)
            .map(|formatted| formatted.value.to_text())
            .unwrap_or_else(|_| record.value.to_text());
        let text = match record.record_type {
            RecordType::TXT => text.replace('"', ""),
            // Written groups differ in leading zeros; compare addresses
            RecordType::AAAA => text
                .trim()
                .parse::<Ipv6Addr>()
                .map(|addr| addr.to_string())
                .unwrap_or(text),
            _ => text,
        };
        let value = text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_lowercase();

        RecordKey {
            name,
            record_type: record.record_type.clone(),
            value,
        }
    }

    fn is_required_apex_record(&self, record: &DnsRecord) -> bool {
        if !matches!(record.record_type, RecordType::SOA | RecordType::NS) {
            return false;
        }
        let name = record.name.trim();
        name.is_empty()
            || name == "@"
            || formatter::canonical_name(name, &record.record_type, &self.zone)
                .eq_ignore_ascii_case(&formatter::absolute(&self.zone))
    }
}

fn same_zone(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('.').eq_ignore_ascii_case(b.trim().trim_end_matches('.'))
}

/// Records of a change that go through single-record validation, with the
/// label their errors are reported under
fn records_to_validate(change: &Change) -> Vec<(Option<&'static str>, &DnsRecord)> {
    match change {
        Change::Add { record } | Change::Delete { record } => vec![(None, record)],
        Change::Modify {
            original_record,
            new_record,
        } => vec![(Some("original record"), original_record), (None, new_record)],
    }
}

/// DNSSEC types that live alongside a CNAME at the same owner (RFC 2181
/// section 10.1, RFC 4035 section 2.5)
fn allowed_beside_cname(record_type: &RecordType) -> bool {
    matches!(
        record_type,
        RecordType::Other(other) if matches!(other.as_str(), "RRSIG" | "NSEC" | "NSEC3" | "KEY")
    )
}

/// Compare one resulting record against the other records at its name
///
/// Batch records are only compared with earlier changes, so each conflicting
/// pair is reported once, on the later change.
fn check_neighbours(index: usize, key: &RecordKey, neighbours: &[Entry]) -> Vec<String> {
    let mut errors = Vec::new();

    for other in neighbours {
        let label = match other.origin {
            Origin::Change(j) if j >= index => continue,
            Origin::Change(j) => format!("change {}", j + 1),
            // The live record itself, e.g. an ADD that is already applied
            Origin::Existing if other.key == *key => continue,
            Origin::Existing => "an existing record".to_string(),
        };

        let this_cname = key.record_type == RecordType::CNAME;
        let other_cname = other.key.record_type == RecordType::CNAME;
        if this_cname && other_cname {
            errors.push(format!(
                "CNAME at {} conflicts with another CNAME at the same name ({})",
                key.name, label
            ));
        } else if (this_cname && allowed_beside_cname(&other.key.record_type))
            || (other_cname && allowed_beside_cname(&key.record_type))
        {
            continue;
        } else if this_cname || other_cname {
            errors.push(format!(
                "{} record at {} cannot coexist with the {} record at the same name ({})",
                key.record_type, key.name, other.key.record_type, label
            ));
        } else if matches!(other.origin, Origin::Change(_)) && other.key == *key {
            errors.push(format!(
                "duplicate {} record {} {} ({})",
                key.record_type, key.name, key.value, label
            ));
        }
    }

    errors
}
