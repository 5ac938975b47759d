//! Record model: names, zones, records and the two record sets being reconciled
//!
//! Names are canonicalized once, at construction, so every comparison in the
//! engine is a plain string comparison.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::collections::btree_map;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::validate;

/// A canonical fully qualified domain name (lower-case, no trailing dot)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fqdn(String);

impl Fqdn {
    /// Canonicalize and validate a name
    pub fn parse(raw: &str) -> Result<Self> {
        let canonical = validate::canonicalize(raw);
        validate::validate_fqdn(&canonical).map_err(Error::input)?;
        Ok(Self(canonical))
    }

    /// The canonical name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fqdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Fqdn {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Fqdn {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Fqdn> for String {
    fn from(value: Fqdn) -> Self {
        value.0
    }
}

/// The DNS zone a run is allowed to mutate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Zone(String);

impl Zone {
    /// Canonicalize and validate a zone name
    pub fn parse(raw: &str) -> Result<Self> {
        let canonical = validate::canonicalize(raw);
        validate::validate_zone_name(&canonical).map_err(Error::config)?;
        Ok(Self(canonical))
    }

    /// The canonical zone name
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `fqdn` is the zone apex or a name below it
    ///
    /// The match respects label boundaries: `foo.example.com` is inside
    /// `example.com`, `fooexample.com` is not.
    pub fn contains(&self, fqdn: &Fqdn) -> bool {
        let name = fqdn.as_str();
        name == self.0
            || name
                .strip_suffix(self.0.as_str())
                .is_some_and(|prefix| prefix.ends_with('.'))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Zone {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Zone {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Zone> for String {
    fn from(value: Zone) -> Self {
        value.0
    }
}

/// DNS record type managed by zonesync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 host address
    A,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordType::A => f.write_str("A"),
        }
    }
}

/// A forward host mapping
///
/// Equality compares name and address only. TTL is carried along but is not
/// part of a record's identity; see [`crate::plan::DiffPolicy`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Canonical owner name
    pub fqdn: Fqdn,
    /// Address
    pub ip: Ipv4Addr,
    /// Time-to-live; `None` means the backend default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl Record {
    /// Create a record with the backend's default TTL
    pub fn new(fqdn: Fqdn, ip: Ipv4Addr) -> Self {
        Self { fqdn, ip, ttl: None }
    }

    /// Set an explicit TTL
    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Always [`RecordType::A`]
    pub fn record_type(&self) -> RecordType {
        RecordType::A
    }

    /// TTL to send on the wire
    pub fn effective_ttl(&self, default_ttl: u32) -> u32 {
        self.ttl.unwrap_or(default_ttl)
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.fqdn == other.fqdn && self.ip == other.ip
    }
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.fqdn, self.record_type(), self.ip)
    }
}

/// The record set the operator declared, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredState {
    records: BTreeMap<Fqdn, Record>,
}

impl DesiredState {
    /// Create an empty desired state
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records, failing on a repeated name
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Result<Self> {
        let mut state = Self::new();
        for record in records {
            state.insert(record)?;
        }
        Ok(state)
    }

    /// Add a record; a second record for the same name is an input error
    pub fn insert(&mut self, record: Record) -> Result<()> {
        match self.records.entry(record.fqdn.clone()) {
            btree_map::Entry::Occupied(existing) => Err(Error::input(format!(
                "duplicate desired record for {} ({} and {})",
                record.fqdn,
                existing.get().ip,
                record.ip
            ))),
            btree_map::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    /// Look up a record by name
    pub fn get(&self, fqdn: &Fqdn) -> Option<&Record> {
        self.records.get(fqdn)
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Names in order
    pub fn names(&self) -> impl Iterator<Item = &Fqdn> {
        self.records.keys()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no records were declared
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// The in-zone records a backend reported, keyed by name
///
/// A name holding several A records is represented by its lowest address and
/// flagged, so that planning never treats it as converged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentState {
    records: BTreeMap<Fqdn, Record>,
    multi_address: BTreeSet<Fqdn>,
}

impl CurrentState {
    /// Create an empty current state
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for a name, returning the previous one
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.fqdn.clone(), record)
    }

    /// Look up a record by name
    pub fn get(&self, fqdn: &Fqdn) -> Option<&Record> {
        self.records.get(fqdn)
    }

    /// Flag `fqdn` as holding more than one address
    pub fn mark_multi_address(&mut self, fqdn: Fqdn) {
        self.multi_address.insert(fqdn);
    }

    /// Whether the backend reported several addresses for `fqdn`
    pub fn is_multi_address(&self, fqdn: &Fqdn) -> bool {
        self.multi_address.contains(fqdn)
    }

    /// Iterate in name order
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Names in order
    pub fn names(&self) -> impl Iterator<Item = &Fqdn> {
        self.records.keys()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the zone holds no managed records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
