//! CSV input
//!
//! Reads the operator's declared records from a CSV file with `FQDN` and
//! `IPv4` columns. Bad rows are collected as [`RejectedRow`]s and the run
//! carries on; only file-level problems (unreadable file, missing column) are
//! errors.

use serde::Serialize;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{DesiredState, Fqdn, Record};
use crate::validate;

/// Header of the name column
pub const FQDN_COLUMN: &str = "FQDN";

/// Header of the address column
pub const IPV4_COLUMN: &str = "IPv4";

/// A row excluded from the desired state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// 1-based file line (the header is line 1)
    pub line: u64,
    /// The row as read, fields joined with commas
    pub raw: String,
    /// Why the row was rejected
    pub reason: String,
}

/// Result of reading an input file
#[derive(Debug, Clone, Default)]
pub struct ParsedInput {
    /// Valid records, in file order
    pub records: Vec<Record>,
    /// Rows that were skipped
    pub rejected: Vec<RejectedRow>,
}

impl ParsedInput {
    /// Build the desired state
    ///
    /// An input without a single valid record is refused: planning against it
    /// would delete every record in the zone.
    pub fn into_desired(self) -> Result<DesiredState> {
        if self.records.is_empty() {
            return Err(Error::input(format!(
                "no valid records in input ({} rows rejected)",
                self.rejected.len()
            )));
        }
        DesiredState::from_records(self.records)
    }
}

/// Read and validate a CSV file
pub fn parse_file(path: &Path) -> Result<ParsedInput> {
    let file = std::fs::File::open(path)
        .map_err(|e| Error::input(format!("cannot open {}: {}", path.display(), e)))?;
    let parsed = parse_reader(file)?;
    info!(
        "Parsed {} records from {} ({} rejected)",
        parsed.records.len(),
        path.display(),
        parsed.rejected.len()
    );
    Ok(parsed)
}

/// Read and validate CSV data from any reader
pub fn parse_reader<R: Read>(reader: R) -> Result<ParsedInput> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::input(format!("missing required column '{}'", name)))
    };
    let fqdn_col = column(FQDN_COLUMN)?;
    let ip_col = column(IPV4_COLUMN)?;

    let mut parsed = ParsedInput::default();
    let mut first_seen: HashMap<Fqdn, u64> = HashMap::new();

    for (index, row) in csv.records().enumerate() {
        let fallback_line = index as u64 + 2;
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                let line = e.position().map_or(fallback_line, |p| p.line());
                reject(&mut parsed, line, String::new(), e.to_string());
                continue;
            }
        };

        let line = row.position().map_or(fallback_line, |p| p.line());
        let raw = row.iter().collect::<Vec<_>>().join(",");

        let record = match parse_row(row.get(fqdn_col), row.get(ip_col)) {
            Ok(record) => record,
            Err(reason) => {
                reject(&mut parsed, line, raw, reason);
                continue;
            }
        };

        if let Some(first) = first_seen.get(&record.fqdn) {
            let reason = format!("duplicate FQDN (first seen on line {})", first);
            reject(&mut parsed, line, raw, reason);
            continue;
        }

        first_seen.insert(record.fqdn.clone(), line);
        parsed.records.push(record);
    }

    Ok(parsed)
}

fn parse_row(fqdn: Option<&str>, ip: Option<&str>) -> std::result::Result<Record, String> {
    let fqdn = fqdn.ok_or_else(|| format!("missing {} field", FQDN_COLUMN))?;
    let ip = ip.ok_or_else(|| format!("missing {} field", IPV4_COLUMN))?;

    let fqdn = Fqdn::parse(fqdn).map_err(|e| match e {
        Error::Input(reason) => reason,
        other => other.to_string(),
    })?;
    let ip = validate::validate_ipv4(ip)?;

    Ok(Record::new(fqdn, ip))
}

fn reject(parsed: &mut ParsedInput, line: u64, raw: String, reason: String) {
    warn!("Skipping line {}: {}", line, reason);
    parsed.rejected.push(RejectedRow { line, raw, reason });
}
