// src/process/mod.rs
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

pub mod utils;

use utils::clean_cell;

/// How a CSV body is split into fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CsvDialect {
    /// Plain comma split, one record per line. Not quote-aware: a comma inside
    /// a quoted value splits the value, and the quotes are kept.
    #[default]
    Naive,
    /// RFC 4180 reading through the `csv` crate. Quoted fields may contain
    /// commas and line breaks; surrounding quotes are removed. Changes results
    /// for any feed that quotes its values.
    Rfc4180,
}

/// One data line of the feed, keyed by header label.
///
/// Every header of the source table has a key here; missing trailing fields
/// read as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawRow {
    fields: BTreeMap<String, String>,
}

impl RawRow {
    /// Value for `column`, or `""` when the column does not exist.
    pub fn get(&self, column: &str) -> &str {
        self.fields.get(column).map(String::as_str).unwrap_or_default()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.fields.contains_key(column)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        RawRow {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[derive(Debug, Default)]
pub struct RawTable {
    /// Column names from the header line, trimmed, in source order.
    /// Duplicates are kept here; in each `RawRow` the last one wins.
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Parse a CSV body with the default (naive) dialect.
pub fn parse(text: &str) -> Vec<RawRow> {
    parse_with(text, CsvDialect::Naive)
}

pub fn parse_with(text: &str, dialect: CsvDialect) -> Vec<RawRow> {
    parse_table(text, dialect).rows
}

/// Parse `text` into a header list and rows:
/// - Trims the whole body (and a UTF-8 BOM) before splitting.
/// - First line is the header; empty or header-only input yields zero rows.
/// - Short lines pad with `""`, long lines drop the extra fields.
/// - Naive: inner blank lines become rows of empty fields. Rfc4180 skips them.
/// - Malformed records never fail the parse.
#[tracing::instrument(level = "debug", skip(text), fields(bytes = text.len()))]
pub fn parse_table(text: &str, dialect: CsvDialect) -> RawTable {
    let body = text.trim_start_matches('\u{feff}').trim();
    if body.is_empty() {
        return RawTable::default();
    }

    let table = match dialect {
        CsvDialect::Naive => parse_naive(body),
        CsvDialect::Rfc4180 => parse_rfc4180(body),
    };

    warn_duplicate_headers(&table.headers);
    debug!(
        columns = table.headers.len(),
        rows = table.rows.len(),
        "parsed CSV body"
    );
    table
}

fn parse_naive(body: &str) -> RawTable {
    let mut lines = body.lines();
    let headers: Vec<String> = match lines.next() {
        Some(line) => line.split(',').map(clean_cell).collect(),
        None => return RawTable::default(),
    };

    // the body is already trimmed, so only inner blank lines reach here and
    // they stay as rows of empty fields
    let rows = lines
        .map(|line| {
            let values: Vec<&str> = line.split(',').collect();
            build_row(&headers, |i| values.get(i).map(|v| clean_cell(v)))
        })
        .collect();

    RawTable { headers, rows }
}

fn parse_rfc4180(body: &str) -> RawTable {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // short and long records are padded / truncated below
        .trim(Trim::All)
        .from_reader(body.as_bytes());

    let headers: Vec<String> = match rdr.headers() {
        Ok(record) => record.iter().map(clean_cell).collect(),
        Err(e) => {
            warn!(error = %e, "unreadable CSV header line");
            return RawTable::default();
        }
    };

    let mut rows = Vec::new();
    for (idx, result) in rdr.records().enumerate() {
        match result {
            Ok(record) => rows.push(build_row(&headers, |i| record.get(i).map(clean_cell))),
            Err(e) => warn!(record = idx, error = %e, "skipping malformed CSV record"),
        }
    }

    RawTable { headers, rows }
}

/// Pair each header with its field. Later duplicates overwrite earlier ones.
fn build_row(headers: &[String], field: impl Fn(usize) -> Option<String>) -> RawRow {
    let mut fields = BTreeMap::new();
    for (i, header) in headers.iter().enumerate() {
        fields.insert(header.clone(), field(i).unwrap_or_default());
    }
    RawRow { fields }
}

fn warn_duplicate_headers(headers: &[String]) {
    let mut seen = HashSet::new();
    let dupes: Vec<&str> = headers
        .iter()
        .filter(|h| !seen.insert(h.as_str()))
        .map(String::as_str)
        .collect();
    if !dupes.is_empty() {
        warn!(?dupes, "duplicate CSV headers; the last column of each name wins");
    }
}
