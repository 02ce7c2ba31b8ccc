//! Expense ingestion
//!
//! Raw expense records arrive with loosely typed fields: amounts as numbers or
//! formatted strings, dates as ISO strings, US dates or epoch milliseconds.
//! Everything is coerced here, once, into strictly typed values so the
//! detector never sees a string amount.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{DataSource, NewTransaction, TransactionRecord};

/// Supported import file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Csv,
    Json,
}

impl ImportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// Guess the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        ext.parse().ok()
    }
}

impl std::str::FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown import format: {}", s)),
        }
    }
}

/// An amount as supplied by the caller
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Number(f64),
    Text(String),
}

/// A date as supplied by the caller
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    /// Milliseconds since the Unix epoch
    EpochMillis(i64),
    Text(String),
}

/// An expense before coercion
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub amount: Option<RawAmount>,
    pub date: RawDate,
    #[serde(default, alias = "merchant_name")]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl RawTransaction {
    /// Coerce into the shape the detector consumes
    pub fn to_record(&self) -> Result<TransactionRecord> {
        Ok(TransactionRecord {
            id: self.id,
            amount: coerce_amount(self.amount.as_ref()),
            date: parse_date(&self.date)?,
            merchant_name: clean(self.merchant_name.as_deref()),
            title: clean(self.title.as_deref()),
            category: clean(self.category.as_deref()),
        })
    }

    /// Coerce into a storable expense with a deduplication hash.
    ///
    /// A non-zero `id` from the caller is folded into the hash so distinct
    /// charges with identical content stay distinct.
    pub fn to_new_transaction(&self, source: DataSource) -> Result<NewTransaction> {
        let date = parse_date(&self.date)?;
        let amount = coerce_amount(self.amount.as_ref());
        let merchant_name = clean(self.merchant_name.as_deref());
        let title = clean(self.title.as_deref())
            .or_else(|| merchant_name.clone())
            .ok_or_else(|| Error::Import("Missing title and merchant name".into()))?;
        let reference = (self.id != 0).then(|| format!("id:{}", self.id));
        let import_hash = generate_hash(
            &date,
            &title,
            merchant_name.as_deref(),
            amount,
            reference.as_deref(),
        );

        Ok(NewTransaction {
            date,
            title,
            merchant_name,
            category: clean(self.category.as_deref()),
            amount,
            data_source: source,
            import_hash,
        })
    }
}

/// Expenses parsed from a file, with the records that had to be skipped
#[derive(Debug, Default)]
pub struct ParsedImport {
    pub transactions: Vec<NewTransaction>,
    pub skipped: usize,
    pub errors: Vec<String>,
    /// How often each content hash has been seen so far in this file
    seen: HashMap<String, usize>,
}

impl ParsedImport {
    fn push(&mut self, row: usize, result: Result<NewTransaction>) {
        match result {
            Ok(tx) => {
                let tx = self.disambiguate(tx);
                self.transactions.push(tx);
            }
            Err(e) => self.skip(row, e.to_string()),
        }
    }

    /// Repeated identical rows are separate charges: the second and later
    /// copies get their position among the repeats folded into the hash, so
    /// re-importing the same file still maps each row onto the same hash
    fn disambiguate(&mut self, mut tx: NewTransaction) -> NewTransaction {
        let count = self.seen.entry(tx.import_hash.clone()).or_insert(0);
        let occurrence = *count;
        *count += 1;

        if occurrence > 0 {
            let reference = format!("{}#{}", tx.import_hash, occurrence);
            tx.import_hash = generate_hash(
                &tx.date,
                &tx.title,
                tx.merchant_name.as_deref(),
                tx.amount,
                Some(&reference),
            );
        }
        tx
    }

    fn skip(&mut self, row: usize, reason: String) {
        warn!("Skipping record {}: {}", row, reason);
        self.skipped += 1;
        self.errors.push(format!("record {}: {}", row, reason));
    }
}

/// Parse an import file in the given format
pub fn parse<R: Read>(reader: R, format: ImportFormat, source: DataSource) -> Result<ParsedImport> {
    match format {
        ImportFormat::Csv => parse_csv(reader, source),
        ImportFormat::Json => parse_json(reader, source),
    }
}

/// One CSV row; every field stays text until coercion
#[derive(Debug, Deserialize)]
struct CsvRow {
    date: Option<String>,
    title: Option<String>,
    #[serde(alias = "merchantname", alias = "merchant")]
    merchant_name: Option<String>,
    category: Option<String>,
    amount: Option<String>,
}

/// Parse a CSV export with a `date,title,merchant_name,category,amount` header
pub fn parse_csv<R: Read>(reader: R, source: DataSource) -> Result<ParsedImport> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: StringRecord = rdr.headers()?.iter().map(|h| h.to_lowercase()).collect();
    if !headers.iter().any(|h| h == "date") {
        return Err(Error::Import("CSV header has no 'date' column".into()));
    }
    rdr.set_headers(headers);

    let mut parsed = ParsedImport::default();

    for (i, result) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = i + 1;
        let csv_row = match result {
            Ok(r) => r,
            Err(e) => {
                parsed.skip(row, e.to_string());
                continue;
            }
        };

        let Some(date) = csv_row.date.filter(|d| !d.is_empty()) else {
            parsed.skip(row, "Missing date".to_string());
            continue;
        };

        let raw = RawTransaction {
            id: 0,
            amount: csv_row.amount.map(RawAmount::Text),
            date: RawDate::Text(date),
            merchant_name: csv_row.merchant_name,
            title: csv_row.title,
            category: csv_row.category,
        };
        parsed.push(row, raw.to_new_transaction(source));
    }

    debug!(
        "Parsed {} CSV records ({} skipped)",
        parsed.transactions.len(),
        parsed.skipped
    );
    Ok(parsed)
}

/// Parse a JSON array of expense objects
pub fn parse_json<R: Read>(reader: R, source: DataSource) -> Result<ParsedImport> {
    let values: Vec<Value> = serde_json::from_reader(reader)?;
    let mut parsed = ParsedImport::default();

    for (i, value) in values.into_iter().enumerate() {
        let row = i + 1;
        match serde_json::from_value::<RawTransaction>(value) {
            Ok(raw) => parsed.push(row, raw.to_new_transaction(source)),
            Err(e) => parsed.skip(row, e.to_string()),
        }
    }

    debug!(
        "Parsed {} JSON records ({} skipped)",
        parsed.transactions.len(),
        parsed.skipped
    );
    Ok(parsed)
}

/// Non-negative magnitude of an amount; anything unparseable or non-finite is 0
pub fn coerce_amount(amount: Option<&RawAmount>) -> f64 {
    let value = match amount {
        Some(RawAmount::Number(n)) => *n,
        Some(RawAmount::Text(s)) => parse_amount(s).unwrap_or(0.0),
        None => 0.0,
    };

    if value.is_finite() {
        value.abs()
    } else {
        0.0
    }
}

/// Parse an amount string, handling currency symbols, commas and
/// parenthesized negatives
pub fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = s
        .trim()
        .replace(['$', ',', ' '], "")
        .replace('(', "-")
        .replace(')', "");

    cleaned.parse::<f64>().ok()
}

/// Parse a date in any of the accepted shapes
pub fn parse_date(date: &RawDate) -> Result<NaiveDate> {
    match date {
        RawDate::EpochMillis(ms) => from_epoch_millis(*ms),
        RawDate::Text(s) => parse_date_str(s),
    }
}

fn from_epoch_millis(ms: i64) -> Result<NaiveDate> {
    DateTime::from_timestamp_millis(ms)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| Error::Validation(format!("Epoch timestamp out of range: {}", ms)))
}

fn parse_date_str(s: &str) -> Result<NaiveDate> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.date_naive());
    }

    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt.date());
    }

    let formats = [
        "%Y-%m-%d", // 2024-01-15
        "%m/%d/%y", // 01/15/24
        "%m/%d/%Y", // 01/15/2024
        "%m-%d-%Y", // 01-15-2024
        "%d/%m/%Y", // 15/01/2024 (European)
    ];

    for fmt in formats {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(date);
        }
    }

    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        if let Ok(ms) = s.parse::<i64>() {
            return from_epoch_millis(ms);
        }
    }

    Err(Error::Validation(format!("Unable to parse date: {}", s)))
}

/// Generate a unique hash for deduplication.
///
/// Every text field is length-prefixed and optional fields carry a presence
/// byte, so no two distinct field tuples feed the same bytes to the hasher.
/// `reference` distinguishes charges whose content is otherwise identical.
pub fn generate_hash(
    date: &NaiveDate,
    title: &str,
    merchant: Option<&str>,
    amount: f64,
    reference: Option<&str>,
) -> String {
    let mut hasher = Sha256::new();
    hash_field(&mut hasher, date.to_string().as_bytes());
    hash_field(&mut hasher, title.as_bytes());
    hash_optional(&mut hasher, merchant);
    hasher.update(amount.to_be_bytes());
    hash_optional(&mut hasher, reference);
    hex::encode(hasher.finalize())
}

fn hash_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

fn hash_optional(hasher: &mut Sha256, value: Option<&str>) {
    match value {
        Some(v) => {
            hasher.update([1u8]);
            hash_field(hasher, v.as_bytes());
        }
        None => hasher.update([0u8]),
    }
}

fn clean(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}
