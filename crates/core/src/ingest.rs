//! Spreadsheet ingestion: turn an uploaded holdings file into a
//! [`HoldingsTable`], validating format, size, columns, and every row.

use std::collections::HashMap;

use tracing::warn;

use crate::errors::CoreError;
use crate::models::holding::{Holding, HoldingsTable};

/// Columns every upload must carry. Headers are matched after trimming
/// surrounding whitespace and lowercasing, so "  Symbol " matches.
pub const REQUIRED_COLUMNS: [&str; 4] = [
    "symbol",
    "quantity available",
    "average price",
    "previous closing price",
];

/// Optional column feeding sector analytics.
pub const SECTOR_COLUMN: &str = "sector";

/// Accepted upload formats, by file extension.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["csv", "tsv"];

/// Hard cap on upload size.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

/// Reject payloads over the upload cap.
pub(crate) fn check_upload_size(len: usize) -> Result<(), CoreError> {
    if len > MAX_UPLOAD_BYTES {
        return Err(CoreError::ValidationError(format!(
            "File exceeds the {} MB upload limit",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Parse an uploaded spreadsheet into a holdings table.
///
/// Validation, in order:
/// 1. File extension must be one of [`ACCEPTED_EXTENSIONS`] (the extension
///    also selects the delimiter: comma for .csv, tab for .tsv).
/// 2. Size capped at [`MAX_UPLOAD_BYTES`].
/// 3. All [`REQUIRED_COLUMNS`] present (case-insensitive, trimmed); a
///    violation reports exactly which columns are missing.
/// 4. Per row: non-empty symbol, quantity >= 0, average price > 0,
///    previous close >= 0, all finite. Errors name the offending row.
///
/// The optional [`SECTOR_COLUMN`] is captured when present; blank cells
/// become `None`.
pub fn parse_holdings(bytes: &[u8], filename: &str) -> Result<HoldingsTable, CoreError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(CoreError::ValidationError(format!(
            "Unsupported file type '{filename}': accepted formats are .csv and .tsv"
        )));
    }
    check_upload_size(bytes.len())?;

    let delimiter = if extension == "tsv" { b'\t' } else { b',' };
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let mut column_index: HashMap<&str, usize> = HashMap::new();
    let mut missing: Vec<String> = Vec::new();
    for required in REQUIRED_COLUMNS {
        match headers.iter().position(|h| h == required) {
            Some(idx) => {
                column_index.insert(required, idx);
            }
            None => missing.push(required.to_string()),
        }
    }
    if !missing.is_empty() {
        warn!(columns = ?missing, "upload rejected: required columns absent");
        return Err(CoreError::MissingColumns(missing));
    }
    let sector_index = headers.iter().position(|h| h == SECTOR_COLUMN);

    let mut rows = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        // 1-based, counting the header as row 1.
        let row = i + 2;

        let ticker = record
            .get(column_index[REQUIRED_COLUMNS[0]])
            .unwrap_or_default()
            .trim();
        if ticker.is_empty() {
            return Err(CoreError::ValidationError(format!(
                "Row {row}: '{}' must not be empty",
                REQUIRED_COLUMNS[0]
            )));
        }

        let quantity = parse_number(&record, column_index[REQUIRED_COLUMNS[1]], REQUIRED_COLUMNS[1], row)?;
        let average_price = parse_number(&record, column_index[REQUIRED_COLUMNS[2]], REQUIRED_COLUMNS[2], row)?;
        let previous_close = parse_number(&record, column_index[REQUIRED_COLUMNS[3]], REQUIRED_COLUMNS[3], row)?;

        if quantity < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Row {row}: '{}' must be non-negative, got {quantity}",
                REQUIRED_COLUMNS[1]
            )));
        }
        if average_price <= 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Row {row}: '{}' must be positive, got {average_price}",
                REQUIRED_COLUMNS[2]
            )));
        }
        if previous_close < 0.0 {
            return Err(CoreError::ValidationError(format!(
                "Row {row}: '{}' must be non-negative, got {previous_close}",
                REQUIRED_COLUMNS[3]
            )));
        }

        let sector = sector_index.and_then(|idx| record.get(idx));
        rows.push(Holding::new(
            ticker,
            sector,
            quantity,
            average_price,
            previous_close,
        ));
    }

    if rows.is_empty() {
        return Err(CoreError::ValidationError(
            "No holdings rows found in upload".to_string(),
        ));
    }
    Ok(HoldingsTable::new(rows))
}

/// Parse one numeric cell. Thousands separators ("1,234.50") are accepted
/// since broker exports commonly quote them.
fn parse_number(
    record: &csv::StringRecord,
    index: usize,
    column: &str,
    row: usize,
) -> Result<f64, CoreError> {
    let raw = record.get(index).unwrap_or_default().trim();
    let cleaned = raw.replace(',', "");
    let value: f64 = cleaned.parse().map_err(|_| {
        CoreError::ValidationError(format!("Row {row}: invalid number '{raw}' in '{column}'"))
    })?;
    if !value.is_finite() {
        return Err(CoreError::ValidationError(format!(
            "Row {row}: non-finite number in '{column}'"
        )));
    }
    Ok(value)
}
