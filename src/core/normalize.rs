//! Reshapes batches of schema-less model payloads into rows.
//!
//! Every export goes through [`flatten_record`]: the fixed metadata fields
//! come first, then the payload's top-level fields when the payload is an
//! object, a single `result` field for arrays and scalars, or an `error`
//! field for failed calls.

use crate::domain::model::{Batch, Outcome, ResultRecord};
use crate::utils::error::{Result, VisionEtlError};
use serde_json::{Map, Value};
use std::collections::HashSet;

pub const FIELD_FILENAME: &str = "filename";
pub const FIELD_MODEL_ID: &str = "modelId";
pub const FIELD_LATENCY: &str = "latencySeconds";
pub const FIELD_RESULT: &str = "result";
pub const FIELD_ERROR: &str = "error";

pub const FIXED_COLUMNS: [&str; 3] = ["Image Name", "Model Name", "Latency (sec)"];

/// Row-shaped view of one record; keys keep insertion order.
pub type FlattenedRecord = Map<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CsvDialect {
    /// Every cell wrapped in double quotes, embedded quotes and commas left
    /// as they are. Matches what the upload page has always exported.
    #[default]
    Raw,
    /// RFC 4180 quoting with doubled embedded quotes.
    Rfc4180,
}

/// Top-level fields a record contributes beyond the fixed metadata.
fn payload_fields(record: &ResultRecord) -> Vec<(&str, &Value)> {
    match &record.outcome {
        Outcome::Success(Value::Object(fields)) => {
            fields.iter().map(|(k, v)| (k.as_str(), v)).collect()
        }
        Outcome::Success(other) => vec![(FIELD_RESULT, other)],
        Outcome::Failure(_) => Vec::new(),
    }
}

pub fn flatten_record(record: &ResultRecord) -> FlattenedRecord {
    let mut row = Map::new();
    row.insert(FIELD_FILENAME.to_string(), Value::from(record.filename.clone()));
    row.insert(FIELD_MODEL_ID.to_string(), Value::from(record.model_id.clone()));
    row.insert(FIELD_LATENCY.to_string(), Value::from(record.latency_seconds));

    match &record.outcome {
        Outcome::Failure(message) => {
            row.insert(FIELD_ERROR.to_string(), Value::from(message.clone()));
        }
        Outcome::Success(_) => {
            // payload keys win over the metadata on collision
            for (key, value) in payload_fields(record) {
                row.insert(key.to_string(), value.clone());
            }
        }
    }
    row
}

pub fn flatten(batch: &Batch) -> Vec<FlattenedRecord> {
    batch.iter().map(flatten_record).collect()
}

fn is_fixed_field(key: &str) -> bool {
    matches!(key, FIELD_FILENAME | FIELD_MODEL_ID | FIELD_LATENCY)
}

/// Union of every non-fixed key across the flattened rows, first-seen order.
pub fn dynamic_columns(rows: &[FlattenedRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !is_fixed_field(key) && seen.insert(key.as_str()) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

/// String form of a cell: strings as-is, null as empty, nested values as
/// compact JSON.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn csv_rows(batch: &Batch) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = flatten(batch);
    let columns = dynamic_columns(&rows);

    let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
    header.extend(columns.iter().cloned());

    let body = batch
        .iter()
        .zip(&rows)
        .map(|(record, row)| {
            let mut cells = vec![
                record.filename.clone(),
                record.model_id.clone(),
                format!("{:.2}", record.latency_seconds),
            ];
            cells.extend(
                columns
                    .iter()
                    .map(|column| row.get(column).map(cell_text).unwrap_or_default()),
            );
            cells
        })
        .collect();

    (header, body)
}

/// CSV with the column union of all payloads; see [`CsvDialect::Raw`].
pub fn to_csv(batch: &Batch) -> String {
    let (header, body) = csv_rows(batch);
    std::iter::once(header)
        .chain(body)
        .map(|cells| {
            cells
                .iter()
                .map(|cell| format!("\"{}\"", cell))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn to_csv_with(batch: &Batch, dialect: CsvDialect) -> Result<String> {
    match dialect {
        CsvDialect::Raw => Ok(to_csv(batch)),
        CsvDialect::Rfc4180 => {
            let (header, body) = csv_rows(batch);
            let mut writer = csv::WriterBuilder::new()
                .quote_style(csv::QuoteStyle::Always)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(Vec::new());

            writer.write_record(&header)?;
            for row in &body {
                writer.write_record(row)?;
            }

            let bytes = writer.into_inner().map_err(|e| VisionEtlError::ExportError {
                message: format!("Failed to flush CSV writer: {}", e),
            })?;
            let text = String::from_utf8(bytes).map_err(|e| VisionEtlError::ExportError {
                message: format!("CSV output is not UTF-8: {}", e),
            })?;
            Ok(text.trim_end_matches('\n').to_string())
        }
    }
}

/// Pretty-printed JSON array of flattened records.
pub fn to_json(batch: &Batch) -> Result<String> {
    Ok(serde_json::to_string_pretty(&flatten(batch))?)
}
