//! CSV export of records
//!
//! Columns always come from a `RecordSchema`, so two shards with different
//! optional fields still produce identical headers. Absent fields are empty cells.

use serde_json::Value;
use std::io::{self, Write};
use thiserror::Error;

use crate::domain::{Record, RecordSchema};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Nothing to export: {0}")]
    Empty(String),
}

/// Render a single JSON value as a CSV cell
pub fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(other) => other.to_string(),
    }
}

/// Streaming CSV writer with a fixed column mapping
pub struct TableWriter<W: Write> {
    writer: csv::Writer<W>,
    /// `(header, field)` pairs
    columns: Vec<(String, String)>,
    rows: usize,
}

impl<W: Write> TableWriter<W> {
    /// Columns named after the schema's fields
    pub fn for_schema(writer: W, schema: &RecordSchema) -> Result<Self, ExportError> {
        let columns = schema.columns().map(|c| (c.to_string(), c.to_string())).collect();
        Self::with_columns(writer, columns)
    }

    /// Renamed subset of fields, e.g. `("saashub_url", "url")`
    pub fn projection(writer: W, columns: &[(&str, &str)]) -> Result<Self, ExportError> {
        let columns = columns
            .iter()
            .map(|(header, field)| ((*header).to_string(), (*field).to_string()))
            .collect();
        Self::with_columns(writer, columns)
    }

    fn with_columns(writer: W, columns: Vec<(String, String)>) -> Result<Self, ExportError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(columns.iter().map(|(header, _)| header))?;
        Ok(Self {
            writer,
            columns,
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &Record) -> Result<(), ExportError> {
        self.writer
            .write_record(self.columns.iter().map(|(_, field)| cell(record.get(field))))?;
        self.rows += 1;
        Ok(())
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    /// Flush and return the row count
    pub fn finish(mut self) -> Result<usize, ExportError> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Write `records` under the schema's columns
pub fn write_records<W: Write>(writer: W, schema: &RecordSchema, records: &[Record]) -> Result<(), ExportError> {
    let mut table = TableWriter::for_schema(writer, schema)?;
    for record in records {
        table.write(record)?;
    }
    table.finish()?;
    Ok(())
}

/// In-memory CSV, used by tests and the benchmark
pub fn render(schema: &RecordSchema, records: &[Record]) -> Result<String, ExportError> {
    let mut buffer = Vec::new();
    write_records(&mut buffer, schema, records)?;
    String::from_utf8(buffer).map_err(|error| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, error)))
}
