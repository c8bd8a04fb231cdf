//! CSV boundary for stock and summary sheets.
//!
//! Sheets exported from the ERP carry a title line above the real header, so
//! the header row index is configurable. Header names are trimmed; cells are
//! kept as text (numeric interpretation happens in the stages that need it).

use crate::error::{Result, StockReconError};
use crate::schema::{CellValue, Table};
use log::debug;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

/// Reads a table whose header is the record at `header_row` (0-based).
/// Records above the header are skipped. Short rows are padded with empty
/// cells; a file without a header row yields an empty table.
pub fn read_table<R: Read>(reader: R, header_row: usize) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = reader.records().skip(header_row);

    let headers: Vec<String> = match records.next() {
        Some(record) => record?.iter().map(|h| h.trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers);
    let width = table.columns().len();

    for (row_idx, record) in records.enumerate() {
        let record = record?;
        if record.len() > width {
            return Err(StockReconError::RaggedRow {
                row: row_idx,
                expected: width,
                found: record.len(),
            });
        }

        let mut row: Vec<CellValue> = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(field.to_string())
                }
            })
            .collect();
        row.resize(width, CellValue::Empty);
        table.push_row(row)?;
    }

    debug!(
        "Read table with {} columns and {} rows (header at row {})",
        width,
        table.len(),
        header_row
    );

    Ok(table)
}

pub fn read_table_from_path<P: AsRef<Path>>(path: P, header_row: usize) -> Result<Table> {
    let file = File::open(path)?;
    read_table(file, header_row)
}

pub fn write_table<W: Write>(writer: W, table: &Table) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(table.columns())?;
    for row in table.rows() {
        writer.write_record(row.iter().map(|cell| cell.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_table_to_path<P: AsRef<Path>>(path: P, table: &Table) -> Result<()> {
    let file = File::create(path)?;
    write_table(file, table)
}

pub fn table_to_csv_string(table: &Table) -> Result<String> {
    let mut buffer = Vec::new();
    write_table(&mut buffer, table)?;
    String::from_utf8(buffer)
        .map_err(|e| StockReconError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
