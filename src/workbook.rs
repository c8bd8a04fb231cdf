//! Spreadsheet boundary: the ERP export comes in as a workbook with a
//! `Total stock` sheet, and reports go out as named sheets.

use crate::error::Result;
use crate::pipeline::StockReport;
use crate::schema::{CellValue, Table};
use calamine::{open_workbook_auto, Data, Reader};
use log::debug;
use rust_xlsxwriter::{Workbook, Worksheet};
use std::path::Path;

/// Sheet holding the raw stock lines in the ERP export.
pub const STOCK_INPUT_SHEET: &str = "Total stock";

/// Sheet name of a written comparison report.
pub const COMPARISON_SHEET: &str = "Comparison";

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::from(if *b { "TRUE" } else { "FALSE" }),
        other => CellValue::Text(other.to_string()),
    }
}

/// Reads `sheet` from an xlsx/xls/ods workbook. `header_row` is the 0-based
/// sheet row holding the column names; rows above it are skipped and fully
/// empty rows below it are dropped.
pub fn read_sheet<P: AsRef<Path>>(path: P, sheet: &str, header_row: usize) -> Result<Table> {
    let mut workbook = open_workbook_auto(path.as_ref())?;
    let range = workbook.worksheet_range(sheet)?;

    // The range starts at the first used row, not necessarily row 0.
    let first_row = range.start().map(|(row, _)| row as usize).unwrap_or(0);
    let skip = header_row.saturating_sub(first_row);

    let mut rows = range.rows().skip(skip);
    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string().trim().to_string()).collect(),
        None => return Ok(Table::default()),
    };

    let mut table = Table::new(headers);
    for cells in rows {
        let record: Vec<CellValue> = cells.iter().map(cell_value).collect();
        if record.iter().all(CellValue::is_empty) {
            continue;
        }
        table.push_row(record)?;
    }

    debug!(
        "Read sheet '{}' with {} columns and {} rows (header at row {})",
        sheet,
        table.columns().len(),
        table.len(),
        header_row
    );

    Ok(table)
}

fn write_sheet(worksheet: &mut Worksheet, table: &Table) -> Result<()> {
    for (col, name) in table.columns().iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }
    for (row_idx, row) in table.rows().iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                CellValue::Number(n) if n.is_finite() => {
                    worksheet.write_number(row_num, col as u16, *n)?;
                }
                CellValue::Empty => {}
                other => {
                    worksheet.write_string(row_num, col as u16, other.to_string())?;
                }
            }
        }
    }
    Ok(())
}

/// Writes each `(sheet name, table)` pair as one worksheet, in order.
pub fn write_sheets<P: AsRef<Path>>(path: P, sheets: &[(&str, &Table)]) -> Result<()> {
    let mut workbook = Workbook::new();
    for (name, table) in sheets {
        let worksheet = workbook.add_worksheet().set_name(*name)?;
        write_sheet(worksheet, table)?;
    }
    workbook.save(path.as_ref())?;
    Ok(())
}

/// Writes the two-sheet report: the processed stock lines and their summary.
pub fn write_report<P: AsRef<Path>>(path: P, report: &StockReport) -> Result<()> {
    let summary = report.summary_table()?;
    write_sheets(
        path,
        &[
            (StockReport::TOTAL_STOCK_SHEET, &report.total_stock),
            (StockReport::SUMMARY_SHEET, &summary),
        ],
    )
}

/// Reads the `Summary` sheet of a previously written report.
pub fn read_summary_sheet<P: AsRef<Path>>(path: P) -> Result<Table> {
    read_sheet(path, StockReport::SUMMARY_SHEET, 0)
}
