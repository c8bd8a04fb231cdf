use crate::error::{Result, StockReconError};
use crate::schema::{columns, AgeBucket, CellValue, Table};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One `(Type, Responsibility)` line of the aged-stock pivot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryRow {
    pub stock_type: String,
    pub responsibility: String,
    pub at_or_above_150: f64,
    pub below_150: f64,
    pub grand_total: f64,
}

impl SummaryRow {
    pub fn bucket(&self, bucket: AgeBucket) -> f64 {
        match bucket {
            AgeBucket::Below150 => self.below_150,
            AgeBucket::AtOrAbove150 => self.at_or_above_150,
        }
    }

    fn add(&mut self, bucket: AgeBucket, value: f64) {
        match bucket {
            AgeBucket::Below150 => self.below_150 += value,
            AgeBucket::AtOrAbove150 => self.at_or_above_150 += value,
        }
        self.grand_total += value;
    }
}

/// Cross-tabulation of `Value Unrestricted` by category and age bucket, with
/// grand-total margins.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    /// Ordered by `(Type, Responsibility)`.
    pub rows: Vec<SummaryRow>,
    /// Column-wise sums of `rows`.
    pub grand_total: SummaryRow,
}

impl Summary {
    pub fn row(&self, stock_type: &str, responsibility: &str) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.stock_type == stock_type && r.responsibility == responsibility)
    }

    pub fn header() -> [&'static str; 5] {
        [
            columns::TYPE,
            columns::RESPONSIBILITY,
            AgeBucket::AtOrAbove150.age_label(),
            AgeBucket::Below150.age_label(),
            columns::GRAND_TOTAL,
        ]
    }

    /// The summary as a sheet: one line per category, then the `Grand Total` line.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(Self::header());
        for row in self.rows.iter().chain(std::iter::once(&self.grand_total)) {
            table.push_row(vec![
                CellValue::from(row.stock_type.as_str()),
                CellValue::from(row.responsibility.as_str()),
                CellValue::Number(row.at_or_above_150),
                CellValue::Number(row.below_150),
                CellValue::Number(row.grand_total),
            ])?;
        }
        Ok(table)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SummaryAggregator;

impl SummaryAggregator {
    pub fn summarize(&self, table: &Table) -> Result<Summary> {
        let idx = table.require_columns(
            "Cannot build summary",
            &[
                columns::TYPE,
                columns::RESPONSIBILITY,
                columns::AGE,
                columns::VALUE_UNRESTRICTED,
            ],
        )?;
        let (type_idx, resp_idx, age_idx, value_idx) = (idx[0], idx[1], idx[2], idx[3]);

        let mut cells: BTreeMap<(String, String), SummaryRow> = BTreeMap::new();
        let mut grand_total = SummaryRow {
            stock_type: columns::GRAND_TOTAL.to_string(),
            ..SummaryRow::default()
        };

        for row in table.rows() {
            let age = row[age_idx].to_string();
            let bucket = AgeBucket::from_age_label(&age).ok_or_else(|| {
                debug!("Unexpected '{}' label '{}'", columns::AGE, age);
                StockReconError::UnexpectedValue {
                    column: columns::AGE.to_string(),
                    value: age.clone(),
                }
            })?;
            let value = row[value_idx].as_f64_or_zero();
            let key = (row[type_idx].to_string(), row[resp_idx].to_string());

            cells
                .entry(key.clone())
                .or_insert_with(|| SummaryRow {
                    stock_type: key.0,
                    responsibility: key.1,
                    ..SummaryRow::default()
                })
                .add(bucket, value);
            grand_total.add(bucket, value);
        }

        debug!(
            "Summarized {} rows into {} categories, grand total {}",
            table.len(),
            cells.len(),
            grand_total.grand_total
        );

        Ok(Summary {
            rows: cells.into_values().collect(),
            grand_total,
        })
    }
}
