//! Reconciliation of two aged-stock summaries taken at different dates.
//!
//! Each summary sheet is reduced to long form (one value per
//! `(Type, Responsbilty, Metric)`), the two periods are outer-joined, and the
//! report is rebuilt per `Type`: a subtotal block (`Responsbilty = ""`) with one
//! line per metric, followed by the `Total` line of each responsibility.
//! Subtotal deltas are computed from the subtotal sums, never aggregated from
//! row-level deltas.

use crate::config::{DisplayConfig, ReconciliationConfig};
use crate::error::Result;
use crate::schema::{columns, AgeBucket, CellValue, Metric, Table};
use crate::summary::Summary;
use crate::utils::{format_amount, format_percent, safe_ratio, sum_present};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

type JoinKey = (String, String, Metric);

#[derive(Debug, Clone, PartialEq)]
struct LongRow {
    stock_type: String,
    responsibility: String,
    metric: Metric,
    value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub stock_type: String,
    /// Empty for the per-type subtotal lines.
    pub responsibility: String,
    pub metric: Metric,
    pub first: Option<f64>,
    pub second: Option<f64>,
    /// `second - first`; absent when either period is absent.
    pub value_change: Option<f64>,
    /// `value_change / first`, 0 when that is undefined.
    pub change_ratio: f64,
}

impl ComparisonRow {
    fn new(
        stock_type: &str,
        responsibility: &str,
        metric: Metric,
        first: Option<f64>,
        second: Option<f64>,
    ) -> Self {
        let value_change = match (first, second) {
            (Some(a), Some(b)) => Some(b - a),
            _ => None,
        };
        Self {
            stock_type: stock_type.to_string(),
            responsibility: responsibility.to_string(),
            metric,
            first,
            second,
            value_change,
            change_ratio: safe_ratio(value_change, first),
        }
    }

    pub fn is_subtotal(&self) -> bool {
        self.responsibility.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub first_label: String,
    pub second_label: String,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonReport {
    pub fn row(&self, stock_type: &str, responsibility: &str, metric: Metric) -> Option<&ComparisonRow> {
        self.rows.iter().find(|r| {
            r.stock_type == stock_type && r.responsibility == responsibility && r.metric == metric
        })
    }

    pub fn header(&self) -> Vec<String> {
        vec![
            columns::TYPE.to_string(),
            columns::RESPONSBILTY.to_string(),
            columns::METRIC.to_string(),
            self.first_label.clone(),
            self.second_label.clone(),
            columns::VALUE_CHANGE.to_string(),
            columns::CHANGE_PCT.to_string(),
        ]
    }

    /// Report with raw numbers; absent values stay empty.
    pub fn to_table(&self) -> Result<Table> {
        let mut table = Table::new(self.header());
        for row in &self.rows {
            table.push_row(vec![
                CellValue::from(row.stock_type.as_str()),
                CellValue::from(row.responsibility.as_str()),
                CellValue::from(row.metric.label()),
                CellValue::from(row.first),
                CellValue::from(row.second),
                CellValue::from(row.value_change),
                CellValue::Number(row.change_ratio),
            ])?;
        }
        Ok(table)
    }

    /// Report as displayed: amounts in crores, change as a percentage.
    pub fn to_display_table(&self, display: &DisplayConfig) -> Result<Table> {
        let mut table = Table::new(self.header());
        for row in &self.rows {
            table.push_row(vec![
                CellValue::from(row.stock_type.as_str()),
                CellValue::from(row.responsibility.as_str()),
                CellValue::from(row.metric.label()),
                CellValue::from(format_amount(row.first, display)),
                CellValue::from(format_amount(row.second, display)),
                CellValue::from(format_amount(row.value_change, display)),
                CellValue::from(format_percent(row.change_ratio, display.decimals)),
            ])?;
        }
        Ok(table)
    }
}

pub struct ComparisonEngine {
    first_label: String,
    second_label: String,
    display: DisplayConfig,
}

impl Default for ComparisonEngine {
    fn default() -> Self {
        Self::new(&ReconciliationConfig::default())
    }
}

impl ComparisonEngine {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            first_label: config.first_period_label.clone(),
            second_label: config.second_period_label.clone(),
            display: config.display.clone(),
        }
    }

    /// Compares two summary sheets. Each must still carry its trailing
    /// `Grand Total` line, which is dropped by position.
    pub fn compare(&self, summary_a: &Table, summary_b: &Table) -> Result<ComparisonReport> {
        let first = to_long_form(summary_a, &self.first_label)?;
        let second = to_long_form(summary_b, &self.second_label)?;

        let joined = outer_join(&first, &second);
        debug!(
            "Joined {} + {} long rows into {} comparison rows",
            first.len(),
            second.len(),
            joined.len()
        );

        let types: BTreeSet<&str> = joined.iter().map(|r| r.stock_type.as_str()).collect();
        let mut rows = Vec::new();
        for stock_type in types {
            let type_rows: Vec<&ComparisonRow> =
                joined.iter().filter(|r| r.stock_type == stock_type).collect();
            rows.extend(type_block(stock_type, &type_rows));
        }

        // Stable, so each subtotal block keeps Total before the age buckets.
        rows.sort_by(|a, b| {
            (a.stock_type.as_str(), a.responsibility.as_str())
                .cmp(&(b.stock_type.as_str(), b.responsibility.as_str()))
        });

        info!("Comparison report built with {} rows", rows.len());

        Ok(ComparisonReport {
            first_label: self.first_label.clone(),
            second_label: self.second_label.clone(),
            rows,
        })
    }

    pub fn compare_summaries(&self, summary_a: &Summary, summary_b: &Summary) -> Result<ComparisonReport> {
        self.compare(&summary_a.to_table()?, &summary_b.to_table()?)
    }

    /// Compares and renders in one step, as written to the output sheet.
    pub fn compare_formatted(&self, summary_a: &Table, summary_b: &Table) -> Result<Table> {
        self.compare(summary_a, summary_b)?
            .to_display_table(&self.display)
    }
}

fn to_long_form(summary: &Table, period: &str) -> Result<Vec<LongRow>> {
    let mut table = summary.without_last_row();
    table.trim_column_names();
    table.rename_columns(&[
        (columns::RESPONSIBILITY, columns::RESPONSBILTY),
        (columns::GRAND_TOTAL, columns::TOTAL),
        (AgeBucket::Below150.age_label(), columns::BELOW_150_DAYS),
        (AgeBucket::AtOrAbove150.age_label(), columns::ABOVE_150_DAYS),
    ]);

    let stage = format!("Cannot read summary for '{}'", period);
    let idx = table.require_columns(
        &stage,
        &[
            columns::TYPE,
            columns::RESPONSBILTY,
            columns::TOTAL,
            columns::BELOW_150_DAYS,
            columns::ABOVE_150_DAYS,
        ],
    )?;
    let (type_idx, resp_idx) = (idx[0], idx[1]);

    let mut long = Vec::with_capacity(table.len() * Metric::ALL.len());
    for metric in Metric::ALL {
        let value_idx = match metric {
            Metric::Total => idx[2],
            Metric::Below150Days => idx[3],
            Metric::AtOrAbove150Days => idx[4],
        };
        for row in table.rows() {
            long.push(LongRow {
                stock_type: row[type_idx].to_string(),
                responsibility: row[resp_idx].to_string(),
                metric,
                value: row[value_idx].as_f64(),
            });
        }
    }
    Ok(long)
}

/// Full outer join on `(Type, Responsbilty, Metric)`, ordered by key. Keys
/// repeated within one period pair up as a cross product; a key present in
/// only one period leaves the other side absent.
fn outer_join(first: &[LongRow], second: &[LongRow]) -> Vec<ComparisonRow> {
    fn index(rows: &[LongRow]) -> BTreeMap<JoinKey, Vec<Option<f64>>> {
        let mut map: BTreeMap<JoinKey, Vec<Option<f64>>> = BTreeMap::new();
        for r in rows {
            map.entry((r.stock_type.clone(), r.responsibility.clone(), r.metric))
                .or_default()
                .push(r.value);
        }
        map
    }

    let left = index(first);
    let right = index(second);
    let keys: BTreeSet<&JoinKey> = left.keys().chain(right.keys()).collect();

    let mut joined = Vec::new();
    for key in keys {
        let (stock_type, responsibility, metric) = key;
        match (left.get(key), right.get(key)) {
            (Some(a_values), Some(b_values)) => {
                for &a in a_values {
                    for &b in b_values {
                        joined.push(ComparisonRow::new(stock_type, responsibility, *metric, a, b));
                    }
                }
            }
            (Some(a_values), None) => {
                for &a in a_values {
                    joined.push(ComparisonRow::new(stock_type, responsibility, *metric, a, None));
                }
            }
            (None, Some(b_values)) => {
                for &b in b_values {
                    joined.push(ComparisonRow::new(stock_type, responsibility, *metric, None, b));
                }
            }
            (None, None) => {}
        }
    }
    joined
}

/// Subtotal lines for one type, then its responsibility `Total` lines.
fn type_block(stock_type: &str, type_rows: &[&ComparisonRow]) -> Vec<ComparisonRow> {
    let mut block = Vec::new();

    let subtotal = |metric: Metric| -> Option<ComparisonRow> {
        let rows: Vec<&&ComparisonRow> = type_rows.iter().filter(|r| r.metric == metric).collect();
        if rows.is_empty() {
            return None;
        }
        Some(ComparisonRow::new(
            stock_type,
            "",
            metric,
            Some(sum_present(rows.iter().map(|r| r.first))),
            Some(sum_present(rows.iter().map(|r| r.second))),
        ))
    };

    block.extend(subtotal(Metric::Total));
    block.extend(subtotal(Metric::Below150Days));
    block.extend(subtotal(Metric::AtOrAbove150Days));

    let mut seen: HashSet<&str> = HashSet::new();
    for row in type_rows.iter().filter(|r| r.metric == Metric::Total) {
        if seen.insert(row.responsibility.as_str()) {
            block.push((*row).clone());
        }
    }

    block
}
