use crate::config::ReconciliationConfig;
use crate::error::Result;
use crate::keys::KeyBuilder;
use crate::schema::{columns, CellValue, Record, Table};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rows sharing one identity key. Only groups of two or more rows are reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub key: String,
    /// Row indices into the source table, in original order.
    pub rows: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DuplicateDetection {
    /// Rows whose key occurs exactly once, in original order.
    pub unique_rows: Vec<usize>,
    /// Groups ordered by key.
    pub groups: Vec<DuplicateGroup>,
}

impl DuplicateDetection {
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Number of rows that belong to some duplicate group (every member counts).
    pub fn duplicate_row_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }

    /// Row count a merge of the same table will produce.
    pub fn merged_row_count(&self) -> usize {
        self.unique_rows.len() + self.groups.len()
    }
}

pub struct DeduplicationEngine {
    identity_columns: Vec<String>,
    sum_columns: Vec<String>,
    separator: String,
}

impl Default for DeduplicationEngine {
    fn default() -> Self {
        Self::new(&ReconciliationConfig::default())
    }
}

impl DeduplicationEngine {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            identity_columns: config.identity_columns.clone(),
            sum_columns: config.sum_columns.clone(),
            separator: config.key_separator.clone(),
        }
    }

    pub fn detect(&self, table: &Table) -> Result<DuplicateDetection> {
        let builder = KeyBuilder::for_table(table, self.identity_columns.as_slice(), &self.separator)?;

        let mut by_key: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, key) in builder.keys(table).into_iter().enumerate() {
            by_key.entry(key).or_default().push(idx);
        }

        let mut unique_rows = Vec::new();
        let mut groups = Vec::new();
        for (key, rows) in by_key {
            if rows.len() >= 2 {
                groups.push(DuplicateGroup { key, rows });
            } else {
                unique_rows.extend(rows);
            }
        }
        unique_rows.sort_unstable();

        debug!(
            "Duplicate detection over {} rows: {} unique, {} groups covering {} rows",
            table.len(),
            unique_rows.len(),
            groups.len(),
            groups.iter().map(|g| g.rows.len()).sum::<usize>()
        );

        Ok(DuplicateDetection {
            unique_rows,
            groups,
        })
    }

    /// Every row that is part of a duplicate group, in original order, with
    /// its `Unique Item Code` appended.
    pub fn duplicate_rows(&self, table: &Table, detection: &DuplicateDetection) -> Result<Table> {
        let mut keyed: Vec<(usize, &str)> = detection
            .groups
            .iter()
            .flat_map(|g| g.rows.iter().map(move |&r| (r, g.key.as_str())))
            .collect();
        keyed.sort_unstable_by_key(|(row, _)| *row);

        let indices: Vec<usize> = keyed.iter().map(|(row, _)| *row).collect();
        let mut rows = table.select_rows(&indices);
        rows.set_column(
            columns::UNIQUE_ITEM_CODE,
            keyed.iter().map(|(_, key)| CellValue::from(*key)).collect(),
        )?;
        Ok(rows)
    }

    /// Collapses each duplicate group into one record: summed columns are
    /// added up, every other column keeps its first non-empty value.
    /// Rows with a unique key come first, unchanged, followed by one merged
    /// record per group in key order.
    pub fn merge(&self, table: &Table) -> Result<Table> {
        let required: Vec<&String> = self
            .identity_columns
            .iter()
            .chain(self.sum_columns.iter())
            .collect();
        table.require_columns("Cannot merge duplicates", required.as_slice())?;

        let mut source = table.clone();
        source.drop_column(columns::UNIQUE_ITEM_CODE);

        let detection = self.detect(&source)?;
        if detection.is_empty() {
            debug!("No duplicate groups; merge is a no-op");
            return Ok(source);
        }

        let sum_indices = source.require_columns("Cannot merge duplicates", self.sum_columns.as_slice())?;

        let mut merged = Table::new(source.columns().iter().cloned());
        for &row in &detection.unique_rows {
            merged.push_row(source.rows()[row].clone())?;
        }
        for group in &detection.groups {
            merged.push_row(aggregate_group(&source, &group.rows, &sum_indices))?;
        }

        debug!(
            "Merged {} duplicate groups; {} rows -> {} rows",
            detection.groups.len(),
            source.len(),
            merged.len()
        );

        Ok(merged)
    }
}

fn aggregate_group(table: &Table, rows: &[usize], sum_indices: &[usize]) -> Record {
    (0..table.columns().len())
        .map(|col| {
            if sum_indices.contains(&col) {
                let total: f64 = rows
                    .iter()
                    .map(|&r| table.rows()[r][col].as_f64_or_zero())
                    .sum();
                CellValue::Number(total)
            } else {
                rows.iter()
                    .map(|&r| &table.rows()[r][col])
                    .find(|v| !v.is_empty())
                    .cloned()
                    .unwrap_or_default()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockReconError;

    fn header() -> Vec<&'static str> {
        let mut cols = columns::IDENTITY.to_vec();
        cols.extend([columns::UNRESTRICTED, columns::VALUE_UNRESTRICTED, columns::AGE_IN_DAYS]);
        cols
    }

    fn line(doc: &str, batch: &str, qty: f64, value: f64, age: f64) -> Record {
        vec![
            doc.into(),
            1.0.into(),
            "M1".into(),
            "Bolt".into(),
            "P1".into(),
            "1100".into(),
            batch.into(),
            qty.into(),
            value.into(),
            age.into(),
        ]
    }

    fn table(rows: Vec<Record>) -> Table {
        Table::from_rows(header(), rows).unwrap()
    }

    #[test]
    fn test_detect_keeps_every_group_member() {
        let input = table(vec![
            line("A", "B1", 10.0, 100.0, 200.0),
            line("B", "B1", 1.0, 1.0, 1.0),
            line("A", "B1", 5.0, 50.0, 10.0),
            line("A", "B1", 2.0, 20.0, 10.0),
        ]);
        let detection = DeduplicationEngine::default().detect(&input).unwrap();

        assert_eq!(detection.unique_rows, vec![1]);
        assert_eq!(detection.groups.len(), 1);
        assert_eq!(detection.groups[0].rows, vec![0, 2, 3]);
        assert_eq!(detection.duplicate_row_count(), 3);
        assert_eq!(detection.merged_row_count(), 2);
    }

    #[test]
    fn test_duplicate_rows_carry_key_column() {
        let input = table(vec![
            line("A", "B1", 10.0, 100.0, 200.0),
            line("A", "B1", 5.0, 50.0, 10.0),
        ]);
        let engine = DeduplicationEngine::default();
        let detection = engine.detect(&input).unwrap();
        let dupes = engine.duplicate_rows(&input, &detection).unwrap();

        assert_eq!(dupes.len(), 2);
        assert_eq!(
            dupes.value(0, columns::UNIQUE_ITEM_CODE),
            Some(&CellValue::from("A | 1 | M1 | Bolt | P1 | 1100 | B1"))
        );
    }

    #[test]
    fn test_merge_sums_quantities_and_keeps_first_values() {
        let input = table(vec![
            line("A", "B1", 10.0, 100.0, 200.0),
            line("A", "B1", 5.0, 50.0, 10.0),
        ]);
        let merged = DeduplicationEngine::default().merge(&input).unwrap();

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.columns(), input.columns());
        assert_eq!(merged.value(0, columns::UNRESTRICTED), Some(&CellValue::Number(15.0)));
        assert_eq!(
            merged.value(0, columns::VALUE_UNRESTRICTED),
            Some(&CellValue::Number(150.0))
        );
        assert_eq!(merged.value(0, columns::AGE_IN_DAYS), Some(&CellValue::Number(200.0)));
    }

    #[test]
    fn test_merge_takes_first_non_empty_value() {
        let mut first = line("A", "B1", 1.0, 1.0, 0.0);
        first[9] = CellValue::Empty;
        let input = table(vec![first, line("A", "B1", 1.0, 1.0, 75.0)]);
        let merged = DeduplicationEngine::default().merge(&input).unwrap();
        assert_eq!(merged.value(0, columns::AGE_IN_DAYS), Some(&CellValue::Number(75.0)));
    }

    #[test]
    fn test_merge_conserves_totals_and_row_count_law() {
        let input = table(vec![
            line("A", "B1", 10.0, 100.0, 1.0),
            line("B", "B1", 3.0, 30.0, 1.0),
            line("A", "B1", 5.0, 50.0, 1.0),
            line("C", "B2", 7.0, 70.0, 1.0),
            line("C", "B2", 1.5, 15.0, 1.0),
            line("D", "B3", 2.0, 20.0, 1.0),
        ]);
        let engine = DeduplicationEngine::default();
        let detection = engine.detect(&input).unwrap();
        let merged = engine.merge(&input).unwrap();

        assert_eq!(merged.len(), detection.unique_rows.len() + detection.groups.len());
        assert_eq!(merged.len(), 4);
        assert_eq!(
            merged.column_sum(columns::UNRESTRICTED),
            input.column_sum(columns::UNRESTRICTED)
        );
        assert_eq!(
            merged.column_sum(columns::VALUE_UNRESTRICTED),
            input.column_sum(columns::VALUE_UNRESTRICTED)
        );
    }

    #[test]
    fn test_merge_is_idempotent() {
        let input = table(vec![
            line("A", "B1", 10.0, 100.0, 1.0),
            line("A", "B1", 5.0, 50.0, 1.0),
            line("B", "B1", 3.0, 30.0, 1.0),
        ]);
        let engine = DeduplicationEngine::default();
        let once = engine.merge(&input).unwrap();
        let twice = engine.merge(&once).unwrap();

        assert_eq!(once, twice);
        assert!(engine.detect(&once).unwrap().is_empty());
    }

    #[test]
    fn test_merge_without_duplicates_is_noop() {
        let input = table(vec![line("A", "B1", 1.0, 1.0, 1.0), line("B", "B1", 2.0, 2.0, 2.0)]);
        let merged = DeduplicationEngine::default().merge(&input).unwrap();
        assert_eq!(merged, input);
    }

    #[test]
    fn test_merge_reports_missing_sum_columns() {
        let input = Table::new(columns::IDENTITY);
        let err = DeduplicationEngine::default().merge(&input).unwrap_err();
        match err {
            StockReconError::Schema { missing, .. } => {
                assert_eq!(missing, vec!["Unrestricted", "Value Unrestricted"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
