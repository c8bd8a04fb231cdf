use crate::error::Result;
use crate::schema::{CellValue, Table};

/// Builds the composite identity key of each stock line.
///
/// The column set is resolved against a table once, in [`KeyBuilder::for_table`];
/// building a key for a row is then infallible.
#[derive(Debug, Clone)]
pub struct KeyBuilder {
    indices: Vec<usize>,
    separator: String,
}

impl KeyBuilder {
    pub fn for_table<S: AsRef<str>>(table: &Table, columns: &[S], separator: &str) -> Result<Self> {
        let indices = table.require_columns("Cannot create Unique Item Code", columns)?;
        Ok(Self {
            indices,
            separator: separator.to_string(),
        })
    }

    /// Key for one record. A record narrower than the resolved columns
    /// contributes empty segments for the cells it lacks.
    pub fn build(&self, record: &[CellValue]) -> String {
        self.indices
            .iter()
            .map(|&idx| record.get(idx).map(CellValue::to_string).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// Keys for every row of `table`, in row order.
    pub fn keys(&self, table: &Table) -> Vec<String> {
        table.rows().iter().map(|row| self.build(row)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StockReconError;
    use crate::schema::columns;

    fn stock_line(item: f64, batch: &str) -> Vec<CellValue> {
        vec![
            "A".into(),
            item.into(),
            "M1".into(),
            "Bolt".into(),
            "P1".into(),
            "1100".into(),
            batch.into(),
        ]
    }

    #[test]
    fn test_key_joins_stringified_identity_values() {
        let table = Table::from_rows(columns::IDENTITY, vec![stock_line(1.0, "B1")]).unwrap();
        let builder = KeyBuilder::for_table(&table, &columns::IDENTITY, " | ").unwrap();
        assert_eq!(builder.build(&table.rows()[0]), "A | 1 | M1 | Bolt | P1 | 1100 | B1");
    }

    #[test]
    fn test_empty_cells_contribute_empty_segments() {
        let mut line = stock_line(10.0, "B1");
        line[6] = CellValue::Empty;
        let table = Table::from_rows(columns::IDENTITY, vec![line]).unwrap();
        let builder = KeyBuilder::for_table(&table, &columns::IDENTITY, " | ").unwrap();
        assert_eq!(builder.keys(&table), vec!["A | 10 | M1 | Bolt | P1 | 1100 | "]);
    }

    #[test]
    fn test_short_record_gives_empty_segments() {
        let table = Table::from_rows(columns::IDENTITY, vec![stock_line(1.0, "B1")]).unwrap();
        let builder = KeyBuilder::for_table(&table, &columns::IDENTITY, " | ").unwrap();
        let short = vec![CellValue::from("A"), CellValue::from(1.0)];
        assert_eq!(builder.build(&short), "A | 1 |  |  |  |  | ");
    }

    #[test]
    fn test_missing_identity_columns_fail_once() {
        let table = Table::new(["Sale Document", "Material"]);
        let err = KeyBuilder::for_table(&table, &columns::IDENTITY, " | ").unwrap_err();
        match err {
            StockReconError::Schema { missing, .. } => {
                assert_eq!(missing.len(), 5);
                assert!(missing.contains(&"Batch".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
