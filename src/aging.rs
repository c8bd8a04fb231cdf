use crate::error::{Result, StockReconError};
use crate::schema::{columns, AgeBucket, CellValue, Table};
use crate::utils::coerce_numeric;
use log::debug;

/// Buckets stock lines by `Age in Days` at the 150 day threshold.
#[derive(Debug, Default, Clone, Copy)]
pub struct AgingClassifier;

impl AgingClassifier {
    /// Rewrites `Age in Days` as a number (non-numeric and missing become 0)
    /// and adds `AGE` plus the two mutually exclusive indicator columns.
    pub fn classify(&self, table: &Table) -> Result<Table> {
        let age_idx = table.column_index(columns::AGE_IN_DAYS).ok_or_else(|| {
            StockReconError::schema(
                "Cannot calculate AGE",
                vec![columns::AGE_IN_DAYS.to_string()],
            )
        })?;

        let mut coerced = 0usize;
        let ages: Vec<f64> = table
            .rows()
            .iter()
            .map(|row| match row[age_idx].to_f64_strict(columns::AGE_IN_DAYS) {
                Ok(_) => coerce_numeric(&row[age_idx]),
                Err(err) => {
                    if coerced == 0 {
                        debug!("{}", err);
                    }
                    coerced += 1;
                    0.0
                }
            })
            .collect();
        if coerced > 0 {
            debug!("{} rows had a non-numeric '{}', treated as 0", coerced, columns::AGE_IN_DAYS);
        }

        let buckets: Vec<AgeBucket> = ages.iter().map(|&days| AgeBucket::from_days(days)).collect();
        let indicator = |wanted: AgeBucket| -> Vec<CellValue> {
            buckets
                .iter()
                .map(|&b| {
                    if b == wanted {
                        CellValue::from(wanted.indicator_label())
                    } else {
                        CellValue::from("")
                    }
                })
                .collect()
        };

        let mut output = table.clone();
        output.set_column(columns::AGE_IN_DAYS, ages.iter().map(|&d| CellValue::Number(d)).collect())?;
        output.set_column(
            columns::AGE,
            buckets.iter().map(|b| CellValue::from(b.age_label())).collect(),
        )?;
        output.set_column(columns::AGE_BELOW_INDICATOR, indicator(AgeBucket::Below150))?;
        output.set_column(columns::AGE_ABOVE_INDICATOR, indicator(AgeBucket::AtOrAbove150))?;
        Ok(output)
    }
}
