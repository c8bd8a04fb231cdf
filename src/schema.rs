use crate::error::{Result, StockReconError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Column names used across the stock sheet, the summary sheet and the
/// comparison report.
pub mod columns {
    pub const SALE_DOCUMENT: &str = "Sale Document";
    pub const ITEM_SD: &str = "Item (SD)";
    pub const MATERIAL: &str = "Material";
    pub const MATERIAL_DESCRIPTION: &str = "Material Description";
    pub const PLANT: &str = "Plant";
    pub const STORAGE_LOCATION: &str = "Storage location";
    pub const BATCH: &str = "Batch";

    pub const UNRESTRICTED: &str = "Unrestricted";
    pub const VALUE_UNRESTRICTED: &str = "Value Unrestricted";
    pub const AGE_IN_DAYS: &str = "Age in Days";

    /// Transient composite key column added during duplicate detection.
    pub const UNIQUE_ITEM_CODE: &str = "Unique Item Code";

    pub const TYPE: &str = "Type";
    pub const RESPONSIBILITY: &str = "Responsibility";
    pub const AGE: &str = "AGE";
    pub const AGE_BELOW_INDICATOR: &str = "Age <150d";
    pub const AGE_ABOVE_INDICATOR: &str = "Age >=150d";
    pub const GRAND_TOTAL: &str = "Grand Total";

    // Comparison report vocabulary. "Responsbilty" is the report's own spelling.
    pub const RESPONSBILTY: &str = "Responsbilty";
    pub const TOTAL: &str = "Total";
    pub const BELOW_150_DAYS: &str = "< 150 Days";
    pub const ABOVE_150_DAYS: &str = ">= 150 Days";
    pub const METRIC: &str = "Metric";
    pub const VALUE_CHANGE: &str = "Value Change";
    pub const CHANGE_PCT: &str = "Change (%)";

    pub const IDENTITY: [&str; 7] = [
        SALE_DOCUMENT,
        ITEM_SD,
        MATERIAL,
        MATERIAL_DESCRIPTION,
        PLANT,
        STORAGE_LOCATION,
        BATCH,
    ];

    pub const SUMMED: [&str; 2] = [UNRESTRICTED, VALUE_UNRESTRICTED];
}

pub const AGE_THRESHOLD_DAYS: f64 = 150.0;

/// A single cell of a stock table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    #[default]
    Empty,
}

impl CellValue {
    /// Numeric view of the cell. Text is parsed after trimming; NaN counts as missing.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_nan() => None,
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            CellValue::Empty => None,
        }
    }

    pub fn as_f64_or_zero(&self) -> f64 {
        self.as_f64().unwrap_or(0.0)
    }

    /// Like [`CellValue::as_f64`], but text that does not parse is an error
    /// rather than missing.
    pub fn to_f64_strict(&self, column: &str) -> Result<Option<f64>> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => match self.as_f64() {
                Some(n) => Ok(Some(n)),
                None => Err(StockReconError::Conversion {
                    column: column.to_string(),
                    value: s.clone(),
                }),
            },
            _ => Ok(self.as_f64()),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Number(n) => n.is_nan(),
            CellValue::Text(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => {
                if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Empty)
    }
}

/// One stock line, aligned with the owning table's columns.
pub type Record = Vec<CellValue>;

/// Ordered, in-memory table with named columns. Every row has exactly one
/// cell per column, including tables that come in through serde.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Record>,
}

#[derive(Deserialize)]
struct RawTable {
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl TryFrom<RawTable> for Table {
    type Error = StockReconError;

    fn try_from(raw: RawTable) -> Result<Self> {
        Table::from_rows(raw.columns, raw.rows)
    }
}

impl Table {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn from_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Record>,
    ) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn push_row(&mut self, row: Record) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(StockReconError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Resolves every required column to its index, or fails with a schema
    /// error naming all of the absent ones.
    pub fn require_columns<S: AsRef<str>>(&self, stage: &str, required: &[S]) -> Result<Vec<usize>> {
        let mut indices = Vec::with_capacity(required.len());
        let mut missing = Vec::new();

        for name in required {
            match self.column_index(name.as_ref()) {
                Some(idx) => indices.push(idx),
                None => missing.push(name.as_ref().to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(StockReconError::schema(stage, missing));
        }
        Ok(indices)
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    pub fn column_values(&self, column: &str) -> Option<Vec<&CellValue>> {
        let idx = self.column_index(column)?;
        Some(self.rows.iter().map(|r| &r[idx]).collect())
    }

    /// Sum of a column with non-numeric cells counted as zero.
    pub fn column_sum(&self, column: &str) -> f64 {
        self.column_values(column)
            .map(|values| values.iter().map(|v| v.as_f64_or_zero()).sum())
            .unwrap_or(0.0)
    }

    /// Adds the column at the end, or replaces its values in place if it exists.
    pub fn set_column(&mut self, name: &str, values: Vec<CellValue>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(StockReconError::RaggedRow {
                row: self.rows.len().min(values.len()),
                expected: self.rows.len(),
                found: values.len(),
            });
        }

        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    pub fn drop_column(&mut self, name: &str) -> bool {
        match self.column_index(name) {
            Some(idx) => {
                self.columns.remove(idx);
                for row in &mut self.rows {
                    row.remove(idx);
                }
                true
            }
            None => false,
        }
    }

    pub fn rename_columns(&mut self, renames: &[(&str, &str)]) {
        for column in &mut self.columns {
            if let Some((_, to)) = renames.iter().find(|(from, _)| from == column) {
                *column = to.to_string();
            }
        }
    }

    pub fn trim_column_names(&mut self) {
        for column in &mut self.columns {
            *column = column.trim().to_string();
        }
    }

    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices
                .iter()
                .filter_map(|&i| self.rows.get(i).cloned())
                .collect(),
        }
    }

    /// Removes the trailing row, which by convention holds pivot margins.
    pub fn without_last_row(&self) -> Table {
        let keep = self.rows.len().saturating_sub(1);
        Table {
            columns: self.columns.clone(),
            rows: self.rows[..keep].to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub enum StockType {
    #[serde(rename = "RM")]
    #[schemars(description = "Raw material")]
    Rm,
    #[serde(rename = "SFG")]
    #[schemars(description = "Semi-finished goods")]
    Sfg,
    #[serde(rename = "FG")]
    #[schemars(description = "Finished goods")]
    Fg,
    #[serde(rename = "RAD")]
    Rad,
    #[serde(rename = "Engg")]
    #[schemars(description = "Engineering stores")]
    Engg,
}

impl StockType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StockType::Rm => "RM",
            StockType::Sfg => "SFG",
            StockType::Fg => "FG",
            StockType::Rad => "RAD",
            StockType::Engg => "Engg",
        }
    }
}

impl fmt::Display for StockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub enum Responsibility {
    #[serde(rename = "PPC")]
    #[schemars(description = "Production planning and control")]
    Ppc,
    #[serde(rename = "Prodn")]
    #[schemars(description = "Production")]
    Prodn,
    #[serde(rename = "OID")]
    Oid,
    Marketing,
    Service,
    #[serde(rename = "RAD")]
    Rad,
    Engg,
}

impl Responsibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Responsibility::Ppc => "PPC",
            Responsibility::Prodn => "Prodn",
            Responsibility::Oid => "OID",
            Responsibility::Marketing => "Marketing",
            Responsibility::Service => "Service",
            Responsibility::Rad => "RAD",
            Responsibility::Engg => "Engg",
        }
    }
}

impl fmt::Display for Responsibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `(Type, Responsibility)` business classification of a stock line.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema)]
pub struct CategoryLabel {
    #[serde(rename = "type")]
    pub stock_type: StockType,
    pub responsibility: Responsibility,
}

impl CategoryLabel {
    pub const RM_PPC: Self = Self::new(StockType::Rm, Responsibility::Ppc);
    pub const RM_PRODN: Self = Self::new(StockType::Rm, Responsibility::Prodn);
    pub const SFG_OID: Self = Self::new(StockType::Sfg, Responsibility::Oid);
    pub const FG_MARKETING: Self = Self::new(StockType::Fg, Responsibility::Marketing);
    pub const FG_SERVICE: Self = Self::new(StockType::Fg, Responsibility::Service);
    pub const RAD_RAD: Self = Self::new(StockType::Rad, Responsibility::Rad);
    pub const ENGG_ENGG: Self = Self::new(StockType::Engg, Responsibility::Engg);

    pub const ALL: [Self; 7] = [
        Self::RM_PPC,
        Self::RM_PRODN,
        Self::SFG_OID,
        Self::FG_MARKETING,
        Self::FG_SERVICE,
        Self::RAD_RAD,
        Self::ENGG_ENGG,
    ];

    pub const fn new(stock_type: StockType, responsibility: Responsibility) -> Self {
        Self {
            stock_type,
            responsibility,
        }
    }
}

impl fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stock_type, self.responsibility)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgeBucket {
    Below150,
    AtOrAbove150,
}

impl AgeBucket {
    pub fn from_days(days: f64) -> Self {
        if days >= AGE_THRESHOLD_DAYS {
            AgeBucket::AtOrAbove150
        } else {
            AgeBucket::Below150
        }
    }

    /// Inverse of [`AgeBucket::age_label`].
    pub fn from_age_label(label: &str) -> Option<Self> {
        [AgeBucket::Below150, AgeBucket::AtOrAbove150]
            .into_iter()
            .find(|b| b.age_label() == label)
    }

    /// Value written to the `AGE` column, and the summary column header.
    pub fn age_label(&self) -> &'static str {
        match self {
            AgeBucket::Below150 => "Age< 150d",
            AgeBucket::AtOrAbove150 => "Age >= 150d",
        }
    }

    /// Value written to this bucket's indicator column.
    pub fn indicator_label(&self) -> &'static str {
        match self {
            AgeBucket::Below150 => "Age < 150d",
            AgeBucket::AtOrAbove150 => "Age >= 150d",
        }
    }
}

/// Long-form metric of a summary row. Variant order follows the lexical
/// order of the labels.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Below150Days,
    AtOrAbove150Days,
    Total,
}

impl Metric {
    /// Reshape order of the wide summary columns.
    pub const ALL: [Metric; 3] = [Metric::Total, Metric::Below150Days, Metric::AtOrAbove150Days];

    pub fn label(&self) -> &'static str {
        match self {
            Metric::Total => columns::TOTAL,
            Metric::Below150Days => columns::BELOW_150_DAYS,
            Metric::AtOrAbove150Days => columns::ABOVE_150_DAYS,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
