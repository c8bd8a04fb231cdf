use crate::error::{Result, StockReconError};
use crate::schema::{columns, CategoryLabel};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One step of the storage-location fallback chain. Rules are evaluated
/// top-to-bottom against the trimmed, lowercased location; the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum LocationRule {
    #[schemars(description = "Matches when the normalized location equals one of the listed values.")]
    Exact {
        locations: Vec<String>,
        label: CategoryLabel,
    },

    #[schemars(description = "Matches when the normalized location contains the pattern.")]
    Contains {
        pattern: String,
        label: CategoryLabel,
    },

    #[schemars(description = "Always matches. Must be the last rule.")]
    Fallback { label: CategoryLabel },
}

impl LocationRule {
    fn exact(locations: &[&str], label: CategoryLabel) -> Self {
        LocationRule::Exact {
            locations: locations.iter().map(|l| l.to_string()).collect(),
            label,
        }
    }

    pub fn label(&self) -> CategoryLabel {
        match self {
            LocationRule::Exact { label, .. }
            | LocationRule::Contains { label, .. }
            | LocationRule::Fallback { label } => *label,
        }
    }

    pub fn matches(&self, normalized: &str) -> bool {
        match self {
            LocationRule::Exact { locations, .. } => locations.iter().any(|l| l == normalized),
            LocationRule::Contains { pattern, .. } => normalized.contains(pattern.as_str()),
            LocationRule::Fallback { .. } => true,
        }
    }
}

pub fn default_location_rules() -> Vec<LocationRule> {
    vec![
        LocationRule::exact(&["1100"], CategoryLabel::RM_PPC),
        LocationRule::exact(&["1170", "1172"], CategoryLabel::RM_PRODN),
        LocationRule::exact(&["1111", "1112", "1113", "1114"], CategoryLabel::SFG_OID),
        LocationRule::exact(&["1150", "1173"], CategoryLabel::FG_MARKETING),
        LocationRule::exact(&[""], CategoryLabel::FG_SERVICE),
        LocationRule::exact(&["1109"], CategoryLabel::RAD_RAD),
        LocationRule::exact(&["1192", "1193"], CategoryLabel::ENGG_ENGG),
        LocationRule::Contains {
            pattern: "psa".to_string(),
            label: CategoryLabel::RM_PRODN,
        },
        LocationRule::Fallback {
            label: CategoryLabel::FG_SERVICE,
        },
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct DisplayConfig {
    #[schemars(description = "Amounts are divided by this before display (1e7 = one crore).")]
    pub crore_divisor: f64,

    #[schemars(description = "Amounts whose magnitude reaches this get the ' Cr' suffix.")]
    pub crore_threshold: f64,

    pub decimals: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            crore_divisor: 10_000_000.0,
            crore_threshold: 100_000.0,
            decimals: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(default)]
pub struct ReconciliationConfig {
    #[schemars(description = "Columns whose stringified values form the identity key of a stock line.")]
    pub identity_columns: Vec<String>,

    pub key_separator: String,

    #[schemars(description = "Columns summed when duplicate stock lines are merged. All other columns keep the first value.")]
    pub sum_columns: Vec<String>,

    pub location_rules: Vec<LocationRule>,

    pub display: DisplayConfig,

    #[schemars(description = "0-based index of the header row in the raw stock sheet.")]
    pub header_row: usize,

    pub first_period_label: String,

    pub second_period_label: String,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            identity_columns: columns::IDENTITY.iter().map(|c| c.to_string()).collect(),
            key_separator: " | ".to_string(),
            sum_columns: columns::SUMMED.iter().map(|c| c.to_string()).collect(),
            location_rules: default_location_rules(),
            display: DisplayConfig::default(),
            header_row: 1,
            first_period_label: "Date 1".to_string(),
            second_period_label: "Date 2".to_string(),
        }
    }
}

impl ReconciliationConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ReconciliationConfig)
    }

    pub fn schema_as_json() -> std::result::Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    /// Every column a raw stock table must carry for the full pipeline.
    pub fn required_stock_columns(&self) -> Vec<String> {
        let mut required: Vec<String> = self.identity_columns.clone();
        for column in self
            .sum_columns
            .iter()
            .map(String::as_str)
            .chain([columns::AGE_IN_DAYS, columns::STORAGE_LOCATION])
        {
            if !required.iter().any(|c| c == column) {
                required.push(column.to_string());
            }
        }
        required
    }

    pub fn validate(&self) -> Result<()> {
        if self.identity_columns.is_empty() {
            return Err(StockReconError::InvalidConfig(
                "identity_columns must name at least one column".to_string(),
            ));
        }

        if self.sum_columns.is_empty() {
            return Err(StockReconError::InvalidConfig(
                "sum_columns must name at least one column".to_string(),
            ));
        }

        if let Some(overlap) = self
            .sum_columns
            .iter()
            .find(|c| self.identity_columns.contains(c))
        {
            return Err(StockReconError::InvalidConfig(format!(
                "column '{}' cannot be both an identity column and a summed column",
                overlap
            )));
        }

        match self.location_rules.last() {
            Some(LocationRule::Fallback { .. }) => {}
            _ => {
                return Err(StockReconError::InvalidConfig(
                    "location_rules must end with a fallback rule".to_string(),
                ))
            }
        }

        if self.display.crore_divisor.is_nan() || self.display.crore_divisor <= 0.0 {
            return Err(StockReconError::InvalidConfig(format!(
                "display.crore_divisor must be positive, got {}",
                self.display.crore_divisor
            )));
        }

        if self.first_period_label == self.second_period_label {
            return Err(StockReconError::InvalidConfig(
                "period labels must differ".to_string(),
            ));
        }

        Ok(())
    }
}
