use crate::config::{LocationRule, ReconciliationConfig};
use crate::error::{Result, StockReconError};
use crate::schema::{columns, CategoryLabel, CellValue, Table};
use log::debug;

/// Assigns `Type` and `Responsibility` from the storage location of each line.
pub struct CategorizationMapper {
    rules: Vec<LocationRule>,
}

impl Default for CategorizationMapper {
    fn default() -> Self {
        Self {
            rules: crate::config::default_location_rules(),
        }
    }
}

impl CategorizationMapper {
    pub fn new(config: &ReconciliationConfig) -> Self {
        Self {
            rules: config.location_rules.clone(),
        }
    }

    pub fn normalize_location(location: &CellValue) -> String {
        location.to_string().trim().to_lowercase()
    }

    fn matching_rule(&self, normalized: &str) -> Option<&LocationRule> {
        self.rules.iter().find(|rule| rule.matches(normalized))
    }

    /// Label for one location. Falls through the rules in order; an empty or
    /// exhausted rule list yields `FG/Service`, so every location gets a label.
    pub fn label_for(&self, location: &CellValue) -> CategoryLabel {
        self.matching_rule(&Self::normalize_location(location))
            .map(LocationRule::label)
            .unwrap_or(CategoryLabel::FG_SERVICE)
    }

    pub fn classify(&self, table: &Table) -> Result<Table> {
        let location_idx = table
            .column_index(columns::STORAGE_LOCATION)
            .ok_or_else(|| {
                StockReconError::schema(
                    "Cannot map Type/Responsibility",
                    vec![columns::STORAGE_LOCATION.to_string()],
                )
            })?;

        let mut defaulted = 0usize;
        let labels: Vec<CategoryLabel> = table
            .rows()
            .iter()
            .map(|row| match self.matching_rule(&Self::normalize_location(&row[location_idx])) {
                Some(LocationRule::Fallback { label }) => {
                    defaulted += 1;
                    *label
                }
                Some(rule) => rule.label(),
                None => {
                    defaulted += 1;
                    CategoryLabel::FG_SERVICE
                }
            })
            .collect();

        debug!(
            "Categorized {} rows, {} by the fallback rule",
            labels.len(),
            defaulted
        );

        let mut output = table.clone();
        output.set_column(
            columns::TYPE,
            labels
                .iter()
                .map(|l| CellValue::from(l.stock_type.as_str()))
                .collect(),
        )?;
        output.set_column(
            columns::RESPONSIBILITY,
            labels
                .iter()
                .map(|l| CellValue::from(l.responsibility.as_str()))
                .collect(),
        )?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(location: &str) -> CategoryLabel {
        CategorizationMapper::default().label_for(&CellValue::from(location))
    }

    #[test]
    fn test_exact_matches() {
        assert_eq!(label("1100"), CategoryLabel::RM_PPC);
        assert_eq!(label("1170"), CategoryLabel::RM_PRODN);
        assert_eq!(label("1172"), CategoryLabel::RM_PRODN);
        assert_eq!(label("1113"), CategoryLabel::SFG_OID);
        assert_eq!(label("1173"), CategoryLabel::FG_MARKETING);
        assert_eq!(label("1109"), CategoryLabel::RAD_RAD);
        assert_eq!(label("1193"), CategoryLabel::ENGG_ENGG);
    }

    #[test]
    fn test_normalization_trims_and_lowercases() {
        assert_eq!(label("  1150 "), CategoryLabel::FG_MARKETING);
        assert_eq!(
            CategorizationMapper::default().label_for(&CellValue::from(1192.0)),
            CategoryLabel::ENGG_ENGG
        );
    }

    #[test]
    fn test_empty_location_is_fg_service() {
        assert_eq!(label(""), CategoryLabel::FG_SERVICE);
        assert_eq!(label("   "), CategoryLabel::FG_SERVICE);
        assert_eq!(
            CategorizationMapper::default().label_for(&CellValue::Empty),
            CategoryLabel::FG_SERVICE
        );
    }

    #[test]
    fn test_psa_substring_rule() {
        assert_eq!(label("PSA1"), CategoryLabel::RM_PRODN);
        assert_eq!(label("x-psa-9"), CategoryLabel::RM_PRODN);
    }

    #[test]
    fn test_unknown_location_defaults() {
        assert_eq!(label("9999"), CategoryLabel::FG_SERVICE);
        assert_eq!(label("11000"), CategoryLabel::FG_SERVICE);
    }

    #[test]
    fn test_every_location_gets_an_enumerated_label() {
        let mapper = CategorizationMapper::default();
        for location in ["", "1100", "psa", "PsA7", "1114", "zzz", "😀", "1109 ", "1192.5"] {
            let l = mapper.label_for(&CellValue::from(location));
            assert!(CategoryLabel::ALL.contains(&l), "{location} -> {l}");
        }

        let bare = CategorizationMapper { rules: Vec::new() };
        assert_eq!(bare.label_for(&CellValue::from("1100")), CategoryLabel::FG_SERVICE);
    }

    #[test]
    fn test_classify_adds_columns() {
        let table = Table::from_rows(
            ["Material", "Storage location"],
            vec![
                vec!["M1".into(), "1100".into()],
                vec!["M2".into(), "PSA1".into()],
                vec!["M3".into(), CellValue::Empty],
            ],
        )
        .unwrap();
        let out = CategorizationMapper::default().classify(&table).unwrap();

        assert_eq!(out.columns(), &["Material", "Storage location", "Type", "Responsibility"]);
        assert_eq!(out.value(0, "Type"), Some(&CellValue::from("RM")));
        assert_eq!(out.value(0, "Responsibility"), Some(&CellValue::from("PPC")));
        assert_eq!(out.value(1, "Responsibility"), Some(&CellValue::from("Prodn")));
        assert_eq!(out.value(2, "Type"), Some(&CellValue::from("FG")));
        assert_eq!(out.value(2, "Responsibility"), Some(&CellValue::from("Service")));
    }

    #[test]
    fn test_classify_requires_storage_location() {
        let table = Table::new(["Material"]);
        let err = CategorizationMapper::default().classify(&table).unwrap_err();
        assert!(err.to_string().contains("Storage location"));
    }
}
