use crate::aging::AgingClassifier;
use crate::categorize::CategorizationMapper;
use crate::config::ReconciliationConfig;
use crate::dedup::{DeduplicationEngine, DuplicateDetection};
use crate::error::{Result, StockReconError};
use crate::schema::Table;
use crate::summary::{Summary, SummaryAggregator};
use chrono::{DateTime, Local};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PipelineStage {
    Uploaded,
    Verified,
    DuplicatesFound,
    Deduplicated,
    Reported,
}

impl PipelineStage {
    /// The stage that must have been reached before this one can run.
    pub fn predecessor(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Uploaded => None,
            PipelineStage::Verified => Some(PipelineStage::Uploaded),
            PipelineStage::DuplicatesFound => Some(PipelineStage::Verified),
            PipelineStage::Deduplicated => Some(PipelineStage::DuplicatesFound),
            PipelineStage::Reported => Some(PipelineStage::Deduplicated),
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Uploaded => "upload",
            PipelineStage::Verified => "verify",
            PipelineStage::DuplicatesFound => "find duplicates",
            PipelineStage::Deduplicated => "process duplicates",
            PipelineStage::Reported => "create report",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageOutcome {
    Success,
    /// The stage ran but had nothing to change (e.g. no duplicates).
    NoOp,
    Failure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageLogEntry {
    pub timestamp: DateTime<Local>,
    pub stage: PipelineStage,
    pub outcome: StageOutcome,
    pub message: String,
}

impl StageLogEntry {
    pub fn success(&self) -> bool {
        self.outcome != StageOutcome::Failure
    }
}

impl fmt::Display for StageLogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Final output of a run: the `Total Stock` sheet and its `Summary` sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReport {
    pub total_stock: Table,
    pub summary: Summary,
}

impl StockReport {
    pub const TOTAL_STOCK_SHEET: &'static str = "Total Stock";
    pub const SUMMARY_SHEET: &'static str = "Summary";

    pub fn summary_table(&self) -> Result<Table> {
        self.summary.to_table()
    }
}

/// State of one dataset moving through the pipeline. Owned by the caller and
/// handed to each [`PipelineController`] transition.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    source_name: String,
    stage: PipelineStage,
    table: Table,
    duplicates: Option<DuplicateDetection>,
    report: Option<StockReport>,
    log: Vec<StageLogEntry>,
}

impl PipelineRun {
    pub fn new(source_name: impl Into<String>, table: Table) -> Self {
        let source_name = source_name.into();
        let mut run = Self {
            source_name,
            stage: PipelineStage::Uploaded,
            table,
            duplicates: None,
            report: None,
            log: Vec::new(),
        };
        let message = format!("File '{}' uploaded successfully.", run.source_name);
        run.record(PipelineStage::Uploaded, StageOutcome::Success, message);
        run
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn duplicates(&self) -> Option<&DuplicateDetection> {
        self.duplicates.as_ref()
    }

    pub fn report(&self) -> Option<&StockReport> {
        self.report.as_ref()
    }

    pub fn log(&self) -> &[StageLogEntry] {
        &self.log
    }

    fn record(&mut self, stage: PipelineStage, outcome: StageOutcome, message: String) {
        match outcome {
            StageOutcome::Failure => warn!("{}: {}", self.source_name, message),
            _ => info!("{}: {}", self.source_name, message),
        }
        self.log.push(StageLogEntry {
            timestamp: Local::now(),
            stage,
            outcome,
            message,
        });
    }
}

struct Advance {
    table: Table,
    duplicates: Option<DuplicateDetection>,
    report: Option<StockReport>,
    outcome: StageOutcome,
    message: String,
}

impl Advance {
    fn new(table: Table, outcome: StageOutcome, message: String) -> Self {
        Self {
            table,
            duplicates: None,
            report: None,
            outcome,
            message,
        }
    }
}

/// Runs the stages `verify -> find_duplicates -> process_duplicates ->
/// create_report` over a [`PipelineRun`].
///
/// A stage may run once its predecessor has been reached, and may be re-run.
/// On failure the run keeps its stage and table; only the log grows.
pub struct PipelineController {
    config: ReconciliationConfig,
    dedup: DeduplicationEngine,
    mapper: CategorizationMapper,
    aging: AgingClassifier,
    aggregator: SummaryAggregator,
}

impl PipelineController {
    pub fn new(config: ReconciliationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: ReconciliationConfig) -> Self {
        Self {
            dedup: DeduplicationEngine::new(&config),
            mapper: CategorizationMapper::new(&config),
            aging: AgingClassifier,
            aggregator: SummaryAggregator,
            config,
        }
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn verify(&self, run: &mut PipelineRun) -> Result<PipelineStage> {
        self.transition(run, PipelineStage::Verified, |ctl, run| {
            let mut table = run.table.clone();
            table.trim_column_names();
            table.require_columns("Verification failed", ctl.config.required_stock_columns().as_slice())?;
            let message = format!("Verification successful. Loaded {} rows.", table.len());
            Ok(Advance::new(table, StageOutcome::Success, message))
        })
    }

    pub fn find_duplicates(&self, run: &mut PipelineRun) -> Result<PipelineStage> {
        self.transition(run, PipelineStage::DuplicatesFound, |ctl, run| {
            let detection = ctl.dedup.detect(&run.table)?;
            let (outcome, message) = if detection.is_empty() {
                (StageOutcome::NoOp, "No duplicates were found.".to_string())
            } else {
                (
                    StageOutcome::Success,
                    format!(
                        "Found {} rows that are part of a duplicate set.",
                        detection.duplicate_row_count()
                    ),
                )
            };
            let mut advance = Advance::new(run.table.clone(), outcome, message);
            advance.duplicates = Some(detection);
            Ok(advance)
        })
    }

    pub fn process_duplicates(&self, run: &mut PipelineRun) -> Result<PipelineStage> {
        self.transition(run, PipelineStage::Deduplicated, |ctl, run| {
            let before = run.table.len();
            let merged = ctl.dedup.merge(&run.table)?;
            let advance = if merged.len() == before {
                Advance::new(merged, StageOutcome::NoOp, "No duplicates found to process.".to_string())
            } else {
                let message = format!(
                    "Deduplication process complete. Final row count: {}",
                    merged.len()
                );
                Advance::new(merged, StageOutcome::Success, message)
            };
            Ok(advance)
        })
    }

    pub fn create_report(&self, run: &mut PipelineRun) -> Result<PipelineStage> {
        self.transition(run, PipelineStage::Reported, |ctl, run| {
            let aged = ctl.aging.classify(&run.table)?;
            let categorized = ctl.mapper.classify(&aged)?;
            let summary = ctl.aggregator.summarize(&categorized)?;
            let message = format!(
                "Report created: {} rows across {} categories.",
                categorized.len(),
                summary.rows.len()
            );

            let mut advance = Advance::new(categorized.clone(), StageOutcome::Success, message);
            advance.report = Some(StockReport {
                total_stock: categorized,
                summary,
            });
            Ok(advance)
        })
    }

    /// Runs every remaining stage in order, stopping at the first failure.
    pub fn run_to_report<'r>(&self, run: &'r mut PipelineRun) -> Result<&'r StockReport> {
        if run.stage < PipelineStage::Verified {
            self.verify(run)?;
        }
        if run.stage < PipelineStage::DuplicatesFound {
            self.find_duplicates(run)?;
        }
        if run.stage < PipelineStage::Deduplicated {
            self.process_duplicates(run)?;
        }
        if run.stage < PipelineStage::Reported {
            self.create_report(run)?;
        }
        run.report.as_ref().ok_or_else(|| StockReconError::InvalidTransition {
            attempted: PipelineStage::Reported.to_string(),
            current: run.stage.to_string(),
        })
    }

    fn transition<F>(&self, run: &mut PipelineRun, target: PipelineStage, step: F) -> Result<PipelineStage>
    where
        F: FnOnce(&Self, &PipelineRun) -> Result<Advance>,
    {
        if let Some(required) = target.predecessor() {
            if run.stage < required {
                let err = StockReconError::InvalidTransition {
                    attempted: target.to_string(),
                    current: run.stage.to_string(),
                };
                run.record(target, StageOutcome::Failure, err.to_string());
                return Err(err);
            }
        }

        match step(self, run) {
            Ok(advance) => {
                run.table = advance.table;
                if target < PipelineStage::DuplicatesFound {
                    run.duplicates = None;
                }
                if advance.duplicates.is_some() {
                    run.duplicates = advance.duplicates;
                }
                run.report = advance.report;
                run.stage = target;
                run.record(target, advance.outcome, advance.message);
                Ok(target)
            }
            Err(err) => {
                run.record(target, StageOutcome::Failure, format!("Error during {}: {}", target, err));
                Err(err)
            }
        }
    }
}

impl Default for PipelineController {
    fn default() -> Self {
        Self::build(ReconciliationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{columns, CellValue};

    fn stock_table(rows: &[(&str, &str, f64, f64, f64)]) -> Table {
        let mut header = columns::IDENTITY.to_vec();
        header.extend([columns::UNRESTRICTED, columns::VALUE_UNRESTRICTED, columns::AGE_IN_DAYS]);
        Table::from_rows(
            header,
            rows.iter()
                .map(|(doc, loc, qty, value, age)| {
                    vec![
                        CellValue::from(*doc),
                        1.0.into(),
                        "M1".into(),
                        "Bolt".into(),
                        "P1".into(),
                        CellValue::from(*loc),
                        "B1".into(),
                        (*qty).into(),
                        (*value).into(),
                        (*age).into(),
                    ]
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_full_run_reaches_reported() {
        let table = stock_table(&[
            ("A", "1100", 10.0, 100.0, 200.0),
            ("A", "1100", 5.0, 50.0, 10.0),
            ("B", "PSA1", 1.0, 30.0, 5.0),
        ]);
        let controller = PipelineController::default();
        let mut run = PipelineRun::new("stock.csv", table);

        assert_eq!(controller.verify(&mut run).unwrap(), PipelineStage::Verified);
        assert_eq!(controller.find_duplicates(&mut run).unwrap(), PipelineStage::DuplicatesFound);
        assert_eq!(run.duplicates().unwrap().duplicate_row_count(), 2);
        assert_eq!(controller.process_duplicates(&mut run).unwrap(), PipelineStage::Deduplicated);
        assert_eq!(run.table().len(), 2);
        assert_eq!(controller.create_report(&mut run).unwrap(), PipelineStage::Reported);

        let report = run.report().unwrap();
        assert_eq!(report.summary.row("RM", "PPC").unwrap().at_or_above_150, 150.0);
        assert_eq!(report.summary.row("RM", "Prodn").unwrap().below_150, 30.0);
        assert_eq!(report.summary.grand_total.grand_total, 180.0);

        assert_eq!(run.log().len(), 5);
        assert!(run.log().iter().all(StageLogEntry::success));
        assert!(run.log()[0].message.contains("stock.csv"));
    }

    #[test]
    fn test_out_of_order_stage_is_rejected_and_state_kept() {
        let table = stock_table(&[("A", "1100", 1.0, 1.0, 1.0)]);
        let controller = PipelineController::default();
        let mut run = PipelineRun::new("stock.csv", table.clone());

        let err = controller.process_duplicates(&mut run).unwrap_err();
        assert!(matches!(err, StockReconError::InvalidTransition { .. }));
        assert_eq!(run.stage(), PipelineStage::Uploaded);
        assert_eq!(run.table(), &table);
        assert_eq!(run.log().last().unwrap().outcome, StageOutcome::Failure);
    }

    #[test]
    fn test_failed_verification_can_be_retried() {
        let controller = PipelineController::default();
        let mut run = PipelineRun::new("bad.csv", Table::new(["Plant"]));

        let err = controller.verify(&mut run).unwrap_err();
        match &err {
            StockReconError::Schema { missing, .. } => {
                assert!(missing.contains(&"Batch".to_string()));
                assert!(missing.contains(&"Age in Days".to_string()));
                assert!(!missing.contains(&"Plant".to_string()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(run.stage(), PipelineStage::Uploaded);

        let mut retry = PipelineRun::new("good.csv", stock_table(&[("A", "1100", 1.0, 1.0, 1.0)]));
        assert!(controller.verify(&mut retry).is_ok());
    }

    #[test]
    fn test_no_duplicates_is_logged_as_noop() {
        let table = stock_table(&[("A", "1100", 1.0, 1.0, 1.0), ("B", "1100", 1.0, 1.0, 1.0)]);
        let controller = PipelineController::default();
        let mut run = PipelineRun::new("stock.csv", table.clone());

        controller.verify(&mut run).unwrap();
        controller.find_duplicates(&mut run).unwrap();
        controller.process_duplicates(&mut run).unwrap();

        let outcomes: Vec<StageOutcome> = run.log().iter().map(|e| e.outcome).collect();
        assert_eq!(outcomes[2], StageOutcome::NoOp);
        assert_eq!(outcomes[3], StageOutcome::NoOp);
        assert_eq!(run.table(), &table);
    }

    #[test]
    fn test_run_to_report_from_upload() {
        let controller = PipelineController::default();
        let mut run = PipelineRun::new("stock.csv", stock_table(&[("A", "", 2.0, 20.0, 400.0)]));
        let report = controller.run_to_report(&mut run).unwrap();

        assert_eq!(report.summary.row("FG", "Service").unwrap().grand_total, 20.0);
        assert_eq!(run.stage(), PipelineStage::Reported);
    }

    #[test]
    fn test_log_entry_display() {
        let run = PipelineRun::new("stock.csv", Table::default());
        let line = run.log()[0].to_string();
        assert!(line.starts_with('['));
        assert!(line.ends_with("File 'stock.csv' uploaded successfully."));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ReconciliationConfig {
            identity_columns: Vec::new(),
            ..ReconciliationConfig::default()
        };
        assert!(PipelineController::new(config).is_err());
    }
}
