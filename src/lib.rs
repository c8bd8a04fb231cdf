//! # Stock Reconciliation
//!
//! A library for cleaning and reconciling inventory stock records exported from
//! an ERP "Total stock" sheet.
//!
//! ## Core Concepts
//!
//! - **Identity key**: the seven identity columns of a stock line joined with `" | "`;
//!   lines with equal keys are duplicates regardless of quantity
//! - **Deduplication**: each duplicate group collapses into one line, summing
//!   `Unrestricted` and `Value Unrestricted` and keeping the first value elsewhere
//! - **Categorization**: `Storage location` maps to a `(Type, Responsibility)` pair
//!   through an ordered rule list (exact match, then `psa` substring, then `FG/Service`)
//! - **Aging**: lines split at 150 days into `Age< 150d` and `Age >= 150d`
//! - **Summary**: `Value Unrestricted` cross-tabulated by category and age, with
//!   `Grand Total` margins
//! - **Comparison**: two summaries from different dates reconciled into per-type
//!   subtotals and per-responsibility totals with value and percentage change
//!
//! ## Example
//!
//! ```rust,ignore
//! use stock_reconciliation::*;
//!
//! let reconciler = StockReconciler::default();
//! let stock = reconciler.read_stock_workbook("stock_export.xlsx")?;
//! let report = reconciler.process("stock_export.xlsx", stock)?;
//! write_report("stock_report.xlsx", &report)?;
//!
//! let earlier = read_summary_sheet("report_march.xlsx")?;
//! let later = read_summary_sheet("report_april.xlsx")?;
//! reconciler.write_comparison("comparison.xlsx", &earlier, &later)?;
//! ```

pub mod aging;
pub mod categorize;
pub mod comparison;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingestion;
pub mod keys;
pub mod pipeline;
pub mod schema;
pub mod summary;
pub mod utils;
pub mod workbook;

pub use aging::AgingClassifier;
pub use categorize::CategorizationMapper;
pub use comparison::{ComparisonEngine, ComparisonReport, ComparisonRow};
pub use config::{DisplayConfig, LocationRule, ReconciliationConfig};
pub use dedup::{DeduplicationEngine, DuplicateDetection, DuplicateGroup};
pub use error::{Result, StockReconError};
pub use ingestion::*;
pub use keys::KeyBuilder;
pub use pipeline::{
    PipelineController, PipelineRun, PipelineStage, StageLogEntry, StageOutcome, StockReport,
};
pub use schema::*;
pub use summary::{Summary, SummaryAggregator, SummaryRow};
pub use utils::*;
pub use workbook::{
    read_sheet, read_summary_sheet, write_report, write_sheets, COMPARISON_SHEET,
    STOCK_INPUT_SHEET,
};

use log::{debug, info};
use std::io::Read;
use std::path::Path;

#[derive(Default)]
pub struct StockReconciler {
    config: ReconciliationConfig,
}

impl StockReconciler {
    pub fn new(config: ReconciliationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    /// Reads a CSV stock sheet whose header sits at the configured `header_row`.
    pub fn read_stock<R: Read>(&self, reader: R) -> Result<Table> {
        read_table(reader, self.config.header_row)
    }

    /// Reads the `Total stock` sheet of an ERP workbook export.
    pub fn read_stock_workbook<P: AsRef<Path>>(&self, path: P) -> Result<Table> {
        read_sheet(path, STOCK_INPUT_SHEET, self.config.header_row)
    }

    /// Runs every pipeline stage over `table` and returns the final report.
    pub fn process(&self, source_name: &str, table: Table) -> Result<StockReport> {
        info!("Processing stock sheet '{}' ({} rows)", source_name, table.len());

        let controller = PipelineController::new(self.config.clone())?;
        let mut run = PipelineRun::new(source_name, table);
        let report = controller.run_to_report(&mut run)?.clone();

        for entry in run.log() {
            debug!("{}", entry);
        }

        Ok(report)
    }

    /// Reconciles two summary sheets, each still carrying its `Grand Total` line.
    pub fn compare(&self, summary_a: &Table, summary_b: &Table) -> Result<ComparisonReport> {
        ComparisonEngine::new(&self.config).compare(summary_a, summary_b)
    }

    /// Like [`StockReconciler::compare`], rendered for display.
    pub fn compare_formatted(&self, summary_a: &Table, summary_b: &Table) -> Result<Table> {
        self.compare(summary_a, summary_b)?
            .to_display_table(&self.config.display)
    }

    /// Writes the formatted comparison as a single-sheet workbook.
    pub fn write_comparison<P: AsRef<Path>>(
        &self,
        path: P,
        summary_a: &Table,
        summary_b: &Table,
    ) -> Result<()> {
        let table = self.compare_formatted(summary_a, summary_b)?;
        write_sheets(path, &[(COMPARISON_SHEET, &table)])
    }
}

pub fn process_stock_report(source_name: &str, table: Table) -> Result<StockReport> {
    StockReconciler::default().process(source_name, table)
}

pub fn compare_summaries(summary_a: &Table, summary_b: &Table) -> Result<ComparisonReport> {
    StockReconciler::default().compare(summary_a, summary_b)
}
