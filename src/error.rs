use thiserror::Error;

#[derive(Error, Debug)]
pub enum StockReconError {
    #[error("{stage}: missing required columns: {}", missing.join(", "))]
    Schema { stage: String, missing: Vec<String> },

    #[error("Column '{column}' holds non-numeric value '{value}'")]
    Conversion { column: String, value: String },

    #[error("Column '{column}' holds unexpected value '{value}'")]
    UnexpectedValue { column: String, value: String },

    #[error("Row {row} has {found} cells but the table has {expected} columns")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Cannot run '{attempted}' while the pipeline is at '{current}'")]
    InvalidTransition { attempted: String, current: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Workbook read error: {0}")]
    WorkbookRead(#[from] calamine::Error),

    #[error("Workbook write error: {0}")]
    WorkbookWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl StockReconError {
    pub fn schema(stage: impl Into<String>, missing: Vec<String>) -> Self {
        Self::Schema {
            stage: stage.into(),
            missing,
        }
    }
}

pub type Result<T> = std::result::Result<T, StockReconError>;
