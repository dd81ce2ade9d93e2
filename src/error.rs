use std::path::PathBuf;

use thiserror::Error;

/// Every way a report run can stop.
///
/// Stages report these at their boundary; the run is abandoned and no output
/// workbook is written.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("sheet '{sheet}' not found in {}", path.display())]
    MissingSheet { path: PathBuf, sheet: String },

    #[error("column '{column}' not found (available: {})", available.join(", "))]
    MissingColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("no known loan types found on sheet '{sheet}' of {}", path.display())]
    NoOrderedCategories { path: PathBuf, sheet: String },

    #[error("no anchor cells found on sheet '{sheet}'")]
    NoAnchorsFound { sheet: String },

    #[error("malformed cell address: {0}")]
    MalformedAddress(String),

    #[error("no DD.MM.YYYY date in file name {}", .0.display())]
    MissingReportDate(PathBuf),

    #[error("workbook {}: {message}", path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
