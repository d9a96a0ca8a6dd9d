use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("CSV parse error at line {line}: {message}")]
    Parse { line: u64, message: String },

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Row {row}: cannot convert {column} value {value:?} to {expected}")]
    Coercion {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    #[error("Sale {sale_id}: missing field {column}")]
    MissingField { sale_id: i64, column: String },

    #[error("Load exceeded its execution deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, EtlError>;
