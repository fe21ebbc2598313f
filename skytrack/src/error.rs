use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Agent error: {0}")]
    Agent(#[from] agent::Error),

    #[error("Json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to read store at {path}: {source}")]
    StoreRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to persist store to {path}: {source}")]
    StoreWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unknown category `{0}`, expected basic_info, technical_specs or launch_cost_info")]
    UnknownCategory(String),

    #[error("No stored data for satellite {0}")]
    NoData(String),

    #[error("Http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Spreadsheet append failed with status {status}; offending row: {row}")]
    SheetPush { status: String, row: String },

    #[error("IO Error: {0}")]
    IO(#[from] std::io::Error),
}
