use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArchgateError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Contract error: {0}")]
    ContractError(String),
    #[error("Not found: {0}")]
    NotFound(String),
}
