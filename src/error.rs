use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum MineError {
    #[error("invalid UniProt accession: {0}")]
    InvalidAccession(String),

    #[error("invalid UniRef50 id: {0}")]
    InvalidSecondaryId(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid run parameter: {0}")]
    InvalidParameter(String),

    #[error("column '{column}' not found in {file}")]
    MissingColumn { file: String, column: String },

    #[error("failed to read table: {0}")]
    TableRead(String),

    #[error("uniprot request failed: {0}")]
    UniprotHttp(String),

    #[error("uniprot returned status {status}: {message}")]
    UniprotStatus { status: u16, message: String },

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
