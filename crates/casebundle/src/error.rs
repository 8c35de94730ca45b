use std::path::PathBuf;
use thiserror::Error;

use crate::bundle::BundleStatus;

#[derive(Error, Debug)]
pub enum CaseBundleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bundle error: {0}")]
    Bundle(#[from] BundleError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to install logging: {0}")]
    Telemetry(String),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Errors raised while building a ZIP container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    #[error("Duplicate archive path: {path}")]
    DuplicatePath { path: String },

    #[error("Invalid archive path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Archive too large: {0}")]
    TooLarge(String),
}

/// Errors raised while reading or rewriting an existing PDF.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdfError {
    #[error("Malformed input PDF: {0}")]
    Malformed(String),

    #[error("Failed to serialize PDF: {0}")]
    Save(String),

    #[error("Bates counter exhausted after {last}")]
    CounterExhausted { last: u64 },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Blob not found: {bucket}/{path}")]
    NotFound { bucket: String, path: String },

    #[error("Invalid blob path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("Failed to read blob '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write blob '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors from bundle intake, assembly and export.
///
/// The `Display` text of a variant is what ends up in a failed job's
/// `error` column, so messages name the offending source.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Archive construction failed: {0}")]
    Container(#[from] ContainerError),

    #[error("Failed to fetch {source_label}: {error}")]
    SourceFetch {
        source_label: String,
        #[source]
        error: StorageError,
    },

    #[error("Source {kind} '{id}' no longer exists in case {case_id}")]
    SourceMissing {
        kind: &'static str,
        id: String,
        case_id: String,
    },

    #[error("Malformed input PDF in {source_label}: {reason}")]
    MalformedInputPdf { source_label: String, reason: String },

    #[error("Invalid bundle options: {0}")]
    InvalidOptions(String),

    #[error("Invalid job transition from {from} to {to}")]
    InvalidTransition { from: BundleStatus, to: BundleStatus },

    #[error("Bundle job '{0}' not found")]
    JobNotFound(String),

    #[error("Bundle job '{id}' is not ready (status: {status})")]
    NotReady { id: String, status: BundleStatus },

    #[error("Bundle job timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Failed to upload bundle: {0}")]
    Upload(#[source] StorageError),

    #[error("Record store error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Bundle processing failed: {0}")]
    Processing(String),
}

impl BundleError {
    pub fn source_fetch(source_label: impl Into<String>, error: StorageError) -> Self {
        BundleError::SourceFetch {
            source_label: source_label.into(),
            error,
        }
    }

    pub fn malformed_pdf(source_label: impl Into<String>, error: PdfError) -> Self {
        let reason = match error {
            PdfError::Malformed(reason) | PdfError::Save(reason) => reason,
            other => other.to_string(),
        };
        BundleError::MalformedInputPdf {
            source_label: source_label.into(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, CaseBundleError>;
