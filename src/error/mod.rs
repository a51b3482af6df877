mod bq_error;
mod datastore_error;
mod parser;

use thiserror::Error;

pub use bq_error::BigQueryError;
pub use datastore_error::DatastoreError;
pub use parser::{parse_bq_error, parse_job_error, ErrorContext};

#[derive(Error, Debug)]
pub enum Ds2BqError {
    #[error("BigQuery error: {0}")]
    BigQuery(#[from] BigQueryError),

    #[error("Datastore error: {0}")]
    Datastore(#[from] DatastoreError),

    #[error("Malformed export URL '{url}': {reason}")]
    MalformedExportUrl { url: String, reason: String },

    #[error("Timed out waiting for {operation} after {}s", .duration.as_secs())]
    Timeout {
        operation: String,
        duration: std::time::Duration,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Ds2BqError {
    /// Hint for errors that carry no service-specific suggestion.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Ds2BqError::Timeout { operation, .. } => Some(format!(
                "Stopped waiting for the {operation}; the remote operation keeps running:\n\
                 • Raise the limit with --{operation}-timeout or {operation}_wait.timeout_secs\n\
                 • Check the operation in the Cloud console before rerunning"
            )),
            Ds2BqError::MalformedExportUrl { .. } => Some(
                "Expected gs://<bucket>/<timestamp>/<timestamp>.overall_export_metadata\n\
                 • The destination table was already deleted; rerun once the export URL is fixed"
                    .to_string(),
            ),
            _ => None,
        }
    }

    pub fn malformed_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Ds2BqError::MalformedExportUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Ds2BqError>;
