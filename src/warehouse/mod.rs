mod client;

use std::fmt;

use async_trait::async_trait;

use crate::error::Result;
use crate::path::{source_uri_in, ExportTimestamp, NamespaceScope};
use crate::wait::WaitOptions;

pub use client::BqClient;

/// `sourceFormat` values the refresh can load from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    DatastoreBackup,
}

impl SourceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::DatastoreBackup => "DATASTORE_BACKUP",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub source_uri: String,
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    pub source_format: SourceFormat,
}

impl LoadRequest {
    /// Load of the per-kind export descriptor written under `timestamp`.
    pub fn from_export(
        project_id: impl Into<String>,
        bucket: &str,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
        timestamp: &ExportTimestamp,
        scope: &NamespaceScope,
    ) -> Self {
        let table_id = table_id.into();
        Self {
            source_uri: source_uri_in(scope, bucket, timestamp, &table_id),
            project_id: project_id.into(),
            dataset_id: dataset_id.into(),
            table_id,
            source_format: SourceFormat::DatastoreBackup,
        }
    }

    pub fn destination(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub job_id: String,
    pub source_uri: String,
    pub destination: String,
}

#[async_trait]
pub trait DeleteTable: Send + Sync {
    async fn delete_table(&self, dataset_id: &str, table_id: &str) -> Result<()>;
}

/// Inserts a load job and blocks until BigQuery reports it DONE.
#[async_trait]
pub trait LoadFromUri: Send + Sync {
    async fn load_from_uri(&self, request: &LoadRequest, wait: &WaitOptions) -> Result<LoadOutcome>;
}
