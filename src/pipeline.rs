use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;
use tabled::Tabled;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{Ds2BqError, Result};
use crate::export::{ExportEntities, ExportRequest, ExportResponse};
use crate::path::{source_uri_in, ExportTimestamp};
use crate::wait::bounded;
use crate::warehouse::{DeleteTable, LoadFromUri, LoadOutcome, LoadRequest, SourceFormat};

/// Result of the best-effort table delete. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Absent(String),
    Failed(String),
}

impl fmt::Display for DeleteOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeleteOutcome::Deleted => f.write_str("deleted"),
            DeleteOutcome::Absent(reason) => write!(f, "absent ({})", reason),
            DeleteOutcome::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepTimings {
    pub export: Duration,
    pub delete: Duration,
    pub load: Duration,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub export: ExportResponse,
    pub timestamp: ExportTimestamp,
    pub delete: DeleteOutcome,
    pub load: LoadOutcome,
    pub timings: StepTimings,
}

#[derive(Debug, Clone, Tabled)]
pub struct StepRow {
    #[tabled(rename = "Step")]
    pub step: String,
    #[tabled(rename = "Target")]
    pub target: String,
    #[tabled(rename = "Result")]
    pub result: String,
    #[tabled(rename = "Elapsed")]
    pub elapsed: String,
}

impl PipelineReport {
    pub fn rows(&self) -> Vec<StepRow> {
        vec![
            StepRow {
                step: "export".into(),
                target: self.export.operation.clone(),
                result: self.export.output_url.clone(),
                elapsed: format!("{:.1}s", self.timings.export.as_secs_f64()),
            },
            StepRow {
                step: "delete".into(),
                target: self.load.destination.clone(),
                result: self.delete.to_string(),
                elapsed: format!("{:.1}s", self.timings.delete.as_secs_f64()),
            },
            StepRow {
                step: "load".into(),
                target: self.load.destination.clone(),
                result: format!("job {}", self.load.job_id),
                elapsed: format!("{:.1}s", self.timings.load.as_secs_f64()),
            },
        ]
    }
}

/// What a run would request, derived without contacting any service.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub project_id: String,
    pub kind: String,
    pub namespace: String,
    pub output_url_prefix: String,
    pub export_timeout_secs: Option<u64>,
    pub delete_table: String,
    pub load_destination: String,
    pub load_timeout_secs: Option<u64>,
    pub source_format: String,
    /// Present when an export output URL was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_source_uri: Option<String>,
}

impl Plan {
    pub fn new(config: &PipelineConfig, output_url: Option<&str>) -> Result<Self> {
        let timestamp = output_url
            .map(ExportTimestamp::from_output_url)
            .transpose()?;

        let load_source_uri = timestamp.as_ref().map(|ts| {
            source_uri_in(&config.namespace, &config.bucket, ts, &config.table_id)
        });

        Ok(Self {
            project_id: config.project_id.clone(),
            kind: config.kind.clone(),
            namespace: config.namespace.to_string(),
            output_url_prefix: config.output_url_prefix(),
            export_timeout_secs: config.export_wait.timeout_secs,
            delete_table: format!("{}.{}", config.dataset_id, config.table_id),
            load_destination: config.destination(),
            load_timeout_secs: config.load_wait.timeout_secs,
            source_format: SourceFormat::DatastoreBackup.to_string(),
            timestamp: timestamp.map(|ts| ts.to_string()),
            load_source_uri,
        })
    }
}

/// Export → delete → load, strictly in that order.
pub struct Pipeline<E, D, L> {
    config: PipelineConfig,
    exporter: E,
    deleter: D,
    loader: L,
}

impl<E, D, L> Pipeline<E, D, L>
where
    E: ExportEntities,
    D: DeleteTable,
    L: LoadFromUri,
{
    pub fn new(config: PipelineConfig, exporter: E, deleter: D, loader: L) -> Self {
        Self { config, exporter, deleter, loader }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<PipelineReport> {
        let mut timings = StepTimings::default();

        let started = Instant::now();
        let export = self.export().await?;
        timings.export = started.elapsed();

        let started = Instant::now();
        let delete = self.delete_destination().await;
        timings.delete = started.elapsed();

        let timestamp = ExportTimestamp::from_output_url(&export.output_url)?;
        if let Some(at) = timestamp.exported_at() {
            info!("Export timestamp {} ({})", timestamp, at);
        }

        let started = Instant::now();
        let load = self.load(&timestamp).await?;
        timings.load = started.elapsed();

        Ok(PipelineReport { export, timestamp, delete, load, timings })
    }

    pub fn export_request(&self) -> ExportRequest {
        ExportRequest::new(
            &self.config.project_id,
            &self.config.kind,
            &self.config.bucket,
            &self.config.namespace,
        )
    }

    pub async fn export(&self) -> Result<ExportResponse> {
        let request = self.export_request();
        let wait = self.config.export_wait.to_options();

        info!(
            "Exporting {} entities in {} to Cloud Storage bucket {}.",
            self.config.kind, self.config.namespace, self.config.bucket
        );

        let response = bounded(
            "export",
            wait.timeout,
            self.exporter.export_entities(&request, &wait),
        )
        .await?;

        info!("Export finished: operation={} output_url={}", response.operation, response.output_url);
        Ok(response)
    }

    pub async fn delete_destination(&self) -> DeleteOutcome {
        let dataset_id = &self.config.dataset_id;
        let table_id = &self.config.table_id;

        match self.deleter.delete_table(dataset_id, table_id).await {
            Ok(()) => {
                info!("Deleted BigQuery table '{}' from dataset '{}'.", table_id, dataset_id);
                DeleteOutcome::Deleted
            }
            Err(Ds2BqError::BigQuery(e)) if e.is_not_found() => {
                info!(
                    "BigQuery table '{}' in dataset '{}' does not exist, nothing to delete: {}",
                    table_id, dataset_id, e
                );
                DeleteOutcome::Absent(e.to_string())
            }
            Err(e) => {
                warn!(
                    "An error occurred while deleting table '{}' from dataset '{}': {}",
                    table_id, dataset_id, e
                );
                DeleteOutcome::Failed(e.to_string())
            }
        }
    }

    pub fn load_request(&self, timestamp: &ExportTimestamp) -> LoadRequest {
        LoadRequest::from_export(
            &self.config.project_id,
            &self.config.bucket,
            &self.config.dataset_id,
            &self.config.table_id,
            timestamp,
            &self.config.namespace,
        )
    }

    pub async fn load(&self, timestamp: &ExportTimestamp) -> Result<LoadOutcome> {
        let request = self.load_request(timestamp);
        let wait = self.config.load_wait.to_options();

        info!("Loading {} into {}", request.source_uri, request.destination());

        let outcome = bounded(
            "load",
            wait.timeout,
            self.loader.load_from_uri(&request, &wait),
        )
        .await?;

        info!(
            "Imported data from Google Cloud Storage bucket '{}' to BigQuery table '{}'.",
            self.config.bucket, self.config.table_id
        );
        Ok(outcome)
    }
}
