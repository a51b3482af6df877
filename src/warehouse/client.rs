use async_trait::async_trait;
use gcp_bigquery_client::Client;
use gcp_bigquery_client::model::job::Job;
use gcp_bigquery_client::model::job_configuration::JobConfiguration;
use gcp_bigquery_client::model::job_configuration_load::JobConfigurationLoad;
use gcp_bigquery_client::model::job_reference::JobReference;
use gcp_bigquery_client::model::table_reference::TableReference;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Ds2BqError, Result, parse_bq_error, parse_job_error, ErrorContext};
use crate::wait::WaitOptions;
use super::{DeleteTable, LoadFromUri, LoadOutcome, LoadRequest};

const JOB_ID_PREFIX: &str = "ds2bq_load";

#[derive(Clone)]
pub struct BqClient {
    client: Client,
    project_id: String,
}

impl BqClient {
    pub async fn new(project_id: impl Into<String>) -> Result<Self> {
        let client = Client::from_application_default_credentials()
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new().with_operation("client_init");
                Ds2BqError::BigQuery(parse_bq_error(e, ctx))
            })?;

        Ok(Self {
            client,
            project_id: project_id.into(),
        })
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn new_job_id() -> String {
        format!("{}_{}", JOB_ID_PREFIX, Uuid::new_v4().simple())
    }

    fn build_load_job(request: &LoadRequest, job_id: &str) -> Job {
        let load = JobConfigurationLoad {
            source_uris: Some(vec![request.source_uri.clone()]),
            source_format: Some(request.source_format.as_str().to_string()),
            destination_table: Some(TableReference::new(
                &request.project_id,
                &request.dataset_id,
                &request.table_id,
            )),
            ..Default::default()
        };

        Job {
            job_reference: Some(JobReference {
                job_id: Some(job_id.to_string()),
                project_id: Some(request.project_id.clone()),
                ..Default::default()
            }),
            configuration: Some(JobConfiguration {
                load: Some(load),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    async fn insert_load_job(&self, request: &LoadRequest, job_id: &str) -> Result<Job> {
        let job = Self::build_load_job(request, job_id);

        self.client
            .job()
            .insert(&request.project_id, job)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new()
                    .with_operation("insert_load_job")
                    .with_table(&request.project_id, &request.dataset_id, &request.table_id)
                    .with_job(job_id);
                Ds2BqError::BigQuery(parse_bq_error(e, ctx))
            })
    }

    async fn get_job(&self, project_id: &str, job_id: &str, location: Option<&str>) -> Result<Job> {
        self.client
            .job()
            .get_job(project_id, job_id, location)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new()
                    .with_operation("get_job")
                    .with_job(job_id);
                Ds2BqError::BigQuery(parse_bq_error(e, ctx))
            })
    }
}

fn job_state(job: &Job) -> Option<&str> {
    job.status.as_ref().and_then(|s| s.state.as_deref())
}

#[async_trait]
impl DeleteTable for BqClient {
    async fn delete_table(&self, dataset_id: &str, table_id: &str) -> Result<()> {
        self.client
            .table()
            .delete(&self.project_id, dataset_id, table_id)
            .await
            .map_err(|e| {
                let ctx = ErrorContext::new()
                    .with_operation("delete_table")
                    .with_table(&self.project_id, dataset_id, table_id);
                Ds2BqError::BigQuery(parse_bq_error(e, ctx))
            })
    }
}

#[async_trait]
impl LoadFromUri for BqClient {
    async fn load_from_uri(&self, request: &LoadRequest, wait: &WaitOptions) -> Result<LoadOutcome> {
        let job_id = Self::new_job_id();
        let mut job = self.insert_load_job(request, &job_id).await?;
        info!("Started load job {} into {}", job_id, request.destination());

        let location = job
            .job_reference
            .as_ref()
            .and_then(|r| r.location.clone());

        while job_state(&job) != Some("DONE") {
            debug!("Load job {} state: {}", job_id, job_state(&job).unwrap_or("UNKNOWN"));
            tokio::time::sleep(wait.poll_interval).await;
            job = self.get_job(&request.project_id, &job_id, location.as_deref()).await?;
        }

        if let Some(error) = job.status.as_ref().and_then(|s| s.error_result.as_ref()) {
            let ctx = ErrorContext::new()
                .with_operation("load")
                .with_table(&request.project_id, &request.dataset_id, &request.table_id)
                .with_job(&job_id);
            return Err(Ds2BqError::BigQuery(parse_job_error(error, ctx)));
        }

        Ok(LoadOutcome {
            job_id,
            source_uri: request.source_uri.clone(),
            destination: request.destination(),
        })
    }
}
