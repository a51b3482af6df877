use std::sync::Arc;

use async_trait::async_trait;
use gcp_auth::TokenProvider;
use tracing::{debug, info};

use crate::error::{DatastoreError, Result};
use crate::wait::WaitOptions;
use super::operation::{ApiErrorBody, Operation};
use super::{ExportEntities, ExportRequest, ExportResponse};

pub const DATASTORE_ENDPOINT: &str = "https://datastore.googleapis.com";
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

/// Source of the bearer token sent to the Datastore Admin API.
#[derive(Clone)]
pub enum Credentials {
    ApplicationDefault(Arc<dyn TokenProvider>),
    Static(String),
}

impl Credentials {
    pub async fn application_default() -> Result<Self> {
        let provider = gcp_auth::provider().await.map_err(DatastoreError::from)?;
        Ok(Credentials::ApplicationDefault(provider))
    }

    async fn bearer(&self) -> Result<String> {
        match self {
            Credentials::ApplicationDefault(provider) => {
                let token = provider
                    .token(&[DATASTORE_SCOPE])
                    .await
                    .map_err(DatastoreError::from)?;
                Ok(token.as_str().to_string())
            }
            Credentials::Static(token) => Ok(token.clone()),
        }
    }
}

/// Datastore Admin REST v1 client covering the export half of the refresh.
#[derive(Clone)]
pub struct DatastoreAdminClient {
    http: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl DatastoreAdminClient {
    pub async fn new() -> Result<Self> {
        let credentials = Credentials::application_default().await?;
        Ok(Self::with_endpoint(DATASTORE_ENDPOINT, credentials))
    }

    pub fn with_endpoint(endpoint: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            credentials,
        }
    }

    pub async fn start_export(&self, request: &ExportRequest) -> Result<Operation> {
        let url = format!("{}/v1/projects/{}:export", self.endpoint, request.project_id);
        let token = self.credentials.bearer().await?;

        let resp = self.http
            .post(&url)
            .bearer_auth(token)
            .json(request)
            .send()
            .await
            .map_err(DatastoreError::from)?;

        read_operation(resp).await
    }

    pub async fn get_operation(&self, name: &str) -> Result<Operation> {
        let url = format!("{}/v1/{}", self.endpoint, name);
        let token = self.credentials.bearer().await?;

        let resp = self.http
            .get(&url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(DatastoreError::from)?;

        read_operation(resp).await
    }
}

async fn read_operation(resp: reqwest::Response) -> Result<Operation> {
    let status = resp.status();
    if status.is_success() {
        let op = resp.json::<Operation>().await.map_err(DatastoreError::from)?;
        return Ok(op);
    }

    let body = resp.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => (parsed.error.status, parsed.error.message),
        Err(_) => (None, body),
    };

    Err(DatastoreError::Http {
        status: status.as_u16(),
        code,
        message,
    }
    .into())
}

#[async_trait]
impl ExportEntities for DatastoreAdminClient {
    async fn export_entities(&self, request: &ExportRequest, wait: &WaitOptions) -> Result<ExportResponse> {
        let mut op = self.start_export(request).await?;
        info!("Started export operation {}", op.name);

        while !op.done {
            if let Some((completed, estimated)) = op.progress() {
                debug!("Export {}: {}/{} entities", op.name, completed, estimated);
            }
            tokio::time::sleep(wait.poll_interval).await;
            op = self.get_operation(&op.name).await?;
        }

        let operation = op.name.clone();
        let output_url = op.into_output_url()?;

        Ok(ExportResponse { operation, output_url })
    }
}
