mod datastore;
mod operation;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::path::NamespaceScope;
use crate::wait::WaitOptions;

pub use datastore::{Credentials, DatastoreAdminClient, DATASTORE_ENDPOINT, DATASTORE_SCOPE};
pub use operation::{ExportEntitiesMetadata, ExportEntitiesResponse, Operation, Status};

/// Request body of `projects/{project}:export`, plus the project it targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportRequest {
    #[serde(skip)]
    pub project_id: String,
    pub output_url_prefix: String,
    pub entity_filter: EntityFilter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityFilter {
    pub kinds: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub namespace_ids: Vec<String>,
}

impl ExportRequest {
    pub fn new(
        project_id: impl Into<String>,
        kind: impl Into<String>,
        bucket: &str,
        namespace: &NamespaceScope,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            output_url_prefix: format!("gs://{}", bucket),
            entity_filter: EntityFilter {
                kinds: vec![kind.into()],
                namespace_ids: namespace.namespace_ids(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResponse {
    pub operation: String,
    pub output_url: String,
}

/// Starts a managed export and blocks until it finishes.
///
/// Implementations poll at `wait.poll_interval`; the caller enforces
/// `wait.timeout`.
#[async_trait]
pub trait ExportEntities: Send + Sync {
    async fn export_entities(&self, request: &ExportRequest, wait: &WaitOptions) -> Result<ExportResponse>;
}
