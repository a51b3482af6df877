use serde::{Deserialize, Serialize};

use crate::error::DatastoreError;

/// `google.longrunning.Operation` as returned by the Datastore Admin REST API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub metadata: Option<ExportEntitiesMetadata>,
    #[serde(default)]
    pub error: Option<Status>,
    #[serde(default)]
    pub response: Option<ExportEntitiesResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntitiesMetadata {
    #[serde(default)]
    pub common: Option<CommonMetadata>,
    #[serde(default)]
    pub progress_entities: Option<Progress>,
    #[serde(default)]
    pub output_url_prefix: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommonMetadata {
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub operation_type: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

/// Int64 fields arrive as JSON strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    #[serde(default)]
    pub work_completed: Option<String>,
    #[serde(default)]
    pub work_estimated: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportEntitiesResponse {
    #[serde(default)]
    pub output_url: Option<String>,
}

/// `google.rpc.Status`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// Body of a non-2xx Google API response: `{"error": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl Operation {
    /// Output URL of a finished operation, or the failure it reported.
    pub fn into_output_url(self) -> Result<String, DatastoreError> {
        if let Some(status) = self.error {
            return Err(DatastoreError::OperationFailed {
                operation: self.name,
                code: status.code,
                message: status.message,
            });
        }

        self.response
            .and_then(|r| r.output_url)
            .ok_or_else(|| DatastoreError::InvalidResponse {
                message: format!("operation {} finished without an outputUrl", self.name),
            })
    }

    pub fn progress(&self) -> Option<(String, String)> {
        let p = self.metadata.as_ref()?.progress_entities.as_ref()?;
        Some((
            p.work_completed.clone().unwrap_or_else(|| "0".into()),
            p.work_estimated.clone().unwrap_or_else(|| "?".into()),
        ))
    }
}
