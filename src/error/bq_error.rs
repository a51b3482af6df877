use std::fmt;

#[derive(Debug, Clone)]
pub enum BigQueryError {
    AuthenticationFailed {
        reason: String,
        help: String,
    },

    TableNotFound {
        project: String,
        dataset: String,
        table: String,
    },

    DatasetNotFound {
        project: String,
        dataset: String,
    },

    AccessDenied {
        resource: String,
        required_permission: Option<String>,
    },

    QuotaExceeded {
        quota_type: String,
        message: String,
    },

    Timeout {
        operation: String,
        duration_ms: Option<u64>,
    },

    /// A load job reached the DONE state with an `errorResult`.
    LoadFailed {
        job_id: String,
        reason: Option<String>,
        message: String,
        location: Option<String>,
    },

    ConnectionFailed {
        reason: String,
    },

    InvalidCredentials {
        path: Option<String>,
        reason: String,
    },

    Unknown {
        code: Option<String>,
        message: String,
        raw_error: String,
    },
}

impl BigQueryError {
    /// True for the conditions a table delete treats as "already gone".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BigQueryError::TableNotFound { .. } | BigQueryError::DatasetNotFound { .. }
        ) || matches!(self, BigQueryError::Unknown { code: Some(c), .. } if c == "notFound")
    }

    pub fn suggestion(&self) -> String {
        match self {
            BigQueryError::AuthenticationFailed { .. } => {
                "Try:\n  \
                 • Run: gcloud auth application-default login\n  \
                 • Or set GOOGLE_APPLICATION_CREDENTIALS to your service account key file".to_string()
            }

            BigQueryError::TableNotFound { project, dataset, table } => {
                format!(
                    "Verify the table exists:\n  \
                     • Run: bq show {project}:{dataset}.{table}\n  \
                     • Check for typos in the table id\n  \
                     • Ensure you have access to the dataset"
                )
            }

            BigQueryError::DatasetNotFound { project, dataset } => {
                format!(
                    "Create the destination dataset first:\n  \
                     • Run: bq mk --dataset {project}:{dataset}\n  \
                     • Check for typos in the dataset id\n  \
                     • Ensure you have access to the project"
                )
            }

            BigQueryError::AccessDenied { resource, required_permission } => {
                let perm = required_permission.as_deref().unwrap_or("bigquery.jobs.create");
                format!(
                    "Request access to {resource}:\n  \
                     • Required permission: {perm}\n  \
                     • Loading needs roles/bigquery.dataEditor and storage.objects.get on the bucket\n  \
                     • Or run: gcloud projects add-iam-policy-binding PROJECT_ID \\\n    \
                       --member=user:YOUR_EMAIL --role=roles/bigquery.dataEditor"
                )
            }

            BigQueryError::QuotaExceeded { quota_type, .. } => {
                format!(
                    "Quota '{quota_type}' exceeded:\n  \
                     • Wait and rerun the refresh later\n  \
                     • Request quota increase in Cloud Console"
                )
            }

            BigQueryError::Timeout { operation, .. } => {
                format!(
                    "BigQuery gave up on '{operation}' server-side:\n  \
                     • Rerun the refresh; the request itself was not rejected\n  \
                     • Check the BigQuery status page if it keeps happening"
                )
            }

            BigQueryError::LoadFailed { job_id, .. } => {
                format!(
                    "Load job {job_id} failed:\n  \
                     • Run: bq show -j {job_id}\n  \
                     • Verify the export metadata file exists in the bucket\n  \
                     • The kind segment of the source URI must match an exported kind"
                )
            }

            BigQueryError::ConnectionFailed { .. } => {
                "Connection failed:\n  \
                 • Check your internet connection\n  \
                 • Verify BigQuery API is enabled for your project\n  \
                 • Try again in a few moments".to_string()
            }

            BigQueryError::InvalidCredentials { path, .. } => {
                let path_info = path.as_ref()
                    .map(|p| format!(" ({})", p))
                    .unwrap_or_default();
                format!(
                    "Invalid credentials{path_info}:\n  \
                     • Check GOOGLE_APPLICATION_CREDENTIALS path\n  \
                     • Verify the service account key is valid\n  \
                     • Run: gcloud auth application-default login"
                )
            }

            BigQueryError::Unknown { .. } => {
                "An unexpected error occurred:\n  \
                 • Check the error message for details\n  \
                 • Check BigQuery status: https://status.cloud.google.com/".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            BigQueryError::AuthenticationFailed { .. } => "AUTH_FAILED",
            BigQueryError::TableNotFound { .. } => "TABLE_NOT_FOUND",
            BigQueryError::DatasetNotFound { .. } => "DATASET_NOT_FOUND",
            BigQueryError::AccessDenied { .. } => "ACCESS_DENIED",
            BigQueryError::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
            BigQueryError::Timeout { .. } => "TIMEOUT",
            BigQueryError::LoadFailed { .. } => "LOAD_FAILED",
            BigQueryError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            BigQueryError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            BigQueryError::Unknown { .. } => "UNKNOWN",
        }
    }
}

impl fmt::Display for BigQueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BigQueryError::AuthenticationFailed { reason, .. } => {
                write!(f, "Authentication failed: {reason}")
            }

            BigQueryError::TableNotFound { project, dataset, table } => {
                write!(f, "Table not found: {project}.{dataset}.{table}")
            }

            BigQueryError::DatasetNotFound { project, dataset } => {
                write!(f, "Dataset not found: {project}.{dataset}")
            }

            BigQueryError::AccessDenied { resource, required_permission } => {
                write!(f, "Access denied to {resource}")?;
                if let Some(perm) = required_permission {
                    write!(f, " (requires {perm})")?;
                }
                Ok(())
            }

            BigQueryError::QuotaExceeded { quota_type, message } => {
                write!(f, "Quota exceeded ({quota_type}): {message}")
            }

            BigQueryError::Timeout { operation, duration_ms } => {
                write!(f, "Timeout during {operation}")?;
                if let Some(ms) = duration_ms {
                    write!(f, " (after {}ms)", ms)?;
                }
                Ok(())
            }

            BigQueryError::LoadFailed { job_id, reason, message, location } => {
                write!(f, "Load job {job_id} failed")?;
                if let Some(r) = reason {
                    write!(f, " [{r}]")?;
                }
                write!(f, ": {message}")?;
                if let Some(loc) = location {
                    write!(f, " (at {loc})")?;
                }
                Ok(())
            }

            BigQueryError::ConnectionFailed { reason } => {
                write!(f, "Connection failed: {reason}")
            }

            BigQueryError::InvalidCredentials { reason, path } => {
                write!(f, "Invalid credentials: {reason}")?;
                if let Some(p) = path {
                    write!(f, " (path: {p})")?;
                }
                Ok(())
            }

            BigQueryError::Unknown { code, message, .. } => {
                if let Some(c) = code {
                    write!(f, "BigQuery error [{c}]: {message}")
                } else {
                    write!(f, "BigQuery error: {message}")
                }
            }
        }
    }
}

impl std::error::Error for BigQueryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(BigQueryError::TableNotFound {
            project: "p".into(),
            dataset: "d".into(),
            table: "t".into(),
        }.error_code(), "TABLE_NOT_FOUND");

        assert_eq!(BigQueryError::DatasetNotFound {
            project: "p".into(),
            dataset: "d".into(),
        }.error_code(), "DATASET_NOT_FOUND");

        assert_eq!(BigQueryError::LoadFailed {
            job_id: "j".into(),
            reason: None,
            message: "m".into(),
            location: None,
        }.error_code(), "LOAD_FAILED");

        assert_eq!(BigQueryError::Unknown {
            code: None,
            message: "m".into(),
            raw_error: "r".into(),
        }.error_code(), "UNKNOWN");
    }

    #[test]
    fn test_display_table_not_found() {
        let err = BigQueryError::TableNotFound {
            project: "my-project".into(),
            dataset: "bq_dataset_id".into(),
            table: "bq_table_id".into(),
        };
        assert_eq!(err.to_string(), "Table not found: my-project.bq_dataset_id.bq_table_id");
    }

    #[test]
    fn test_display_load_failed() {
        let err = BigQueryError::LoadFailed {
            job_id: "ds2bq_load_1".into(),
            reason: Some("notFound".into()),
            message: "Not found: URI gs://b/x".into(),
            location: Some("gs://b/x".into()),
        };
        assert_eq!(
            err.to_string(),
            "Load job ds2bq_load_1 failed [notFound]: Not found: URI gs://b/x (at gs://b/x)"
        );
    }

    #[test]
    fn test_display_timeout_with_duration() {
        let err = BigQueryError::Timeout {
            operation: "load".into(),
            duration_ms: Some(30000),
        };
        assert_eq!(err.to_string(), "Timeout during load (after 30000ms)");
        assert!(!err.suggestion().contains("--load-timeout"));
    }

    #[test]
    fn test_is_not_found() {
        assert!(BigQueryError::TableNotFound {
            project: "p".into(),
            dataset: "d".into(),
            table: "t".into(),
        }.is_not_found());

        assert!(BigQueryError::Unknown {
            code: Some("notFound".into()),
            message: "gone".into(),
            raw_error: "gone".into(),
        }.is_not_found());

        assert!(!BigQueryError::AccessDenied {
            resource: "r".into(),
            required_permission: None,
        }.is_not_found());
    }

    #[test]
    fn test_suggestion_load_failed() {
        let err = BigQueryError::LoadFailed {
            job_id: "job_42".into(),
            reason: None,
            message: "bad".into(),
            location: None,
        };
        assert!(err.suggestion().contains("bq show -j job_42"));
    }

    #[test]
    fn test_suggestion_dataset_not_found() {
        let err = BigQueryError::DatasetNotFound {
            project: "proj".into(),
            dataset: "ds".into(),
        };
        assert!(err.suggestion().contains("bq mk --dataset proj:ds"));
    }
}
