use gcp_bigquery_client::error::{BQError, ResponseError};
use gcp_bigquery_client::model::error_proto::ErrorProto;
use super::bq_error::BigQueryError;
use regex::Regex;

pub fn parse_bq_error(error: BQError, context: ErrorContext) -> BigQueryError {
    match &error {
        BQError::ResponseError { error: resp } => parse_response_error(resp, context),

        BQError::RequestError(req_err) => {
            BigQueryError::ConnectionFailed {
                reason: req_err.to_string(),
            }
        }

        BQError::NoToken => {
            BigQueryError::AuthenticationFailed {
                reason: "No authentication token available".to_string(),
                help: "Ensure you are authenticated with GCP".to_string(),
            }
        }

        BQError::AuthError(auth_err) => {
            BigQueryError::AuthenticationFailed {
                reason: format!("{:?}", auth_err),
                help: "Check your authentication configuration".to_string(),
            }
        }

        BQError::YupAuthError(yup_err) => {
            BigQueryError::AuthenticationFailed {
                reason: yup_err.to_string(),
                help: "OAuth authentication failed".to_string(),
            }
        }

        BQError::InvalidServiceAccountKey(io_err) => {
            BigQueryError::InvalidCredentials {
                path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
                reason: io_err.to_string(),
            }
        }

        BQError::InvalidServiceAccountAuthenticator(io_err) => {
            BigQueryError::InvalidCredentials {
                path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
                reason: io_err.to_string(),
            }
        }

        BQError::InvalidApplicationDefaultCredentialsAuthenticator(io_err) => {
            BigQueryError::AuthenticationFailed {
                reason: io_err.to_string(),
                help: "Application default credentials are invalid or not configured".to_string(),
            }
        }

        BQError::SerializationError(serde_err) => {
            BigQueryError::Unknown {
                code: Some("SERIALIZATION".to_string()),
                message: serde_err.to_string(),
                raw_error: error.to_string(),
            }
        }

        BQError::ConnectionPoolError(msg) => {
            BigQueryError::ConnectionFailed {
                reason: msg.clone(),
            }
        }

        _ => BigQueryError::Unknown {
            code: None,
            message: error.to_string(),
            raw_error: format!("{:?}", error),
        }
    }
}

/// Classifies the `errorResult` of a finished load job.
pub fn parse_job_error(proto: &ErrorProto, context: ErrorContext) -> BigQueryError {
    let message = proto.message.clone().unwrap_or_else(|| "load job failed".to_string());
    let reason = proto.reason.as_deref();

    match reason {
        Some("accessDenied") => BigQueryError::AccessDenied {
            resource: context
                .resource
                .or_else(|| proto.location.clone())
                .unwrap_or_else(|| "resource".to_string()),
            required_permission: extract_required_permission(&message),
        },

        Some("quotaExceeded") | Some("rateLimitExceeded") => BigQueryError::QuotaExceeded {
            quota_type: extract_quota_type(&message).unwrap_or_else(|| "load jobs".to_string()),
            message,
        },

        Some("notFound") if message.to_lowercase().contains("dataset") => {
            parse_not_found_error(&message, &context)
        }

        _ => BigQueryError::LoadFailed {
            job_id: context.job_id.unwrap_or_else(|| "unknown".to_string()),
            reason: reason.map(|r| r.to_string()),
            message,
            location: proto.location.clone(),
        },
    }
}

fn parse_response_error(
    resp: &ResponseError,
    context: ErrorContext,
) -> BigQueryError {
    let status = resp.error.code;
    let message = &resp.error.message;
    let errors = &resp.error.errors;

    // errors is Vec<HashMap<String, String>>
    let reason = errors.first().and_then(|e| e.get("reason").map(|s| s.as_str()));

    match (status, reason) {
        (400, Some("timeout")) => {
            BigQueryError::Timeout {
                operation: context.operation.unwrap_or_else(|| "request".to_string()),
                duration_ms: None,
            }
        }

        (403, Some("accessDenied")) => {
            let resource = context.resource.unwrap_or_else(|| "resource".to_string());
            BigQueryError::AccessDenied {
                resource,
                required_permission: extract_required_permission(message),
            }
        }

        (403, Some("quotaExceeded")) | (403, Some("rateLimitExceeded")) => {
            let quota_type = extract_quota_type(message).unwrap_or_else(|| "API".to_string());
            BigQueryError::QuotaExceeded {
                quota_type,
                message: message.clone(),
            }
        }

        (404, _) => {
            parse_not_found_error(message, &context)
        }

        (500..=599, _) => {
            BigQueryError::Unknown {
                code: Some(format!("HTTP_{}", status)),
                message: format!("BigQuery server error: {}", message),
                raw_error: format!("{:?}", resp),
            }
        }

        _ => BigQueryError::Unknown {
            code: reason.map(|s| s.to_string()),
            message: message.clone(),
            raw_error: format!("{:?}", resp),
        }
    }
}

fn parse_not_found_error(message: &str, context: &ErrorContext) -> BigQueryError {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("table") {
        // "Not found: Table project:dataset.table"
        let table_re = Regex::new(r"(?i)table\s+([^:\s]+):([^.\s]+)\.([^\s]+)").ok();
        if let Some(caps) = table_re.and_then(|re| re.captures(message)) {
            return BigQueryError::TableNotFound {
                project: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                dataset: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
                table: caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default(),
            };
        }

        if let (Some(project), Some(dataset), Some(table)) =
            (&context.project, &context.dataset, &context.table) {
            return BigQueryError::TableNotFound {
                project: project.clone(),
                dataset: dataset.clone(),
                table: table.clone(),
            };
        }
    }

    if msg_lower.contains("dataset") {
        // "Not found: Dataset project:dataset"
        let dataset_re = Regex::new(r"(?i)dataset\s+([^:\s]+):([^\s]+)").ok();
        if let Some(caps) = dataset_re.and_then(|re| re.captures(message)) {
            return BigQueryError::DatasetNotFound {
                project: caps.get(1).map(|m| m.as_str().to_string()).unwrap_or_default(),
                dataset: caps.get(2).map(|m| m.as_str().to_string()).unwrap_or_default(),
            };
        }

        if let (Some(project), Some(dataset)) = (&context.project, &context.dataset) {
            return BigQueryError::DatasetNotFound {
                project: project.clone(),
                dataset: dataset.clone(),
            };
        }
    }

    BigQueryError::Unknown {
        code: Some("notFound".to_string()),
        message: message.to_string(),
        raw_error: message.to_string(),
    }
}

fn extract_required_permission(message: &str) -> Option<String> {
    // "... requires bigquery.tables.updateData"
    let perm_re = Regex::new(r"((?:bigquery|storage)\.[a-zA-Z.]+[a-zA-Z])").ok()?;
    perm_re.captures(message)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn extract_quota_type(message: &str) -> Option<String> {
    let msg_lower = message.to_lowercase();

    if msg_lower.contains("load") {
        Some("load jobs".to_string())
    } else if msg_lower.contains("rate") {
        Some("rate limit".to_string())
    } else if msg_lower.contains("table") {
        Some("table operations".to_string())
    } else {
        None
    }
}

#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub operation: Option<String>,
    pub resource: Option<String>,
    pub project: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
    pub job_id: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_operation(mut self, op: impl Into<String>) -> Self {
        self.operation = Some(op.into());
        self
    }

    pub fn with_table(mut self, project: impl Into<String>, dataset: impl Into<String>, table: impl Into<String>) -> Self {
        let (project, dataset, table) = (project.into(), dataset.into(), table.into());
        self.resource = Some(format!("{}.{}.{}", project, dataset, table));
        self.project = Some(project);
        self.dataset = Some(dataset);
        self.table = Some(table);
        self
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }
}
