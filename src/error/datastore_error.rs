use std::fmt;

#[derive(Debug, Clone)]
pub enum DatastoreError {
    AuthenticationFailed {
        reason: String,
    },

    /// Non-success HTTP status from the Datastore Admin API.
    Http {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// The export operation finished with an error status.
    OperationFailed {
        operation: String,
        code: i32,
        message: String,
    },

    ConnectionFailed {
        reason: String,
    },

    InvalidResponse {
        message: String,
    },
}

impl DatastoreError {
    pub fn suggestion(&self) -> String {
        match self {
            DatastoreError::AuthenticationFailed { .. } => {
                "Try:\n  \
                 • Run: gcloud auth application-default login\n  \
                 • Or set GOOGLE_APPLICATION_CREDENTIALS to your service account key file".to_string()
            }

            DatastoreError::Http { status: 403, .. } => {
                "Permission denied:\n  \
                 • The caller needs roles/datastore.importExportAdmin\n  \
                 • The Datastore service agent needs write access to the bucket".to_string()
            }

            DatastoreError::Http { status: 404, .. } => {
                "Not found:\n  \
                 • Check the project id\n  \
                 • Verify the Datastore Admin API is enabled for the project".to_string()
            }

            DatastoreError::Http { .. } => {
                "The export request was rejected:\n  \
                 • Check the error message for details\n  \
                 • Check Datastore status: https://status.cloud.google.com/".to_string()
            }

            DatastoreError::OperationFailed { operation, .. } => {
                format!(
                    "Export operation failed:\n  \
                     • Run: gcloud datastore operations describe {operation}\n  \
                     • Verify the bucket exists and is in a compatible location"
                )
            }

            DatastoreError::ConnectionFailed { .. } => {
                "Connection failed:\n  \
                 • Check your internet connection\n  \
                 • Try again in a few moments".to_string()
            }

            DatastoreError::InvalidResponse { .. } => {
                "Unexpected response from the Datastore Admin API:\n  \
                 • Rerun with --verbose to see the raw operation".to_string()
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DatastoreError::AuthenticationFailed { .. } => "AUTH_FAILED",
            DatastoreError::Http { .. } => "HTTP_ERROR",
            DatastoreError::OperationFailed { .. } => "EXPORT_FAILED",
            DatastoreError::ConnectionFailed { .. } => "CONNECTION_FAILED",
            DatastoreError::InvalidResponse { .. } => "INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for DatastoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatastoreError::AuthenticationFailed { reason } => {
                write!(f, "Authentication failed: {reason}")
            }

            DatastoreError::Http { status, code, message } => {
                write!(f, "HTTP {status}")?;
                if let Some(c) = code {
                    write!(f, " {c}")?;
                }
                write!(f, ": {message}")
            }

            DatastoreError::OperationFailed { operation, code, message } => {
                write!(f, "Operation {operation} failed with code {code}: {message}")
            }

            DatastoreError::ConnectionFailed { reason } => {
                write!(f, "Connection failed: {reason}")
            }

            DatastoreError::InvalidResponse { message } => {
                write!(f, "Invalid response: {message}")
            }
        }
    }
}

impl std::error::Error for DatastoreError {}

impl From<reqwest::Error> for DatastoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            DatastoreError::InvalidResponse { message: err.to_string() }
        } else {
            DatastoreError::ConnectionFailed { reason: err.to_string() }
        }
    }
}

impl From<gcp_auth::Error> for DatastoreError {
    fn from(err: gcp_auth::Error) -> Self {
        DatastoreError::AuthenticationFailed { reason: err.to_string() }
    }
}
