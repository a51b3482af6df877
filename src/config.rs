use std::fs;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Ds2BqError, Result};
use crate::path::NamespaceScope;
use crate::wait::{WaitConfig, DEFAULT_EXPORT_TIMEOUT_SECS};

/// Identifiers and wait parameters for one export → delete → load run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub project_id: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_dataset_id")]
    pub dataset_id: String,
    #[serde(default = "default_table_id")]
    pub table_id: String,
    #[serde(default)]
    pub namespace: NamespaceScope,
    #[serde(default = "default_export_wait", deserialize_with = "export_wait")]
    pub export_wait: WaitConfig,
    #[serde(default = "WaitConfig::unbounded", deserialize_with = "load_wait")]
    pub load_wait: WaitConfig,
}

fn default_kind() -> String {
    "ds_kind".to_string()
}

fn default_bucket() -> String {
    "gcs_bucket_name".to_string()
}

fn default_dataset_id() -> String {
    "bq_dataset_id".to_string()
}

fn default_table_id() -> String {
    "bq_table_id".to_string()
}

fn default_export_wait() -> WaitConfig {
    WaitConfig::bounded(DEFAULT_EXPORT_TIMEOUT_SECS)
}

fn export_wait<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<WaitConfig, D::Error> {
    WaitConfig::deserialize_or(d, Some(DEFAULT_EXPORT_TIMEOUT_SECS))
}

fn load_wait<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<WaitConfig, D::Error> {
    WaitConfig::deserialize_or(d, None)
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            project_id: String::new(),
            kind: default_kind(),
            bucket: default_bucket(),
            dataset_id: default_dataset_id(),
            table_id: default_table_id(),
            namespace: NamespaceScope::default(),
            export_wait: default_export_wait(),
            load_wait: WaitConfig::unbounded(),
        }
    }
}

/// Values supplied on the command line or through the environment.
/// `None` keeps whatever the file or the defaults provide.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub project_id: Option<String>,
    pub kind: Option<String>,
    pub bucket: Option<String>,
    pub dataset_id: Option<String>,
    pub table_id: Option<String>,
    pub namespace: Option<NamespaceScope>,
    pub export_timeout_secs: Option<u64>,
    pub load_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
}

impl PipelineConfig {
    pub fn new(
        project_id: impl Into<String>,
        kind: impl Into<String>,
        bucket: impl Into<String>,
        dataset_id: impl Into<String>,
        table_id: impl Into<String>,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            kind: kind.into(),
            bucket: bucket.into(),
            dataset_id: dataset_id.into(),
            table_id: table_id.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Ds2BqError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }

    /// Defaults, then the optional file, then `overrides`.
    pub fn resolve(path: Option<&Path>, overrides: ConfigOverrides) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = base.apply(overrides);

        if config.project_id.is_empty() {
            return Err(Ds2BqError::Config(
                "Project ID required (--project, GCP_PROJECT_ID or project_id in the config file)".into(),
            ));
        }

        Ok(config)
    }

    pub fn apply(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(v) = overrides.project_id {
            self.project_id = v;
        }
        if let Some(v) = overrides.kind {
            self.kind = v;
        }
        if let Some(v) = overrides.bucket {
            self.bucket = v;
        }
        if let Some(v) = overrides.dataset_id {
            self.dataset_id = v;
        }
        if let Some(v) = overrides.table_id {
            self.table_id = v;
        }
        if let Some(v) = overrides.namespace {
            self.namespace = v;
        }
        if let Some(secs) = overrides.export_timeout_secs {
            self.export_wait.timeout_secs = Some(secs);
        }
        if let Some(secs) = overrides.load_timeout_secs {
            self.load_wait.timeout_secs = Some(secs);
        }
        if let Some(secs) = overrides.poll_interval_secs {
            self.export_wait.poll_interval_secs = secs;
            self.load_wait.poll_interval_secs = secs;
        }
        self
    }

    pub fn output_url_prefix(&self) -> String {
        format!("gs://{}", self.bucket)
    }

    pub fn destination(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}
