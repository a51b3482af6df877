//! Object-storage paths produced by a Datastore export.
//!
//! An export writes `gs://<bucket>/<T>/<T>.overall_export_metadata` plus one
//! directory per namespace/kind under `<T>`. The load job points at the
//! per-kind `.export_metadata` descriptor below that prefix.

use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Ds2BqError, Result};

const OVERALL_METADATA_SUFFIX: &str = ".overall_export_metadata";

static OUTPUT_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^gs://([^/]+)/([^/]+)/([^/]+)\.overall_export_metadata$")
        .expect("output URL pattern is a valid regex")
});

/// The `<T>` segment of an export output URL, e.g. `2023-06-24T19:21:06_77248`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExportTimestamp(String);

impl ExportTimestamp {
    pub fn new(segment: impl Into<String>) -> Self {
        Self(segment.into())
    }

    /// Anchored parse of `gs://<bucket>/<T>/<file>.overall_export_metadata`.
    pub fn from_output_url(url: &str) -> Result<Self> {
        let caps = OUTPUT_URL.captures(url).ok_or_else(|| {
            let reason = if !url.starts_with("gs://") {
                "expected a gs:// URL".to_string()
            } else if !url.ends_with(OVERALL_METADATA_SUFFIX) {
                format!("expected a file ending in {}", OVERALL_METADATA_SUFFIX)
            } else {
                "expected gs://<bucket>/<timestamp>/<timestamp>.overall_export_metadata".to_string()
            };
            Ds2BqError::malformed_url(url, reason)
        })?;

        let timestamp = &caps[2];
        let stem = &caps[3];
        if stem != timestamp {
            warn!(
                "Export metadata file '{}' does not match timestamp directory '{}'; using the directory",
                stem, timestamp
            );
        }

        Ok(Self(timestamp.to_string()))
    }

    /// Split on `/` and take the fourth component, with no other checks.
    pub fn from_output_url_positional(url: &str) -> Result<Self> {
        url.split('/')
            .nth(3)
            .map(|segment| Self(segment.to_string()))
            .ok_or_else(|| {
                Ds2BqError::malformed_url(url, "fewer than four '/'-separated components")
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Second-resolution export start time, when the segment starts with
    /// `YYYY-MM-DDTHH:MM:SS`. The `_<n>` suffix is a uniquifier and ignored.
    pub fn exported_at(&self) -> Option<NaiveDateTime> {
        let seconds = self.0.split('_').next().unwrap_or_default();
        NaiveDateTime::parse_from_str(seconds, "%Y-%m-%dT%H:%M:%S").ok()
    }
}

impl fmt::Display for ExportTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which namespaces an export covers. Decides both the `namespaceIds` filter
/// and the directory prefix the export writes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NamespaceScope {
    #[default]
    All,
    Default,
    Named(String),
}

impl NamespaceScope {
    pub fn namespace_ids(&self) -> Vec<String> {
        match self {
            NamespaceScope::All => Vec::new(),
            NamespaceScope::Default => vec![String::new()],
            NamespaceScope::Named(ns) => vec![ns.clone()],
        }
    }

    pub fn path_prefix(&self) -> String {
        match self {
            NamespaceScope::All => "all_namespaces".to_string(),
            NamespaceScope::Default => "default_namespace".to_string(),
            NamespaceScope::Named(ns) => format!("namespace_{}", ns),
        }
    }

    /// `all`, `default` or any other string as a named namespace.
    pub fn parse(s: &str) -> Self {
        match s {
            "all" | "" => NamespaceScope::All,
            "default" => NamespaceScope::Default,
            other => NamespaceScope::Named(other.to_string()),
        }
    }
}

impl From<String> for NamespaceScope {
    fn from(s: String) -> Self {
        NamespaceScope::parse(&s)
    }
}

impl From<NamespaceScope> for String {
    fn from(scope: NamespaceScope) -> Self {
        match scope {
            NamespaceScope::All => "all".to_string(),
            NamespaceScope::Default => "default".to_string(),
            NamespaceScope::Named(ns) => ns,
        }
    }
}

impl fmt::Display for NamespaceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceScope::All => f.write_str("all namespaces"),
            NamespaceScope::Default => f.write_str("default namespace"),
            NamespaceScope::Named(ns) => write!(f, "namespace '{}'", ns),
        }
    }
}

/// URI of the per-kind export metadata descriptor across all namespaces.
///
/// The kind segment is filled with `table_id`; the destination table is
/// expected to share its name with the exported kind.
pub fn source_uri(bucket: &str, timestamp: &ExportTimestamp, table_id: &str) -> String {
    source_uri_in(&NamespaceScope::All, bucket, timestamp, table_id)
}

pub fn source_uri_in(
    scope: &NamespaceScope,
    bucket: &str,
    timestamp: &ExportTimestamp,
    table_id: &str,
) -> String {
    let prefix = scope.path_prefix();
    format!(
        "gs://{bucket}/{timestamp}/{prefix}/kind_{table_id}/{prefix}_kind_{table_id}.export_metadata"
    )
}
