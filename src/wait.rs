use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Ds2BqError, Result};

pub const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;

/// How long to block on a long-running remote operation and how often to poll it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    /// `None` waits until the operation finishes.
    pub timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl WaitOptions {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self::new(Some(Duration::from_secs(DEFAULT_EXPORT_TIMEOUT_SECS)))
    }
}

/// Serialized form of [`WaitOptions`] used in config files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitConfig {
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

impl WaitConfig {
    pub fn bounded(timeout_secs: u64) -> Self {
        Self {
            timeout_secs: Some(timeout_secs),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            timeout_secs: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// Reads a wait block whose missing `timeout_secs` falls back to
    /// `default_timeout`. An explicit `null` still means unbounded.
    pub fn deserialize_or<'de, D>(
        deserializer: D,
        default_timeout: Option<u64>,
    ) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawWaitConfig::deserialize(deserializer)?;
        Ok(Self {
            timeout_secs: raw.timeout_secs.unwrap_or(default_timeout),
            poll_interval_secs: raw.poll_interval_secs,
        })
    }

    pub fn to_options(&self) -> WaitOptions {
        WaitOptions {
            timeout: self.timeout_secs.map(Duration::from_secs),
            poll_interval: Duration::from_secs(self.poll_interval_secs.max(1)),
        }
    }
}

#[derive(Deserialize)]
struct RawWaitConfig {
    // outer None: key absent, Some(None): explicit null
    #[serde(default, deserialize_with = "present")]
    timeout_secs: Option<Option<u64>>,
    #[serde(default = "default_poll_interval_secs")]
    poll_interval_secs: u64,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

/// Runs `fut` to completion, failing with [`Ds2BqError::Timeout`] once
/// `timeout` elapses. The remote operation itself is not cancelled.
pub async fn bounded<T, F>(operation: &str, timeout: Option<Duration>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| Ds2BqError::Timeout {
                operation: operation.to_string(),
                duration: limit,
            })?,
        None => fut.await,
    }
}
