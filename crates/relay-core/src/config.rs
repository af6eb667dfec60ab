//! Configuration for the relay worker.
//!
//! Everything comes from environment variables with defaults, so the worker
//! starts with no configuration at all against a local link proxy.

use std::time::Duration;

use crate::app::ActivityOptions;
use crate::domain::errors::RelayError;
use crate::domain::retry::RetryPolicy;
use crate::worker::MAX_WORKERS;

pub const DEFAULT_LINK_ADDR: &str = "http://localhost:3500";
pub const DEFAULT_TASK_QUEUE: &str = "order-processing";
pub const DEFAULT_TEMPORAL_HOST: &str = "localhost:7233";
pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_CONCURRENCY: usize = 4;
/// Upper bound for `START_TO_CLOSE_TIMEOUT_SECS` (one year).
pub const MAX_START_TO_CLOSE_TIMEOUT: Duration = Duration::from_secs(86_400 * 365);

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerConfig {
    /// Base address of the link proxy (`FISO_LINK_ADDR`)
    pub link_addr: String,
    /// Task queue / run identifier label (`TASK_QUEUE`)
    pub task_queue: String,
    /// Orchestration backend host:port (`TEMPORAL_HOST`)
    pub temporal_host: String,
    /// Orchestration namespace (`TEMPORAL_NAMESPACE`)
    pub namespace: String,
    /// Start-to-close timeout (`START_TO_CLOSE_TIMEOUT_SECS`)
    pub start_to_close_timeout: Duration,
    /// Attempts per run, first one included (`MAX_ATTEMPTS`)
    pub max_attempts: u32,
    /// Runs executed at the same time (`WORKER_CONCURRENCY`)
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            link_addr: DEFAULT_LINK_ADDR.to_string(),
            task_queue: DEFAULT_TASK_QUEUE.to_string(),
            temporal_host: DEFAULT_TEMPORAL_HOST.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            start_to_close_timeout: Duration::from_secs(30),
            max_attempts: 3,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` (tests pass a map instead of the
    /// process environment).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            link_addr: get("FISO_LINK_ADDR").unwrap_or(defaults.link_addr),
            task_queue: get("TASK_QUEUE").unwrap_or(defaults.task_queue),
            temporal_host: get("TEMPORAL_HOST").unwrap_or(defaults.temporal_host),
            namespace: get("TEMPORAL_NAMESPACE").unwrap_or(defaults.namespace),
            start_to_close_timeout: match get("START_TO_CLOSE_TIMEOUT_SECS") {
                Some(v) => Duration::from_secs(parse("START_TO_CLOSE_TIMEOUT_SECS", &v)?),
                None => defaults.start_to_close_timeout,
            },
            max_attempts: match get("MAX_ATTEMPTS") {
                Some(v) => parse("MAX_ATTEMPTS", &v)?,
                None => defaults.max_attempts,
            },
            concurrency: match get("WORKER_CONCURRENCY") {
                Some(v) => parse("WORKER_CONCURRENCY", &v)?,
                None => defaults.concurrency,
            },
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RelayError> {
        if !(self.link_addr.starts_with("http://") || self.link_addr.starts_with("https://")) {
            return Err(RelayError::Config(format!(
                "FISO_LINK_ADDR must be an http(s) address, got '{}'",
                self.link_addr
            )));
        }
        if self.start_to_close_timeout.is_zero()
            || self.start_to_close_timeout > MAX_START_TO_CLOSE_TIMEOUT
        {
            return Err(RelayError::Config(format!(
                "START_TO_CLOSE_TIMEOUT_SECS must be between 1 and {}",
                MAX_START_TO_CLOSE_TIMEOUT.as_secs()
            )));
        }
        if self.concurrency == 0 || self.concurrency > MAX_WORKERS {
            return Err(RelayError::Config(format!(
                "WORKER_CONCURRENCY must be between 1 and {MAX_WORKERS}"
            )));
        }
        self.retry_policy().map(|_| ())
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy, RelayError> {
        RetryPolicy::new(self.max_attempts)
    }

    pub fn activity_options(&self) -> Result<ActivityOptions, RelayError> {
        Ok(ActivityOptions::default()
            .with_timeout(self.start_to_close_timeout)
            .with_retry_policy(self.retry_policy()?))
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, RelayError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| RelayError::Config(format!("{key}={value}: {e}")))
}
