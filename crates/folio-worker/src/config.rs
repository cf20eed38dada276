//! Worker configuration, read once from the environment at startup.

use std::str::FromStr;
use std::time::Duration;

use folio_outbox::dispatcher::{DispatcherConfig, TerminalFailurePolicy};
use folio_outbox::retry::RetryPolicy;

use crate::error::AppError;

/// Default size of the `PostgreSQL` connection pool.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Everything the worker needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Connection pool size.
    pub max_connections: u32,
    /// OTLP collector endpoint; traces are only exported when set.
    pub otlp_endpoint: Option<String>,
    /// Outbox dispatcher tuning.
    pub dispatcher: DispatcherConfig,
}

impl WorkerConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// fails to parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of
    /// a variable or `None` when it is unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or any value
    /// fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| AppError::Config("DATABASE_URL environment variable must be set".into()))?;
        let defaults = DispatcherConfig::default();

        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?;
        let batch_size = parse_or(&lookup, "OUTBOX_BATCH_SIZE", defaults.batch_size)?;
        let poll_interval_secs =
            parse_or(&lookup, "OUTBOX_POLL_INTERVAL_SECS", defaults.poll_interval.as_secs())?;
        let max_attempts = parse_or(&lookup, "OUTBOX_MAX_ATTEMPTS", defaults.retry.max_attempts)?;
        let backoff_ms = parse_or(
            &lookup,
            "OUTBOX_BACKOFF_MS",
            u64::try_from(defaults.retry.backoff_step.as_millis()).unwrap_or(u64::MAX),
        )?;
        let failure_policy = match lookup("OUTBOX_FAILURE_POLICY").as_deref() {
            None => defaults.failure_policy,
            Some(value) => parse_failure_policy(value)?,
        };

        for (name, value) in [
            ("DATABASE_MAX_CONNECTIONS", u64::from(max_connections)),
            ("OUTBOX_BATCH_SIZE", u64::try_from(batch_size).unwrap_or(u64::MAX)),
            ("OUTBOX_POLL_INTERVAL_SECS", poll_interval_secs),
            ("OUTBOX_MAX_ATTEMPTS", u64::from(max_attempts)),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be greater than zero")));
            }
        }

        Ok(Self {
            database_url,
            max_connections,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|e| !e.trim().is_empty()),
            dispatcher: DispatcherConfig {
                batch_size,
                poll_interval: Duration::from_secs(poll_interval_secs),
                retry: RetryPolicy {
                    max_attempts,
                    backoff_step: Duration::from_millis(backoff_ms),
                },
                failure_policy,
            },
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
    }
}

fn parse_failure_policy(value: &str) -> Result<TerminalFailurePolicy, AppError> {
    match value.trim() {
        "mark_processed" => Ok(TerminalFailurePolicy::MarkProcessed),
        "dead_letter" => Ok(TerminalFailurePolicy::DeadLetter),
        other => Err(AppError::Config(format!(
            "OUTBOX_FAILURE_POLICY must be mark_processed or dead_letter, got '{other}'"
        ))),
    }
}
