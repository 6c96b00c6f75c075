//! Worker pool configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::WorkerError;

/// Configuration for the worker pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Number of concurrent workers.
    pub concurrency: usize,
    /// Delay between polls while entries keep coming.
    pub poll_interval: Duration,
    /// Delay after an empty claim or a store error.
    pub idle_backoff: Duration,
    /// How often the supervisor logs frontier stats.
    pub stats_interval: Duration,
    /// Upper bound on a single handler call. A timed out entry is released.
    pub handler_timeout: Option<Duration>,
    /// Extra attempts at a retryable store failure while settling a claim.
    pub settle_retries: u32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_millis(10),
            idle_backoff: Duration::from_secs(1),
            stats_interval: Duration::from_secs(30),
            handler_timeout: Some(Duration::from_secs(300)), // 5 minutes default
            settle_retries: 3,
        }
    }
}

impl WorkerConfig {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_idle_backoff(mut self, backoff: Duration) -> Self {
        self.idle_backoff = backoff;
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.stats_interval = interval;
        self
    }

    pub fn with_handler_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handler_timeout = timeout;
        self
    }

    pub fn with_settle_retries(mut self, retries: u32) -> Self {
        self.settle_retries = retries;
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `FRONTIER_WORKERS` (default: 4)
    /// - `FRONTIER_POLL_MS` (default: 10)
    /// - `FRONTIER_IDLE_BACKOFF_MS` (default: 1000)
    /// - `FRONTIER_STATS_SECS` (default: 30)
    /// - `FRONTIER_HANDLER_TIMEOUT_SECS` (default: 300, `0` disables)
    /// - `FRONTIER_SETTLE_RETRIES` (default: 3)
    pub fn from_env() -> Result<Self, WorkerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, WorkerError> {
        let mut config = Self::default();

        if let Some(workers) = number(&lookup, "FRONTIER_WORKERS")? {
            config.concurrency = workers;
        }
        if let Some(ms) = number(&lookup, "FRONTIER_POLL_MS")? {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = number(&lookup, "FRONTIER_IDLE_BACKOFF_MS")? {
            config.idle_backoff = Duration::from_millis(ms);
        }
        if let Some(secs) = number(&lookup, "FRONTIER_STATS_SECS")? {
            config.stats_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = number::<u64>(&lookup, "FRONTIER_HANDLER_TIMEOUT_SECS")? {
            config.handler_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }
        if let Some(retries) = number(&lookup, "FRONTIER_SETTLE_RETRIES")? {
            config.settle_retries = retries;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), WorkerError> {
        if self.concurrency == 0 {
            return Err(WorkerError::InvalidConfig(
                "concurrency must be at least 1".into(),
            ));
        }
        if self.stats_interval.is_zero() {
            return Err(WorkerError::InvalidConfig(
                "stats interval must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Parse an unsigned setting straight into its target type, so values
/// that do not fit are rejected instead of truncated.
fn number<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, WorkerError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse().map(Some).map_err(|_| {
        WorkerError::InvalidConfig(format!("invalid {name}={raw} (expected an unsigned integer)"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_invalid() {
        assert!(WorkerConfig::default().validate().is_ok());
        assert!(matches!(
            WorkerConfig::default().with_concurrency(0).validate(),
            Err(WorkerError::InvalidConfig(_))
        ));
        assert!(
            WorkerConfig::default()
                .with_stats_interval(Duration::ZERO)
                .validate()
                .is_err()
        );
    }

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        }
    }

    #[test]
    fn settings_are_read_from_variables() {
        let config = WorkerConfig::from_lookup(vars(&[
            ("FRONTIER_WORKERS", "8"),
            ("FRONTIER_POLL_MS", " 25 "),
            ("FRONTIER_HANDLER_TIMEOUT_SECS", "0"),
            ("FRONTIER_SETTLE_RETRIES", "5"),
        ]))
        .unwrap();

        assert_eq!(config.concurrency, 8);
        assert_eq!(config.poll_interval, Duration::from_millis(25));
        assert_eq!(config.handler_timeout, None);
        assert_eq!(config.settle_retries, 5);
        assert_eq!(config.idle_backoff, WorkerConfig::default().idle_backoff);
    }

    #[test]
    fn out_of_range_settings_are_refused() {
        for (name, value) in [
            ("FRONTIER_WORKERS", "-1"),
            ("FRONTIER_WORKERS", "99999999999999999999999"),
            ("FRONTIER_SETTLE_RETRIES", "4294967296"),
            ("FRONTIER_POLL_MS", "soon"),
        ] {
            assert!(
                matches!(
                    WorkerConfig::from_lookup(vars(&[(name, value)])),
                    Err(WorkerError::InvalidConfig(_))
                ),
                "{name}={value} should be refused"
            );
        }
    }
}
