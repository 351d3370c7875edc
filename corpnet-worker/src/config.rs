/// Worker configuration
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `REDIS_URL`: Redis connection string (required)
/// - `WORKER_POLL_INTERVAL_SECS`: Sleep between empty polls (default: 1)
/// - `WORKER_MAX_CONCURRENT_JOBS`: Jobs running at once (default: 10)
/// - `WORKER_BATCH_SIZE`: Jobs claimed per poll (default: 5)
/// - `WORKER_SHUTDOWN_GRACE_SECS`: How long running jobs may finish after a
///   shutdown signal (default: 30)
/// - `WORKER_STALE_AFTER_SECS`: Age after which a `running` job counts as
///   abandoned at startup (default: 600)
use corpnet_shared::redis::RedisConfig;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis: RedisConfig,
    pub orchestrator: OrchestratorConfig,
}

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub poll_interval_secs: u64,
    pub max_concurrent_jobs: usize,
    pub batch_size: usize,
    pub shutdown_grace_secs: u64,
    pub stale_after_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            poll_interval_secs: 1,
            max_concurrent_jobs: 10,
            batch_size: 5,
            shutdown_grace_secs: 30,
            stale_after_secs: 600,
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} is invalid: {}", name, e)),
        None => Ok(default),
    }
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;
        let redis_url = var("REDIS_URL")
            .ok_or_else(|| anyhow::anyhow!("REDIS_URL environment variable is required"))?;

        let defaults = OrchestratorConfig::default();
        let orchestrator = OrchestratorConfig {
            poll_interval_secs: parse_or(
                &var,
                "WORKER_POLL_INTERVAL_SECS",
                defaults.poll_interval_secs,
            )?,
            max_concurrent_jobs: parse_or(
                &var,
                "WORKER_MAX_CONCURRENT_JOBS",
                defaults.max_concurrent_jobs,
            )?,
            batch_size: parse_or(&var, "WORKER_BATCH_SIZE", defaults.batch_size)?,
            shutdown_grace_secs: parse_or(
                &var,
                "WORKER_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace_secs,
            )?,
            stale_after_secs: parse_or(&var, "WORKER_STALE_AFTER_SECS", defaults.stale_after_secs)?,
        };

        if orchestrator.max_concurrent_jobs == 0 || orchestrator.batch_size == 0 {
            anyhow::bail!("WORKER_MAX_CONCURRENT_JOBS and WORKER_BATCH_SIZE must be positive");
        }

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
            redis: RedisConfig::from_url(redis_url).with_timeouts(
                parse_or(&var, "REDIS_CONNECTION_TIMEOUT_SECS", 5)?,
                parse_or(&var, "REDIS_COMMAND_TIMEOUT_SECS", 5)?,
            ),
            orchestrator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgresql://localhost/corpnet"),
        ("REDIS_URL", "redis://localhost:6379"),
    ];

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::from_vars(lookup(&REQUIRED)).unwrap();

        assert_eq!(config.orchestrator, OrchestratorConfig::default());
        assert_eq!(config.orchestrator.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.orchestrator.shutdown_grace(), Duration::from_secs(30));
        assert_eq!(config.orchestrator.stale_after(), Duration::from_secs(600));
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.redis.url, "redis://localhost:6379");
    }

    #[test]
    fn test_overrides() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WORKER_MAX_CONCURRENT_JOBS", "4"));
        pairs.push(("WORKER_BATCH_SIZE", "2"));
        pairs.push(("WORKER_SHUTDOWN_GRACE_SECS", "5"));
        pairs.push(("WORKER_STALE_AFTER_SECS", "60"));

        let config = WorkerConfig::from_vars(lookup(&pairs)).unwrap();
        assert_eq!(config.orchestrator.max_concurrent_jobs, 4);
        assert_eq!(config.orchestrator.batch_size, 2);
        assert_eq!(config.orchestrator.shutdown_grace_secs, 5);
        assert_eq!(config.orchestrator.stale_after_secs, 60);
    }

    #[test]
    fn test_invalid_number_names_variable() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WORKER_BATCH_SIZE", "lots"));

        let err = WorkerConfig::from_vars(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("WORKER_BATCH_SIZE"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("WORKER_MAX_CONCURRENT_JOBS", "0"));
        assert!(WorkerConfig::from_vars(lookup(&pairs)).is_err());
    }

    #[test]
    fn test_redis_url_required() {
        let err = WorkerConfig::from_vars(lookup(&REQUIRED[..1])).unwrap_err();
        assert!(err.to_string().contains("REDIS_URL"));
    }
}
