// Worker settings, read once from the environment at startup.
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TIME_LIMIT_MS: u64 = 5_000;
pub const DEFAULT_MEMORY_LIMIT_MB: i64 = 256;
pub const DEFAULT_REPORT_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_RECONNECT_BACKOFF_SECS: u64 = 5;
pub const DEFAULT_POLL_TIMEOUT_SECS: f64 = 5.0;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    /// Names this worker's processing list; must be unique per instance
    /// and stable across restarts so leftovers get re-queued.
    pub worker_id: String,
    /// Parent directory for per-submission scratch workspaces.
    pub workspace_root: PathBuf,
    /// Per-test-case wall-clock deadline.
    pub time_limit: Duration,
    pub memory_limit_bytes: i64,
    /// Bound on one result-store delivery attempt.
    pub report_timeout: Duration,
    pub reconnect_backoff: Duration,
    pub poll_timeout_seconds: f64,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        let redis_url = std::env::var("REDIS_URL")
            .unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let worker_id =
            std::env::var("WORKER_ID").unwrap_or_else(|_| "gavel-worker-1".to_string());
        let workspace_root = std::env::var("GAVEL_WORKSPACE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("gavel"));

        let time_limit_ms: u64 = env_parse("GAVEL_TIME_LIMIT_MS", DEFAULT_TIME_LIMIT_MS)?;
        let memory_limit_mb: i64 = env_parse("GAVEL_MEMORY_LIMIT_MB", DEFAULT_MEMORY_LIMIT_MB)?;

        Ok(Self {
            redis_url,
            worker_id,
            workspace_root,
            time_limit: Duration::from_millis(time_limit_ms),
            memory_limit_bytes: memory_limit_mb * 1024 * 1024,
            report_timeout: Duration::from_millis(DEFAULT_REPORT_TIMEOUT_MS),
            reconnect_backoff: Duration::from_secs(DEFAULT_RECONNECT_BACKOFF_SECS),
            poll_timeout_seconds: DEFAULT_POLL_TIMEOUT_SECS,
        })
    }

    pub fn time_limit_ms(&self) -> u64 {
        self.time_limit.as_millis() as u64
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
