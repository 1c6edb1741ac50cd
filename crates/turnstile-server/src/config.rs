use std::time::Duration;

use turnstile_core::{ConfigError, QueueConfig};

/// Which [`WorkExecutor`](turnstile_core::WorkExecutor) backs the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutorKind {
    /// Random latency and failures; no external service needed.
    Simulated { failure_rate: f64 },
    /// POSTs each registration to the automation service at `url`.
    Remote { url: String, timeout: Duration },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins from comma-separated `CORS_ORIGINS`; `*` allows any.
    pub cors_origins: Vec<String>,
    /// Time allowed until response headers are sent (default: `30`).
    pub request_timeout_secs: u64,
    pub queue: QueueConfig,
    pub executor: ExecutorKind,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    ///
    /// | Env Var                  | Default     |
    /// |--------------------------|-------------|
    /// | `HOST`                   | `0.0.0.0`   |
    /// | `PORT`                   | `5000`      |
    /// | `CORS_ORIGINS`           | `*`         |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`        |
    /// | `QUEUE_CONFIG`           | (none)      |
    /// | `MAX_CONCURRENT_TASKS`   | from queue  |
    /// | `TASK_COOLDOWN_MS`       | from queue  |
    /// | `HEARTBEAT_SECS`         | from queue  |
    /// | `EXECUTION_TIMEOUT_SECS` | from queue  |
    /// | `EXECUTOR`               | `simulated` |
    /// | `EXECUTOR_URL`           | (required for `remote`) |
    /// | `SIMULATED_FAILURE_RATE` | `0.2`       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "PORT", 5000u16)?;

        let cors_origins: Vec<String> = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "*".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs = parse_or(&lookup, "REQUEST_TIMEOUT_SECS", 30u64)?;

        let mut queue = match lookup("QUEUE_CONFIG") {
            Some(path) => QueueConfig::from_json_file(path)?,
            None => QueueConfig::default(),
        };
        if let Some(v) = parse_opt(&lookup, "MAX_CONCURRENT_TASKS")? {
            queue.max_concurrent_tasks = v;
        }
        if let Some(v) = parse_opt(&lookup, "TASK_COOLDOWN_MS")? {
            queue.task_cooldown_ms = v;
        }
        if let Some(v) = parse_opt(&lookup, "HEARTBEAT_SECS")? {
            queue.heartbeat_secs = v;
        }
        if let Some(v) = parse_opt(&lookup, "EXECUTION_TIMEOUT_SECS")? {
            queue.execution_timeout_secs = Some(v);
        }
        queue.validate()?;

        let executor = match lookup("EXECUTOR").as_deref().unwrap_or("simulated") {
            "simulated" => ExecutorKind::Simulated {
                failure_rate: parse_or(&lookup, "SIMULATED_FAILURE_RATE", 0.2f64)?,
            },
            "remote" => {
                let url = lookup("EXECUTOR_URL").ok_or_else(|| {
                    ConfigError::Invalid("EXECUTOR_URL is required when EXECUTOR=remote".into())
                })?;
                let timeout = queue
                    .execution_timeout()
                    .unwrap_or(turnstile_core::impls::DEFAULT_REQUEST_TIMEOUT);
                ExecutorKind::Remote { url, timeout }
            }
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "EXECUTOR".into(),
                    value: other.into(),
                });
            }
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            queue,
            executor,
        })
    }

    pub fn allows_any_origin(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

fn parse_opt<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.into(),
                value: raw,
            }),
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
