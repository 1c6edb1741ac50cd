//! Queue configuration.
//!
//! Loaded from a JSON file (the automation `config.json`; unknown keys are
//! ignored) or built in code. Every field has a default.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Concurrency ceiling: tasks allowed in `running` at once.
    pub max_concurrent_tasks: usize,

    /// Pause after a task finishes before its worker slot frees up.
    /// Keeps the registration backend from being hit back-to-back.
    pub task_cooldown_ms: u64,

    /// Upper bound on one idle wait of the dispatch loop.
    pub pop_timeout_ms: u64,

    /// Idle period after which streaming clients get a heartbeat.
    pub heartbeat_secs: u64,

    /// Per-subscriber channel capacity; a subscriber this far behind is dropped.
    pub subscriber_buffer: usize,

    /// Optional bound on a single executor call.
    pub execution_timeout_secs: Option<u64>,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 2,
            task_cooldown_ms: 5_000,
            pop_timeout_ms: 1_000,
            heartbeat_secs: 60,
            subscriber_buffer: 64,
            execution_timeout_secs: None,
        }
    }
}

impl QueueConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_tasks == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_tasks must be at least 1".into(),
            ));
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid(
                "subscriber_buffer must be at least 1".into(),
            ));
        }
        if self.pop_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "pop_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.heartbeat_secs == 0 {
            return Err(ConfigError::Invalid(
                "heartbeat_secs must be greater than 0".into(),
            ));
        }
        if self.execution_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "execution_timeout_secs must be greater than 0 when set".into(),
            ));
        }
        Ok(())
    }

    pub fn task_cooldown(&self) -> Duration {
        Duration::from_millis(self.task_cooldown_ms)
    }

    pub fn pop_timeout(&self) -> Duration {
        Duration::from_millis(self.pop_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn execution_timeout(&self) -> Option<Duration> {
        self.execution_timeout_secs.map(Duration::from_secs)
    }
}
