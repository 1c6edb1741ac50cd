//! Simulated executor for development and demos.
//!
//! Sleeps a random duration and fails with a configurable probability, so the
//! queue, positions and streaming can be watched without a browser farm.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;

use crate::domain::RegistrationParams;
use crate::ports::{ExecutionError, WorkExecutor};

#[derive(Debug, Clone)]
pub struct SimulatedExecutor {
    min_delay: Duration,
    max_delay: Duration,
    failure_rate: f64,
}

impl SimulatedExecutor {
    /// `failure_rate` is clamped to `[0, 1]`; the delay bounds are swapped if reversed.
    pub fn new(min_delay: Duration, max_delay: Duration, failure_rate: f64) -> Self {
        let (min_delay, max_delay) = if min_delay <= max_delay {
            (min_delay, max_delay)
        } else {
            (max_delay, min_delay)
        };
        let failure_rate = if failure_rate.is_nan() {
            0.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };
        Self {
            min_delay,
            max_delay,
            failure_rate,
        }
    }

    pub fn failure_rate(&self) -> f64 {
        self.failure_rate
    }

    /// Draw the delay and the outcome up front; the rng never crosses an await.
    fn roll(&self) -> (Duration, bool) {
        let mut rng = rand::thread_rng();
        let delay = if self.min_delay == self.max_delay {
            self.min_delay
        } else {
            rng.gen_range(self.min_delay..=self.max_delay)
        };
        (delay, rng.gen_bool(self.failure_rate))
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(8), 0.2)
    }
}

#[async_trait]
impl WorkExecutor for SimulatedExecutor {
    async fn execute(&self, params: &RegistrationParams) -> Result<(), ExecutionError> {
        let (delay, fail) = self.roll();
        tracing::debug!(
            username = %params.username,
            delay_ms = delay.as_millis() as u64,
            "simulating registration"
        );
        tokio::time::sleep(delay).await;

        if fail {
            return Err(ExecutionError::Rejected(format!(
                "simulated rejection for {}",
                params.username
            )));
        }
        Ok(())
    }
}
