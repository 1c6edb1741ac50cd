//! Remote executor: hands the registration to an automation service over HTTP.
//!
//! The service takes the parameters as a JSON body and answers
//! `{"success": true}` or `{"success": false, "error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::domain::RegistrationParams;
use crate::ports::{ExecutionError, WorkExecutor};

/// Upper bound on one automation call when none is configured.
/// Browser-driven registrations routinely take a minute or more.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Deserialize)]
struct AutomationReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RemoteExecutor {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl RemoteExecutor {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn map_request_error(&self, e: reqwest::Error) -> ExecutionError {
        if e.is_timeout() {
            ExecutionError::Timeout(self.timeout)
        } else {
            ExecutionError::Transport(e.to_string())
        }
    }
}

#[async_trait]
impl WorkExecutor for RemoteExecutor {
    async fn execute(&self, params: &RegistrationParams) -> Result<(), ExecutionError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(params)
            .send()
            .await
            .map_err(|e| self.map_request_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_request_error(e))?;

        let reply: AutomationReply = match serde_json::from_str(&body) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(ExecutionError::Protocol(format!(
                    "automation service returned HTTP {}",
                    status.as_u16()
                )));
            }
            Err(e) => {
                return Err(ExecutionError::Protocol(format!(
                    "unreadable automation reply: {e}"
                )));
            }
        };

        interpret(reply, status.as_u16())
    }
}

/// A well-formed `success: false` is a rejection even on a 4xx/5xx status.
fn interpret(reply: AutomationReply, status: u16) -> Result<(), ExecutionError> {
    match (reply.success, reply.error) {
        (true, _) if (200..300).contains(&status) => Ok(()),
        (true, _) => Err(ExecutionError::Protocol(format!(
            "automation service reported success with HTTP {status}"
        ))),
        (false, Some(error)) if !error.trim().is_empty() => Err(ExecutionError::Rejected(error)),
        (false, _) => Err(ExecutionError::Rejected(String::new())),
    }
}
