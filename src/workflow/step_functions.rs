//! AWS Step Functions task callbacks.

use async_trait::async_trait;
use aws_sdk_sfn::error::DisplayErrorContext;
use aws_sdk_sfn::Client;
use serde_json::Value;

use super::{truncate, TaskToken, WorkflowClient, MAX_CAUSE_LEN, MAX_ERROR_LEN};
use crate::error::WorkflowError;

/// [`WorkflowClient`] backed by Step Functions `SendTaskSuccess` and
/// `SendTaskFailure`.
#[derive(Debug, Clone)]
pub struct StepFunctionsClient {
    client: Client,
}

impl StepFunctionsClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(Client::new(config))
    }
}

fn send_failed(outcome: &str, err: impl std::error::Error) -> WorkflowError {
    WorkflowError::SendFailed {
        outcome: outcome.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl WorkflowClient for StepFunctionsClient {
    async fn send_task_success(&self, token: &TaskToken, output: &Value) -> Result<(), WorkflowError> {
        self.client
            .send_task_success()
            .task_token(token.as_str())
            .output(output.to_string())
            .send()
            .await
            .map_err(|e| send_failed("success", e))?;
        Ok(())
    }

    async fn send_task_failure(
        &self,
        token: &TaskToken,
        error: &str,
        cause: &str,
    ) -> Result<(), WorkflowError> {
        self.client
            .send_task_failure()
            .task_token(token.as_str())
            .error(truncate(error, MAX_ERROR_LEN))
            .cause(truncate(cause, MAX_CAUSE_LEN))
            .send()
            .await
            .map_err(|e| send_failed("failure", e))?;
        Ok(())
    }
}
