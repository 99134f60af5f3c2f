//! Workflow orchestrator callbacks.
//!
//! The orchestrator hands every invocation a continuation token and waits
//! until the token is resolved with either a success or a failure report.

pub mod step_functions;

use async_trait::async_trait;
use serde_json::Value;

pub use crate::error::WorkflowError;
pub use step_functions::StepFunctionsClient;

/// Maximum length of the failure `error` field.
pub const MAX_ERROR_LEN: usize = 256;

/// Maximum length of the failure `cause` field.
pub const MAX_CAUSE_LEN: usize = 32_768;

/// Opaque continuation token issued by the orchestrator.
#[derive(Clone, PartialEq, Eq)]
pub struct TaskToken(String);

impl TaskToken {
    pub fn new(token: impl Into<String>) -> Result<Self, WorkflowError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(WorkflowError::MissingToken("token is empty".to_string()));
        }
        Ok(Self(token))
    }

    /// Reads the token from the `TASK_TOKEN` environment variable.
    pub fn from_env() -> Result<Self, WorkflowError> {
        let token = std::env::var("TASK_TOKEN")
            .map_err(|_| WorkflowError::MissingToken("TASK_TOKEN is not set".to_string()))?;
        Self::new(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for TaskToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix: String = self.0.chars().take(8).collect();
        write!(f, "TaskToken({}…)", prefix)
    }
}

/// Reports task outcomes to the workflow orchestrator.
#[async_trait]
pub trait WorkflowClient: Send + Sync {
    /// Resumes the workflow with a success and the given output document.
    async fn send_task_success(&self, token: &TaskToken, output: &Value) -> Result<(), WorkflowError>;

    /// Resumes the workflow with a failure.
    async fn send_task_failure(
        &self,
        token: &TaskToken,
        error: &str,
        cause: &str,
    ) -> Result<(), WorkflowError>;
}

/// Truncates `text` to at most `max` bytes on a character boundary.
pub fn truncate(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
