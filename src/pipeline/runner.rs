//! Resolving a workflow task with exactly one report.
//!
//! Every task invocation holds one continuation token. [`resolve_task`] runs
//! the task's work and turns its outcome into at most one success or failure
//! report for that token.

use std::future::Future;

use serde_json::json;

use crate::error::PipelineError;
use crate::workflow::{TaskToken, WorkflowClient};

/// How a task's work ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The work is finished; the workflow resumes now.
    Succeeded,
    /// The work continues elsewhere; the token was handed off and is resolved later.
    Suspended,
}

/// Awaits `work` and reports its outcome for `token`.
///
/// - `Ok(Succeeded)`: reports success with an empty output document.
/// - `Ok(Suspended)`: reports nothing.
/// - `Err(e)`: reports failure with the error's kind code and message, then
///   returns `e`.
///
/// A failed success report is returned as an error without being followed by
/// a failure report.
pub async fn resolve_task<F>(
    workflow: &dyn WorkflowClient,
    token: &TaskToken,
    work: F,
) -> Result<Resolution, PipelineError>
where
    F: Future<Output = Result<Resolution, PipelineError>>,
{
    match work.await {
        Ok(Resolution::Succeeded) => {
            workflow.send_task_success(token, &json!({})).await.map_err(|e| {
                tracing::error!(error = %e, "Could not report task success");
                PipelineError::from(e)
            })?;
            tracing::info!("Reported task success");
            Ok(Resolution::Succeeded)
        }
        Ok(Resolution::Suspended) => {
            tracing::info!("Task suspended until reviews complete");
            Ok(Resolution::Suspended)
        }
        Err(e) => {
            report_failure(workflow, token, &e).await;
            Err(e)
        }
    }
}

/// Sends one failure report for `error`. A failed report is only logged.
pub async fn report_failure(workflow: &dyn WorkflowClient, token: &TaskToken, error: &PipelineError) {
    let kind = error.kind();
    tracing::error!(kind = %kind, error = %error, "Task failed");

    if let Err(send_err) = workflow
        .send_task_failure(token, kind.code(), &error.to_string())
        .await
    {
        tracing::error!(error = %send_err, "Could not report task failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Value;

    use crate::error::{ManifestError, WorkflowError};

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Success(Value),
        Failure { error: String, cause: String },
    }

    #[derive(Default)]
    struct RecordingWorkflow {
        sent: Mutex<Vec<Sent>>,
        fail_success: bool,
    }

    impl RecordingWorkflow {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().expect("lock poisoned").clone()
        }
    }

    #[async_trait]
    impl WorkflowClient for RecordingWorkflow {
        async fn send_task_success(&self, _token: &TaskToken, output: &Value) -> Result<(), WorkflowError> {
            if self.fail_success {
                return Err(WorkflowError::SendFailed {
                    outcome: "success".to_string(),
                    message: "task timed out".to_string(),
                });
            }
            self.sent
                .lock()
                .expect("lock poisoned")
                .push(Sent::Success(output.clone()));
            Ok(())
        }

        async fn send_task_failure(
            &self,
            _token: &TaskToken,
            error: &str,
            cause: &str,
        ) -> Result<(), WorkflowError> {
            self.sent.lock().expect("lock poisoned").push(Sent::Failure {
                error: error.to_string(),
                cause: cause.to_string(),
            });
            Ok(())
        }
    }

    fn token() -> TaskToken {
        TaskToken::new("token-1").expect("token")
    }

    #[tokio::test]
    async fn test_success_reports_empty_output_once() {
        let workflow = RecordingWorkflow::default();
        let work = async { Ok::<_, PipelineError>(Resolution::Succeeded) };
        let resolution = resolve_task(&workflow, &token(), work)
            .await
            .expect("resolves");

        assert_eq!(resolution, Resolution::Succeeded);
        assert_eq!(workflow.sent(), vec![Sent::Success(json!({}))]);
    }

    #[tokio::test]
    async fn test_suspended_reports_nothing() {
        let workflow = RecordingWorkflow::default();
        let work = async { Ok::<_, PipelineError>(Resolution::Suspended) };
        let resolution = resolve_task(&workflow, &token(), work)
            .await
            .expect("resolves");

        assert_eq!(resolution, Resolution::Suspended);
        assert!(workflow.sent().is_empty());
    }

    #[tokio::test]
    async fn test_error_reports_one_failure() {
        let workflow = RecordingWorkflow::default();
        let work = async {
            Err::<Resolution, _>(PipelineError::from(ManifestError::Empty(
                "input.manifest".to_string(),
            )))
        };
        let result = resolve_task(&workflow, &token(), work).await;

        assert!(result.is_err());
        let sent = workflow.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Failure { error, cause } => {
                assert_eq!(error, "DataError");
                assert!(cause.contains("input.manifest"));
            }
            other => panic!("expected failure, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_success_report_is_not_followed_by_failure() {
        let workflow = RecordingWorkflow {
            fail_success: true,
            ..Default::default()
        };
        let work = async { Ok::<_, PipelineError>(Resolution::Succeeded) };
        let result = resolve_task(&workflow, &token(), work).await;

        assert!(matches!(result, Err(PipelineError::Workflow(_))));
        assert!(workflow.sent().is_empty());
    }
}
