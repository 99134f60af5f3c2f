//! Review completion: resumes the workflow once the last review is done.
//!
//! Invoked once per human loop reaching a terminal state. Each call consumes
//! that loop's pending marker; the call that leaves only the token row behind
//! takes the token, removes the flow definition and resumes the workflow.
//! If resuming fails, the token row is put back so that a retried callback
//! can resume it.

use std::sync::Arc;

use serde_json::json;

use crate::error::{PipelineError, ReviewError, StagingError};
use crate::review::{execution_id_of, flow_definition_name, ReviewService};
use crate::staging::StagingTable;
use crate::workflow::{TaskToken, WorkflowClient};

/// What a completion call did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The last review finished and the workflow was resumed.
    Resumed { execution_id: String },
    /// Other reviews of the execution are still open.
    Pending {
        execution_id: String,
        remaining: usize,
    },
}

/// Handles review completion callbacks.
pub struct ReviewCompletion {
    review: Arc<dyn ReviewService>,
    staging: Arc<dyn StagingTable>,
    workflow: Arc<dyn WorkflowClient>,
}

impl ReviewCompletion {
    pub fn new(
        review: Arc<dyn ReviewService>,
        staging: Arc<dyn StagingTable>,
        workflow: Arc<dyn WorkflowClient>,
    ) -> Self {
        Self {
            review,
            staging,
            workflow,
        }
    }

    /// Records that `human_loop_name` finished.
    pub async fn handle(&self, human_loop_name: &str) -> Result<CompletionOutcome, PipelineError> {
        let execution_id = execution_id_of(human_loop_name).ok_or_else(|| {
            ReviewError::InvalidRequest(format!(
                "human loop name '{}' does not contain an execution id",
                human_loop_name
            ))
        })?;
        tracing::info!(human_loop = human_loop_name, execution_id, "Review completed");

        if !self
            .staging
            .delete_marker(execution_id, human_loop_name)
            .await?
        {
            tracing::warn!(human_loop = human_loop_name, "No pending marker for human loop");
        }

        // The token row is the only row left once every review is done.
        let remaining = self.staging.count_rows(execution_id, 1).await?;
        if remaining != 1 {
            tracing::info!(execution_id, remaining, "Reviews still pending");
            return Ok(CompletionOutcome::Pending {
                execution_id: execution_id.to_string(),
                remaining,
            });
        }

        let token = self
            .staging
            .take_task_token(execution_id)
            .await?
            .ok_or_else(|| StagingError::TokenMissing(execution_id.to_string()))?;
        let token = TaskToken::new(token)?;

        let flow_name = flow_definition_name(execution_id);
        if let Err(e) = self.review.delete_flow_definition(&flow_name).await {
            tracing::warn!(flow = %flow_name, error = %e, "Failed to delete flow definition");
        }

        if let Err(e) = self
            .workflow
            .send_task_success(&token, &json!({ "EXECUTION_ID": execution_id }))
            .await
        {
            tracing::error!(execution_id, error = %e, "Could not resume workflow, restoring task token");
            if let Err(restore) = self.staging.put_task_token(execution_id, token.as_str()).await {
                tracing::error!(execution_id, error = %restore, "Could not restore task token");
            }
            return Err(e.into());
        }
        tracing::info!(execution_id, "Workflow resumed");

        Ok(CompletionOutcome::Resumed {
            execution_id: execution_id.to_string(),
        })
    }
}
