//! Review dispatch: opens one human review per manifest record.
//!
//! The task downloads the input manifest, creates the execution's flow
//! definition, waits for it to become active and starts a human loop for
//! every record. The continuation token is parked in the staging table just
//! before the first loop starts, and the task stays suspended until the last
//! review completes. A manifest without records leaves no token row.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use super::config::DispatchConfig;
use super::poll::wait_for_flow_active;
use super::runner::{resolve_task, Resolution};
use crate::error::PipelineError;
use crate::manifest::ManifestReader;
use crate::notify::{Notice, Notifier};
use crate::review::{human_loop_name, FlowDefinitionRequest, HumanLoopRequest, ReviewService};
use crate::staging::StagingTable;
use crate::storage::ObjectStore;
use crate::workflow::{TaskToken, WorkflowClient};

/// Outcome of a dispatch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub loops_started: usize,
    pub resolution: Resolution,
}

/// The review dispatch task and its collaborators.
pub struct ReviewDispatch {
    config: DispatchConfig,
    store: Arc<dyn ObjectStore>,
    review: Arc<dyn ReviewService>,
    staging: Arc<dyn StagingTable>,
    workflow: Arc<dyn WorkflowClient>,
    notifier: Arc<dyn Notifier>,
}

impl ReviewDispatch {
    pub fn new(
        config: DispatchConfig,
        store: Arc<dyn ObjectStore>,
        review: Arc<dyn ReviewService>,
        staging: Arc<dyn StagingTable>,
        workflow: Arc<dyn WorkflowClient>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            config,
            store,
            review,
            staging,
            workflow,
            notifier,
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Runs the dispatch and resolves `token` accordingly.
    ///
    /// Any failure is reported to the workflow once and returned. A
    /// `REVIEW_STARTED` notice is published after the token is resolved or
    /// handed off.
    pub async fn execute(
        &self,
        token: &TaskToken,
        cancel: &CancellationToken,
    ) -> Result<DispatchReport, PipelineError> {
        let execution = &self.config.execution;
        tracing::info!(
            execution_id = %execution.execution_id,
            manifest = %execution.input_manifest,
            "Starting review dispatch"
        );

        let started = AtomicUsize::new(0);
        let resolution = resolve_task(
            self.workflow.as_ref(),
            token,
            self.open_reviews(token, cancel, &started),
        )
        .await?;

        let notice = Notice::review_started(&execution.execution_name);
        if let Err(e) = self.notifier.publish(&notice).await {
            tracing::error!(error = %e, "Could not publish review started notice");
            return Err(e.into());
        }

        let report = DispatchReport {
            loops_started: started.load(Ordering::SeqCst),
            resolution,
        };
        tracing::info!(loops_started = report.loops_started, "Review dispatch finished");
        Ok(report)
    }

    async fn open_reviews(
        &self,
        token: &TaskToken,
        cancel: &CancellationToken,
        started: &AtomicUsize,
    ) -> Result<Resolution, PipelineError> {
        let execution = &self.config.execution;

        let scratch = TempDir::new()?;
        let manifest_path = scratch.path().join("input.manifest");
        self.store
            .download(&execution.input_manifest, &manifest_path)
            .await?;
        tracing::info!("Files downloaded");

        let flow_name = execution.flow_definition_name();
        let request = FlowDefinitionRequest::new(
            &flow_name,
            &self.config.work_team_arn,
            &self.config.work_template_arn,
            &self.config.review_task_role,
            execution.review_output_path(),
        );
        let flow_arn = self.review.create_flow_definition(&request).await?;
        tracing::info!(flow = %flow_name, "Flow definition created");

        let opened = match self
            .start_loops(token, &flow_name, &flow_arn, &manifest_path, cancel, started)
            .await
        {
            Ok(opened) => opened,
            Err(e) => {
                if started.load(Ordering::SeqCst) == 0 {
                    self.discard_flow(&flow_name).await;
                }
                return Err(e);
            }
        };

        if opened == 0 {
            tracing::info!("Manifest has no records, nothing to review");
            self.review.delete_flow_definition(&flow_name).await?;
            return Ok(Resolution::Succeeded);
        }

        tracing::info!(loops = opened, "Human loops started");
        Ok(Resolution::Suspended)
    }

    /// Starts one human loop per record. The token row is written before the
    /// first loop starts so that no completion can observe an execution
    /// without it.
    async fn start_loops(
        &self,
        token: &TaskToken,
        flow_name: &str,
        flow_arn: &str,
        manifest_path: &Path,
        cancel: &CancellationToken,
        started: &AtomicUsize,
    ) -> Result<usize, PipelineError> {
        let execution = &self.config.execution;

        wait_for_flow_active(self.review.as_ref(), flow_name, self.config.poll, cancel).await?;
        tracing::info!("Flow definition is ready");

        let reader = ManifestReader::open(manifest_path, &execution.label_attribute_name)?;
        for record in reader {
            let record = record?;
            let name = human_loop_name(&execution.execution_id, record.index);
            let request = HumanLoopRequest {
                name: name.clone(),
                flow_definition_arn: flow_arn.to_string(),
                input_content: record.review_input().to_json()?,
                free_of_pii: true,
            };

            let first = started.load(Ordering::SeqCst) == 0;
            if first {
                self.staging
                    .put_task_token(&execution.execution_id, token.as_str())
                    .await?;
                tracing::info!("Task token stored");
            }

            if let Err(e) = self.review.start_human_loop(&request).await {
                if first {
                    self.discard_token().await;
                }
                return Err(e.into());
            }
            started.fetch_add(1, Ordering::SeqCst);

            self.staging
                .put_pending_marker(&execution.execution_id, &name)
                .await?;
            tracing::debug!(human_loop = %name, "Human loop started");
        }

        Ok(started.load(Ordering::SeqCst))
    }

    /// Removes a token row that no review can ever resolve.
    async fn discard_token(&self) {
        let execution_id = &self.config.execution.execution_id;
        match self.staging.take_task_token(execution_id).await {
            Ok(Some(_)) => tracing::info!(execution_id = %execution_id, "Removed unused task token"),
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Failed to remove unused task token")
            }
        }
    }

    async fn discard_flow(&self, flow_name: &str) {
        match self.review.delete_flow_definition(flow_name).await {
            Ok(()) => tracing::info!(flow = flow_name, "Deleted unused flow definition"),
            Err(e) => {
                tracing::warn!(flow = flow_name, error = %e, "Failed to delete unused flow definition")
            }
        }
    }
}
