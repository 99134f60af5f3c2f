//! Human review service integration.
//!
//! A review runs in two layers:
//!
//! - **Flow definition**: binds the task UI, the reviewer work team and the
//!   output location. One per execution, named `flow-<execution-id>`.
//! - **Human loop**: one review task per manifest record, started against the
//!   flow definition with the record as its input content.
//!
//! [`ReviewService`] abstracts both; [`SageMakerReviewService`] implements it
//! on top of SageMaker and the Augmented AI runtime.

pub mod sagemaker;

use async_trait::async_trait;

pub use crate::error::ReviewError;
pub use sagemaker::SageMakerReviewService;

/// Title shown to reviewers.
pub const TASK_TITLE: &str = "entity-review";

/// Description shown to reviewers.
pub const TASK_DESCRIPTION: &str = "Review for entities.";

/// Number of reviewers per record.
pub const TASK_COUNT: i32 = 1;

/// How long a review task stays available: ten days.
pub const TASK_AVAILABILITY_SECS: i32 = 60 * 60 * 24 * 10;

/// Name of the flow definition owned by an execution.
pub fn flow_definition_name(execution_id: &str) -> String {
    format!("flow-{}", execution_id)
}

/// Name of the human loop reviewing the record at `index` (1-based).
pub fn human_loop_name(execution_id: &str, index: usize) -> String {
    format!("{}-{}", execution_id, index)
}

/// Execution id a human loop belongs to: everything before the last `-`.
pub fn execution_id_of(human_loop_name: &str) -> Option<&str> {
    human_loop_name
        .rsplit_once('-')
        .map(|(execution_id, _)| execution_id)
        .filter(|execution_id| !execution_id.is_empty())
}

/// Everything needed to create a flow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDefinitionRequest {
    pub name: String,
    pub work_team_arn: String,
    pub task_ui_arn: String,
    pub role_arn: String,
    pub output_path: String,
    pub task_title: String,
    pub task_description: String,
    pub task_count: i32,
    pub task_availability_secs: i32,
}

impl FlowDefinitionRequest {
    /// Creates a request with the standard entity-review task settings.
    pub fn new(
        name: impl Into<String>,
        work_team_arn: impl Into<String>,
        task_ui_arn: impl Into<String>,
        role_arn: impl Into<String>,
        output_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            work_team_arn: work_team_arn.into(),
            task_ui_arn: task_ui_arn.into(),
            role_arn: role_arn.into(),
            output_path: output_path.into(),
            task_title: TASK_TITLE.to_string(),
            task_description: TASK_DESCRIPTION.to_string(),
            task_count: TASK_COUNT,
            task_availability_secs: TASK_AVAILABILITY_SECS,
        }
    }
}

/// Provisioning status of a flow definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    Initializing,
    Active,
    Failed(String),
    Deleting,
    Unknown(String),
}

impl FlowStatus {
    /// Maps the service's status string.
    pub fn from_service(status: &str, failure_reason: Option<&str>) -> Self {
        match status {
            "Initializing" => FlowStatus::Initializing,
            "Active" => FlowStatus::Active,
            "Failed" => FlowStatus::Failed(failure_reason.unwrap_or("unknown").to_string()),
            "Deleting" => FlowStatus::Deleting,
            other => FlowStatus::Unknown(other.to_string()),
        }
    }
}

/// A request to start one human loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanLoopRequest {
    pub name: String,
    pub flow_definition_arn: String,
    /// JSON document shown to the reviewer.
    pub input_content: String,
    /// Declares the content free of personally identifiable information.
    pub free_of_pii: bool,
}

/// Operations against the human review service.
#[async_trait]
pub trait ReviewService: Send + Sync {
    /// Creates a flow definition and returns its ARN.
    async fn create_flow_definition(
        &self,
        request: &FlowDefinitionRequest,
    ) -> Result<String, ReviewError>;

    /// Current provisioning status of a flow definition.
    async fn flow_definition_status(&self, name: &str) -> Result<FlowStatus, ReviewError>;

    /// Deletes a flow definition.
    async fn delete_flow_definition(&self, name: &str) -> Result<(), ReviewError>;

    /// Starts a human loop against a flow definition.
    async fn start_human_loop(&self, request: &HumanLoopRequest) -> Result<(), ReviewError>;
}
