//! SageMaker flow definitions and Augmented AI human loops.

use async_trait::async_trait;
use aws_sdk_sagemaker::error::DisplayErrorContext;
use aws_sdk_sagemaker::types::{FlowDefinitionOutputConfig, FlowDefinitionStatus, HumanLoopConfig};
use aws_sdk_sagemakera2iruntime::types::{
    ContentClassifier, HumanLoopDataAttributes, HumanLoopInput,
};

use super::{FlowDefinitionRequest, FlowStatus, HumanLoopRequest, ReviewService};
use crate::error::ReviewError;

/// [`ReviewService`] backed by SageMaker (flow definitions) and the
/// SageMaker A2I runtime (human loops).
#[derive(Debug, Clone)]
pub struct SageMakerReviewService {
    sagemaker: aws_sdk_sagemaker::Client,
    runtime: aws_sdk_sagemakera2iruntime::Client,
}

impl SageMakerReviewService {
    pub fn new(
        sagemaker: aws_sdk_sagemaker::Client,
        runtime: aws_sdk_sagemakera2iruntime::Client,
    ) -> Self {
        Self { sagemaker, runtime }
    }

    /// Creates both clients from a loaded AWS SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(
            aws_sdk_sagemaker::Client::new(config),
            aws_sdk_sagemakera2iruntime::Client::new(config),
        )
    }
}

fn map_sdk_error(err: impl std::error::Error, operation: &str) -> ReviewError {
    ReviewError::Backend {
        operation: operation.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

/// ARN returned by `CreateFlowDefinition`; the service always sets it.
fn created_flow_arn(arn: Option<&str>) -> Result<String, ReviewError> {
    arn.map(str::to_string).ok_or_else(|| ReviewError::Backend {
        operation: "CreateFlowDefinition".to_string(),
        message: "missing FlowDefinitionArn".to_string(),
    })
}

fn flow_status(status: Option<&FlowDefinitionStatus>, failure_reason: Option<&str>) -> FlowStatus {
    match status {
        Some(status) => FlowStatus::from_service(status.as_str(), failure_reason),
        None => FlowStatus::Unknown(String::new()),
    }
}

#[async_trait]
impl ReviewService for SageMakerReviewService {
    async fn create_flow_definition(
        &self,
        request: &FlowDefinitionRequest,
    ) -> Result<String, ReviewError> {
        let human_loop_config = HumanLoopConfig::builder()
            .workteam_arn(&request.work_team_arn)
            .human_task_ui_arn(&request.task_ui_arn)
            .task_title(&request.task_title)
            .task_description(&request.task_description)
            .task_count(request.task_count)
            .task_availability_lifetime_in_seconds(request.task_availability_secs)
            .build();

        let output_config = FlowDefinitionOutputConfig::builder()
            .s3_output_path(&request.output_path)
            .build();

        let output = self
            .sagemaker
            .create_flow_definition()
            .flow_definition_name(&request.name)
            .human_loop_config(human_loop_config)
            .output_config(output_config)
            .role_arn(&request.role_arn)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "CreateFlowDefinition"))?;

        created_flow_arn(output.flow_definition_arn())
    }

    async fn flow_definition_status(&self, name: &str) -> Result<FlowStatus, ReviewError> {
        let output = self
            .sagemaker
            .describe_flow_definition()
            .flow_definition_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DescribeFlowDefinition"))?;

        Ok(flow_status(
            output.flow_definition_status(),
            output.failure_reason(),
        ))
    }

    async fn delete_flow_definition(&self, name: &str) -> Result<(), ReviewError> {
        self.sagemaker
            .delete_flow_definition()
            .flow_definition_name(name)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "DeleteFlowDefinition"))?;
        Ok(())
    }

    async fn start_human_loop(&self, request: &HumanLoopRequest) -> Result<(), ReviewError> {
        let input = HumanLoopInput::builder()
            .input_content(&request.input_content)
            .build();

        let classifiers = if request.free_of_pii {
            vec![ContentClassifier::FreeOfPersonallyIdentifiableInformation]
        } else {
            Vec::new()
        };
        let data_attributes = HumanLoopDataAttributes::builder()
            .set_content_classifiers(Some(classifiers))
            .build();

        self.runtime
            .start_human_loop()
            .human_loop_name(&request.name)
            .flow_definition_arn(&request.flow_definition_arn)
            .human_loop_input(input)
            .data_attributes(data_attributes)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, "StartHumanLoop"))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_created_flow_arn() {
        assert_eq!(
            created_flow_arn(Some("arn:aws:sagemaker:us-east-1:1:flow-definition/flow-x")).expect("arn"),
            "arn:aws:sagemaker:us-east-1:1:flow-definition/flow-x"
        );

        let err = created_flow_arn(None).unwrap_err();
        assert!(matches!(err, ReviewError::Backend { ref operation, .. } if operation == "CreateFlowDefinition"));
    }

    #[test]
    fn test_flow_status_mapping() {
        assert_eq!(
            flow_status(Some(&FlowDefinitionStatus::Active), None),
            FlowStatus::Active
        );
        assert_eq!(
            flow_status(Some(&FlowDefinitionStatus::Failed), Some("bad role")),
            FlowStatus::Failed("bad role".to_string())
        );
        assert_eq!(
            flow_status(Some(&FlowDefinitionStatus::Deleting), None),
            FlowStatus::Deleting
        );
        assert_eq!(flow_status(None, None), FlowStatus::Unknown(String::new()));
    }
}
