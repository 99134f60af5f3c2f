//! Recording collaborators and fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use review_loop::notify::{Notice, Notifier, NotifyError};
use review_loop::pipeline::{
    DispatchConfig, ExecutionConfig, MergeConfig, PollSettings,
};
use review_loop::review::{
    FlowDefinitionRequest, FlowStatus, HumanLoopRequest, ReviewError, ReviewService,
};
use review_loop::staging::InMemoryStagingTable;
use review_loop::storage::{LocalObjectStore, ObjectStore, ObjectUrl};
use review_loop::workflow::{TaskToken, WorkflowClient, WorkflowError};

pub const EXECUTION_ID: &str = "3f2a-77";
pub const EXECUTION_NAME: &str = "nightly-batch";
pub const LABEL: &str = "ner";
pub const TOKEN: &str = "AAAAKgAAAAIAAAAAAAAAAQ-token";

pub fn execution_config() -> ExecutionConfig {
    ExecutionConfig {
        execution_id: EXECUTION_ID.to_string(),
        execution_name: EXECUTION_NAME.to_string(),
        label_attribute_name: LABEL.to_string(),
        input_manifest: ObjectUrl::new("datasets", "jobs/input.manifest"),
        staging_bucket_name: "staging".to_string(),
        sns_topic_arn: "arn:aws:sns:us-east-1:123456789012:review".to_string(),
    }
}

pub fn dispatch_config() -> DispatchConfig {
    DispatchConfig {
        execution: execution_config(),
        work_team_arn: "arn:aws:sagemaker:us-east-1:123456789012:workteam/private-crowd/team"
            .to_string(),
        work_template_arn: "arn:aws:sagemaker:us-east-1:123456789012:human-task-ui/entity"
            .to_string(),
        review_task_role: "arn:aws:iam::123456789012:role/review".to_string(),
        staging_table_name: "review-staging".to_string(),
        poll: PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        },
    }
}

pub fn merge_config() -> MergeConfig {
    MergeConfig {
        execution: execution_config(),
        output_manifest: ObjectUrl::new("datasets", "jobs/output.manifest"),
    }
}

pub fn token() -> TaskToken {
    TaskToken::new(TOKEN).expect("valid token")
}

/// A bucket tree rooted in a temporary directory.
pub struct Buckets {
    pub dir: TempDir,
    pub store: Arc<LocalObjectStore>,
}

impl Buckets {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let store = Arc::new(LocalObjectStore::new(dir.path()));
        Self { dir, store }
    }

    pub fn put(&self, url: &ObjectUrl, content: &str) {
        let path = self.store.object_path(url);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        std::fs::write(path, content).expect("write object");
    }

    pub fn get(&self, url: &ObjectUrl) -> Option<String> {
        std::fs::read_to_string(self.store.object_path(url)).ok()
    }

    pub fn exists(&self, url: &ObjectUrl) -> bool {
        self.store.object_path(url).exists()
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}

/// One call made against [`RecordingReviewService`].
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewCall {
    CreateFlow(FlowDefinitionRequest),
    FlowStatus(String),
    DeleteFlow(String),
    StartLoop(HumanLoopRequest),
}

/// Review service double that records calls and can be scripted to fail.
pub struct RecordingReviewService {
    calls: Mutex<Vec<ReviewCall>>,
    statuses: Mutex<Vec<FlowStatus>>,
    fail_loop_at: Option<usize>,
    fail_delete: bool,
    loops: AtomicUsize,
    staging: Option<Arc<InMemoryStagingTable>>,
    tokens_at_start: Mutex<Vec<Option<String>>>,
}

impl RecordingReviewService {
    /// Flow definitions become active on the second poll.
    pub fn new() -> Self {
        Self::with_statuses(vec![FlowStatus::Initializing, FlowStatus::Active])
    }

    pub fn with_statuses(statuses: Vec<FlowStatus>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            statuses: Mutex::new(statuses),
            fail_loop_at: None,
            fail_delete: false,
            loops: AtomicUsize::new(0),
            staging: None,
            tokens_at_start: Mutex::new(Vec::new()),
        }
    }

    /// Records the execution's token row as seen at each human loop start.
    pub fn observing(mut self, staging: Arc<InMemoryStagingTable>) -> Self {
        self.staging = Some(staging);
        self
    }

    pub fn tokens_at_start(&self) -> Vec<Option<String>> {
        self.tokens_at_start.lock().expect("lock poisoned").clone()
    }

    /// Fails the `n`th (1-based) human loop start.
    pub fn failing_loop(mut self, n: usize) -> Self {
        self.fail_loop_at = Some(n);
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    pub fn calls(&self) -> Vec<ReviewCall> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    pub fn started_loops(&self) -> Vec<HumanLoopRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ReviewCall::StartLoop(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_flows(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ReviewCall::DeleteFlow(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: ReviewCall) {
        self.calls.lock().expect("lock poisoned").push(call);
    }
}

#[async_trait]
impl ReviewService for RecordingReviewService {
    async fn create_flow_definition(
        &self,
        request: &FlowDefinitionRequest,
    ) -> Result<String, ReviewError> {
        self.record(ReviewCall::CreateFlow(request.clone()));
        Ok(format!(
            "arn:aws:sagemaker:us-east-1:123456789012:flow-definition/{}",
            request.name
        ))
    }

    async fn flow_definition_status(&self, name: &str) -> Result<FlowStatus, ReviewError> {
        self.record(ReviewCall::FlowStatus(name.to_string()));
        let mut statuses = self.statuses.lock().expect("lock poisoned");
        if statuses.len() > 1 {
            Ok(statuses.remove(0))
        } else {
            Ok(statuses[0].clone())
        }
    }

    async fn delete_flow_definition(&self, name: &str) -> Result<(), ReviewError> {
        self.record(ReviewCall::DeleteFlow(name.to_string()));
        if self.fail_delete {
            return Err(ReviewError::Backend {
                operation: "DeleteFlowDefinition".to_string(),
                message: "throttled".to_string(),
            });
        }
        Ok(())
    }

    async fn start_human_loop(&self, request: &HumanLoopRequest) -> Result<(), ReviewError> {
        if let Some(staging) = &self.staging {
            let token = staging.task_token(EXECUTION_ID).await;
            self.tokens_at_start.lock().expect("lock poisoned").push(token);
        }
        let n = self.loops.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_loop_at == Some(n) {
            return Err(ReviewError::Backend {
                operation: "StartHumanLoop".to_string(),
                message: "quota exceeded".to_string(),
            });
        }
        self.record(ReviewCall::StartLoop(request.clone()));
        Ok(())
    }
}

/// A report sent to the workflow.
#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Success { token: String, output: Value },
    Failure { token: String, error: String, cause: String },
}

#[derive(Default)]
pub struct RecordingWorkflow {
    sent: Mutex<Vec<Sent>>,
    fail_success: bool,
}

impl RecordingWorkflow {
    /// Rejects every success report.
    pub fn failing_success() -> Self {
        Self {
            fail_success: true,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().expect("lock poisoned").clone()
    }

    pub fn failures(&self) -> Vec<(String, String)> {
        self.sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Failure { error, cause, .. } => Some((error, cause)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl WorkflowClient for RecordingWorkflow {
    async fn send_task_success(&self, token: &TaskToken, output: &Value) -> Result<(), WorkflowError> {
        if self.fail_success {
            return Err(WorkflowError::SendFailed {
                outcome: "success".to_string(),
                message: "task timed out".to_string(),
            });
        }
        self.sent.lock().expect("lock poisoned").push(Sent::Success {
            token: token.as_str().to_string(),
            output: output.clone(),
        });
        Ok(())
    }

    async fn send_task_failure(
        &self,
        token: &TaskToken,
        error: &str,
        cause: &str,
    ) -> Result<(), WorkflowError> {
        self.sent.lock().expect("lock poisoned").push(Sent::Failure {
            token: token.as_str().to_string(),
            error: error.to_string(),
            cause: cause.to_string(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("lock poisoned").clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn publish(&self, notice: &Notice) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::PublishFailed {
                topic: "arn:aws:sns:us-east-1:123456789012:review".to_string(),
                message: "topic does not exist".to_string(),
            });
        }
        self.notices.lock().expect("lock poisoned").push(notice.clone());
        Ok(())
    }
}

/// A manifest line for `LABEL` with the given source and entities.
pub fn manifest_line(source: &str, entities: &str) -> String {
    format!(
        r#"{{"source":{},"ner-metadata":{{"type":"groundtruth/text-span"}},"ner":{{"annotations":{{"labels":[{{"label":"ORG"}}],"entities":{}}}}}}}"#,
        serde_json::to_string(source).expect("string"),
        entities
    )
}
