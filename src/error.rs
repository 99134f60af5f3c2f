//! Error types for review-loop operations.
//!
//! Defines error types for each collaborator the pipeline talks to:
//! - Manifest and reviewed-output parsing (data errors)
//! - Object storage transfers
//! - The human review service
//! - The staging table holding pending markers
//! - The workflow orchestrator
//! - Notification publishing
//!
//! [`PipelineError`] wraps them all for the dispatch, merge and completion
//! tasks and classifies each failure into an [`ErrorKind`].

use std::time::Duration;

use thiserror::Error;

use crate::pipeline::config::ConfigError;

/// Errors raised while reading manifests or reviewed outputs.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("Manifest is empty: {0}")]
    Empty(String),

    #[error("Malformed JSON on line {line}: {source}")]
    MalformedLine {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Line {line} is missing field '{field}'")]
    MissingField { line: usize, field: String },

    #[error("Line {line} carries a label configuration different from line 1 ({field})")]
    InconsistentLabels { line: usize, field: String },

    #[error("Malformed reviewed output '{path}': {source}")]
    MalformedReview {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Reviewed output '{0}' has no human answer and no initial value")]
    MissingAnswer(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur during object storage transfers.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object storage error for '{url}': {message}")]
    Backend { url: String, message: String },

    #[error("Directory traversal failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while talking to the human review service.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Flow definition '{name}' did not become active within {waited:?}")]
    FlowActivationTimeout { name: String, waited: Duration },

    #[error("Flow definition '{name}' failed: {reason}")]
    FlowFailed { name: String, reason: String },

    #[error("Waiting for flow definition '{0}' was cancelled")]
    Cancelled(String),

    #[error("Invalid review request: {0}")]
    InvalidRequest(String),

    #[error("Review service error ({operation}): {message}")]
    Backend { operation: String, message: String },
}

/// Errors that can occur while reading or writing the staging table.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("No continuation token stored for execution '{0}'")]
    TokenMissing(String),

    #[error("Staging table error for {execution_id}/{index}: {message}")]
    Backend {
        execution_id: String,
        index: String,
        message: String,
    },
}

/// Errors that can occur while reporting to the workflow orchestrator.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("Continuation token is missing: {0}")]
    MissingToken(String),

    #[error("Failed to send task {outcome}: {message}")]
    SendFailed { outcome: String, message: String },
}

/// Errors that can occur while publishing notifications.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Failed to publish to '{topic}': {message}")]
    PublishFailed { topic: String, message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Data,
    Resource,
    Service,
    Timeout,
    Cancelled,
}

impl ErrorKind {
    /// Error code reported to the workflow orchestrator.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "ConfigurationError",
            ErrorKind::Data => "DataError",
            ErrorKind::Resource => "ResourceError",
            ErrorKind::Service => "ServiceError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Cancelled => "Cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Any failure of a dispatch, merge or completion run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Review error: {0}")]
    Review(#[from] ReviewError),

    #[error("Staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Classifies this error for reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Configuration,
            PipelineError::Manifest(_) => ErrorKind::Data,
            PipelineError::Storage(StorageError::InvalidUrl { .. }) => ErrorKind::Configuration,
            PipelineError::Storage(_) | PipelineError::Io(_) => ErrorKind::Resource,
            PipelineError::Review(ReviewError::FlowActivationTimeout { .. }) => ErrorKind::Timeout,
            PipelineError::Review(ReviewError::Cancelled(_)) => ErrorKind::Cancelled,
            PipelineError::Review(_) => ErrorKind::Service,
            PipelineError::Staging(_) => ErrorKind::Resource,
            PipelineError::Workflow(_) | PipelineError::Notify(_) => ErrorKind::Service,
        }
    }
}
