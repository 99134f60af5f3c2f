//! review_loop: human-in-the-loop review of named-entity annotations.
//!
//! This library provides the batch tasks that send manifest records to human
//! reviewers, track the open reviews and merge the reviewed annotations back
//! into a manifest.

// Core modules
pub mod cli;
pub mod error;
pub mod manifest;
pub mod notify;
pub mod pipeline;
pub mod review;
pub mod staging;
pub mod storage;
pub mod workflow;

// Re-export commonly used error types
pub use error::{
    ErrorKind, ManifestError, NotifyError, PipelineError, ReviewError, StagingError, StorageError,
    WorkflowError,
};
