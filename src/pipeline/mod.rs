//! The review pipeline tasks.
//!
//! # Architecture
//!
//! A review batch runs as three tasks driven by a workflow orchestrator:
//!
//! - **Dispatch** ([`ReviewDispatch`]): creates the flow definition, opens one
//!   human loop per manifest record and parks the continuation token.
//! - **Completion** ([`ReviewCompletion`]): runs once per finished human loop
//!   and resumes the workflow after the last one.
//! - **Merge** ([`ResultMerge`]): combines the review outputs with the input
//!   manifest's label configuration into the output manifest.
//!
//! Dispatch and merge resolve their continuation token through
//! [`resolve_task`], which sends at most one success or failure report.
//!
//! # Example
//!
//! ```rust,ignore
//! use review_loop::pipeline::{MergeConfig, ResultMerge};
//! use review_loop::workflow::TaskToken;
//!
//! let token = TaskToken::from_env()?;
//! let config = MergeConfig::from_env()?;
//! let merge = ResultMerge::new(config, store, workflow, notifier);
//! let report = merge.execute(&token).await?;
//! println!("{} records merged", report.records_written);
//! ```

pub mod completion;
pub mod config;
pub mod dispatch;
pub mod merge;
pub mod poll;
pub mod runner;

// Re-export main types for convenience
pub use completion::{CompletionOutcome, ReviewCompletion};
pub use config::{
    parse_execution_id, CompletionConfig, ConfigError, DispatchConfig, ExecutionConfig, LogLevel,
    MergeConfig, PollSettings,
};
pub use dispatch::{DispatchReport, ReviewDispatch};
pub use merge::{review_outputs, MergeReport, ResultMerge};
pub use poll::wait_for_flow_active;
pub use runner::{report_failure, resolve_task, Resolution};
