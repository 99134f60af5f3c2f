//! Staging table for pending review markers.
//!
//! Every open human loop has a row keyed by `(ExecutionId, Index)` where
//! `Index` is the human loop name. A distinguished row with
//! `Index = "TASK_TOKEN"` keeps the workflow continuation token until the
//! last review completes. The table acts as a fan-out completion counter:
//! once only the token row is left, the workflow can be resumed.
//!
//! Writes are plain puts keyed by `(ExecutionId, Index)`, so repeating a
//! run for the same execution overwrites rows instead of duplicating them.

pub mod dynamodb;
pub mod memory;

use async_trait::async_trait;

pub use crate::error::StagingError;
pub use dynamodb::DynamoDbStagingTable;
pub use memory::InMemoryStagingTable;

/// `Index` value of the row holding the continuation token.
pub const TASK_TOKEN_INDEX: &str = "TASK_TOKEN";

/// Durable registry of open review tasks.
#[async_trait]
pub trait StagingTable: Send + Sync {
    /// Records that the human loop `index` of an execution is open.
    async fn put_pending_marker(&self, execution_id: &str, index: &str) -> Result<(), StagingError>;

    /// Stores the continuation token of an execution.
    async fn put_task_token(&self, execution_id: &str, token: &str) -> Result<(), StagingError>;

    /// Removes a pending marker. Returns whether a row was removed.
    async fn delete_marker(&self, execution_id: &str, index: &str) -> Result<bool, StagingError>;

    /// Removes the token row and returns the token it held, if any.
    async fn take_task_token(&self, execution_id: &str) -> Result<Option<String>, StagingError>;

    /// Counts the rows of an execution (markers and token row). Counting may
    /// stop as soon as more than `stop_after` rows were seen.
    async fn count_rows(&self, execution_id: &str, stop_after: usize) -> Result<usize, StagingError>;
}
