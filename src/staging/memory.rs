//! In-memory staging table.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{StagingTable, TASK_TOKEN_INDEX};
use crate::error::StagingError;

/// [`StagingTable`] holding its rows in a process-local map.
///
/// Rows are keyed by `(execution_id, index)`; the value is the stored token
/// for the token row and `None` for pending markers.
#[derive(Debug, Default)]
pub struct InMemoryStagingTable {
    rows: Mutex<BTreeMap<(String, String), Option<String>>>,
}

impl InMemoryStagingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Index` values of an execution's rows, in key order.
    pub async fn indices(&self, execution_id: &str) -> Vec<String> {
        self.rows
            .lock()
            .await
            .keys()
            .filter(|(id, _)| id == execution_id)
            .map(|(_, index)| index.clone())
            .collect()
    }

    /// The stored token of an execution, without removing it.
    pub async fn task_token(&self, execution_id: &str) -> Option<String> {
        self.rows
            .lock()
            .await
            .get(&(execution_id.to_string(), TASK_TOKEN_INDEX.to_string()))
            .cloned()
            .flatten()
    }
}

#[async_trait]
impl StagingTable for InMemoryStagingTable {
    async fn put_pending_marker(&self, execution_id: &str, index: &str) -> Result<(), StagingError> {
        self.rows
            .lock()
            .await
            .insert((execution_id.to_string(), index.to_string()), None);
        Ok(())
    }

    async fn put_task_token(&self, execution_id: &str, token: &str) -> Result<(), StagingError> {
        self.rows.lock().await.insert(
            (execution_id.to_string(), TASK_TOKEN_INDEX.to_string()),
            Some(token.to_string()),
        );
        Ok(())
    }

    async fn delete_marker(&self, execution_id: &str, index: &str) -> Result<bool, StagingError> {
        Ok(self
            .rows
            .lock()
            .await
            .remove(&(execution_id.to_string(), index.to_string()))
            .is_some())
    }

    async fn take_task_token(&self, execution_id: &str) -> Result<Option<String>, StagingError> {
        Ok(self
            .rows
            .lock()
            .await
            .remove(&(execution_id.to_string(), TASK_TOKEN_INDEX.to_string()))
            .flatten())
    }

    async fn count_rows(&self, execution_id: &str, _stop_after: usize) -> Result<usize, StagingError> {
        Ok(self
            .rows
            .lock()
            .await
            .keys()
            .filter(|(id, _)| id == execution_id)
            .count())
    }
}
