//! DynamoDB staging table.
//!
//! | Attribute     | Type   | Description                                 |
//! |---------------|--------|---------------------------------------------|
//! | `ExecutionId` | String | Partition key                               |
//! | `Index`       | String | Sort key: human loop name or `TASK_TOKEN`   |
//! | `TASK_TOKEN`  | String | Continuation token, on the token row only   |

use async_trait::async_trait;
use aws_sdk_dynamodb::error::DisplayErrorContext;
use aws_sdk_dynamodb::types::{AttributeValue, ReturnValue};
use aws_sdk_dynamodb::Client;

use super::{StagingTable, TASK_TOKEN_INDEX};
use crate::error::StagingError;

const EXECUTION_ID_ATTR: &str = "ExecutionId";
const INDEX_ATTR: &str = "Index";
const TOKEN_ATTR: &str = "TASK_TOKEN";

/// Rows fetched per query page while counting.
const COUNT_PAGE_SIZE: i32 = 2;

/// [`StagingTable`] backed by a DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoDbStagingTable {
    client: Client,
    table_name: String,
}

impl DynamoDbStagingTable {
    /// Creates a table handle with a pre-built DynamoDB client.
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    /// Creates a table handle from a loaded AWS SDK configuration.
    pub fn from_sdk_config(config: &aws_config::SdkConfig, table_name: impl Into<String>) -> Self {
        Self::new(Client::new(config), table_name)
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

/// Maps an AWS SDK error to a [`StagingError::Backend`].
fn map_sdk_error(err: impl std::error::Error, execution_id: &str, index: &str) -> StagingError {
    StagingError::Backend {
        execution_id: execution_id.to_string(),
        index: index.to_string(),
        message: DisplayErrorContext(&err).to_string(),
    }
}

#[async_trait]
impl StagingTable for DynamoDbStagingTable {
    async fn put_pending_marker(&self, execution_id: &str, index: &str) -> Result<(), StagingError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(EXECUTION_ID_ATTR, AttributeValue::S(execution_id.to_string()))
            .item(INDEX_ATTR, AttributeValue::S(index.to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, execution_id, index))?;
        Ok(())
    }

    async fn put_task_token(&self, execution_id: &str, token: &str) -> Result<(), StagingError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .item(EXECUTION_ID_ATTR, AttributeValue::S(execution_id.to_string()))
            .item(INDEX_ATTR, AttributeValue::S(TASK_TOKEN_INDEX.to_string()))
            .item(TOKEN_ATTR, AttributeValue::S(token.to_string()))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, execution_id, TASK_TOKEN_INDEX))?;
        Ok(())
    }

    async fn delete_marker(&self, execution_id: &str, index: &str) -> Result<bool, StagingError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(EXECUTION_ID_ATTR, AttributeValue::S(execution_id.to_string()))
            .key(INDEX_ATTR, AttributeValue::S(index.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, execution_id, index))?;

        Ok(result.attributes().is_some_and(|attrs| !attrs.is_empty()))
    }

    async fn take_task_token(&self, execution_id: &str) -> Result<Option<String>, StagingError> {
        let result = self
            .client
            .delete_item()
            .table_name(&self.table_name)
            .key(EXECUTION_ID_ATTR, AttributeValue::S(execution_id.to_string()))
            .key(INDEX_ATTR, AttributeValue::S(TASK_TOKEN_INDEX.to_string()))
            .return_values(ReturnValue::AllOld)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, execution_id, TASK_TOKEN_INDEX))?;

        Ok(result
            .attributes()
            .and_then(|attrs| attrs.get(TOKEN_ATTR))
            .and_then(|value| value.as_s().ok())
            .cloned())
    }

    async fn count_rows(&self, execution_id: &str, stop_after: usize) -> Result<usize, StagingError> {
        let mut count = 0usize;
        let mut exclusive_start_key = None;

        loop {
            let output = self
                .client
                .query()
                .table_name(&self.table_name)
                .limit(COUNT_PAGE_SIZE)
                .key_condition_expression("#ExecutionId = :ExecutionId")
                .expression_attribute_names("#ExecutionId", EXECUTION_ID_ATTR)
                .expression_attribute_values(
                    ":ExecutionId",
                    AttributeValue::S(execution_id.to_string()),
                )
                .set_exclusive_start_key(exclusive_start_key.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, execution_id, "*"))?;

            count += usize::try_from(output.count()).unwrap_or_default();
            if count > stop_after {
                break;
            }

            match output.last_evaluated_key() {
                Some(key) => exclusive_start_key = Some(key.clone()),
                None => break,
            }
        }

        tracing::debug!(execution_id, count, "Counted staging rows");
        Ok(count)
    }
}
