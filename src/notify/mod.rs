//! Review lifecycle notifications.

pub mod sns;

use async_trait::async_trait;
use serde::Serialize;

pub use crate::error::NotifyError;
pub use sns::SnsNotifier;

/// Lifecycle event announced to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NoticeType {
    ReviewStarted,
    ReviewComplete,
}

/// A notification: JSON body `{"type", "name"}` plus a readable subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    #[serde(rename = "type")]
    pub notice_type: NoticeType,
    pub name: String,
}

impl Notice {
    pub fn review_started(execution_name: impl Into<String>) -> Self {
        Self {
            notice_type: NoticeType::ReviewStarted,
            name: execution_name.into(),
        }
    }

    pub fn review_complete(execution_name: impl Into<String>) -> Self {
        Self {
            notice_type: NoticeType::ReviewComplete,
            name: execution_name.into(),
        }
    }

    pub fn subject(&self) -> String {
        match self.notice_type {
            NoticeType::ReviewStarted => format!("Review started for {}", self.name),
            NoticeType::ReviewComplete => format!("Review completed for {}", self.name),
        }
    }

    pub fn message(&self) -> Result<String, NotifyError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Publishes notices.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, notice: &Notice) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_started_notice() {
        let notice = Notice::review_started("batch-42");
        assert_eq!(
            notice.message().expect("serializes"),
            r#"{"type":"REVIEW_STARTED","name":"batch-42"}"#
        );
        assert_eq!(notice.subject(), "Review started for batch-42");
    }

    #[test]
    fn test_review_complete_notice() {
        let notice = Notice::review_complete("batch-42");
        assert_eq!(
            notice.message().expect("serializes"),
            r#"{"type":"REVIEW_COMPLETE","name":"batch-42"}"#
        );
        assert_eq!(notice.subject(), "Review completed for batch-42");
    }
}
