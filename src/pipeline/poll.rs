//! Waiting for a flow definition to become usable.

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::config::PollSettings;
use crate::review::{FlowStatus, ReviewError, ReviewService};

/// Polls the flow definition `name` until it reports `Active`.
///
/// Fails immediately when the service reports `Failed` or `Deleting`, when
/// `settings.timeout` elapses, or when `cancel` fires. The deadline also bounds
/// a status call that never returns.
pub async fn wait_for_flow_active(
    service: &dyn ReviewService,
    name: &str,
    settings: PollSettings,
    cancel: &CancellationToken,
) -> Result<(), ReviewError> {
    let started = Instant::now();
    let deadline = started + settings.timeout;
    let mut polls = 0u32;

    loop {
        let status = tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(name)),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out(name, started)),
            status = service.flow_definition_status(name) => status?,
        };
        polls += 1;

        match status {
            FlowStatus::Active => {
                tracing::debug!(flow = name, polls, "Flow definition is active");
                return Ok(());
            }
            FlowStatus::Failed(reason) => {
                return Err(ReviewError::FlowFailed {
                    name: name.to_string(),
                    reason,
                });
            }
            FlowStatus::Deleting => {
                return Err(ReviewError::FlowFailed {
                    name: name.to_string(),
                    reason: "flow definition is being deleted".to_string(),
                });
            }
            other => {
                tracing::trace!(flow = name, status = ?other, "Flow definition not active yet");
            }
        }

        if Instant::now() >= deadline {
            return Err(timed_out(name, started));
        }

        tokio::select! {
            _ = cancel.cancelled() => return Err(cancelled(name)),
            _ = tokio::time::sleep_until(deadline) => return Err(timed_out(name, started)),
            _ = tokio::time::sleep(settings.interval) => {}
        }
    }
}

fn cancelled(name: &str) -> ReviewError {
    ReviewError::Cancelled(format!("waiting for flow definition {}", name))
}

fn timed_out(name: &str, started: Instant) -> ReviewError {
    ReviewError::FlowActivationTimeout {
        name: name.to_string(),
        waited: started.elapsed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::review::{FlowDefinitionRequest, HumanLoopRequest};

    /// Returns the scripted statuses in order, then repeats the last one.
    struct ScriptedFlowService {
        statuses: Mutex<Vec<FlowStatus>>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl ScriptedFlowService {
        fn new(statuses: Vec<FlowStatus>) -> Self {
            Self {
                statuses: Mutex::new(statuses),
                calls: AtomicUsize::new(0),
                hang: false,
            }
        }

        /// Status calls never complete.
        fn hanging() -> Self {
            Self {
                hang: true,
                ..Self::new(vec![FlowStatus::Initializing])
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReviewService for ScriptedFlowService {
        async fn create_flow_definition(
            &self,
            _request: &FlowDefinitionRequest,
        ) -> Result<String, ReviewError> {
            Ok("arn:flow".to_string())
        }

        async fn flow_definition_status(&self, _name: &str) -> Result<FlowStatus, ReviewError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            let mut statuses = self.statuses.lock().expect("lock poisoned");
            if statuses.len() > 1 {
                Ok(statuses.remove(0))
            } else {
                Ok(statuses[0].clone())
            }
        }

        async fn delete_flow_definition(&self, _name: &str) -> Result<(), ReviewError> {
            Ok(())
        }

        async fn start_human_loop(&self, _request: &HumanLoopRequest) -> Result<(), ReviewError> {
            Ok(())
        }
    }

    fn fast() -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(1),
            timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn test_waits_until_active() {
        let service = ScriptedFlowService::new(vec![
            FlowStatus::Initializing,
            FlowStatus::Initializing,
            FlowStatus::Active,
        ]);
        let cancel = CancellationToken::new();

        wait_for_flow_active(&service, "flow-1", fast(), &cancel)
            .await
            .expect("becomes active");
        assert_eq!(service.calls(), 3);
    }

    #[tokio::test]
    async fn test_failed_status_stops_polling() {
        let service = ScriptedFlowService::new(vec![
            FlowStatus::Initializing,
            FlowStatus::Failed("role cannot be assumed".to_string()),
        ]);
        let cancel = CancellationToken::new();

        let err = wait_for_flow_active(&service, "flow-1", fast(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FlowFailed { ref reason, .. } if reason == "role cannot be assumed"));
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_deleting_status_stops_polling() {
        let service = ScriptedFlowService::new(vec![FlowStatus::Initializing, FlowStatus::Deleting]);
        let cancel = CancellationToken::new();

        let err = wait_for_flow_active(&service, "flow-1", fast(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FlowFailed { ref name, .. } if name == "flow-1"));
        assert_eq!(service.calls(), 2);
    }

    #[tokio::test]
    async fn test_timeout_bounds_a_status_call_that_never_returns() {
        let service = ScriptedFlowService::hanging();
        let cancel = CancellationToken::new();
        let settings = PollSettings {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(50),
        };

        let begun = std::time::Instant::now();
        let err = wait_for_flow_active(&service, "flow-1", settings, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FlowActivationTimeout { .. }));
        assert!(begun.elapsed() < Duration::from_secs(2));
        assert_eq!(service.calls(), 1);
    }

    #[tokio::test]
    async fn test_times_out_when_never_active() {
        let service = ScriptedFlowService::new(vec![FlowStatus::Initializing]);
        let cancel = CancellationToken::new();
        let settings = PollSettings {
            interval: Duration::from_millis(5),
            timeout: Duration::from_millis(30),
        };

        let err = wait_for_flow_active(&service, "flow-1", settings, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::FlowActivationTimeout { .. }));
        assert!(service.calls() >= 2);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_wait() {
        let service = ScriptedFlowService::new(vec![FlowStatus::Initializing]);
        let cancel = CancellationToken::new();
        let settings = PollSettings {
            interval: Duration::from_secs(60),
            timeout: Duration::from_secs(600),
        };

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = wait_for_flow_active(&service, "flow-1", settings, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, ReviewError::Cancelled(_)));
    }
}
