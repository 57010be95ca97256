// ABOUTME: Lifecycle telemetry reporting to the remote action sink
// ABOUTME: Posts are fire-and-forget; failures are logged and dropped

use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use tutor_appdata::ActionSink;
use tutor_core::{ActionType, AppAction};

#[derive(Clone)]
pub struct ActionReporter {
    sink: Arc<dyn ActionSink>,
    /// Background posts not yet known to be finished
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl ActionReporter {
    pub fn new(sink: Arc<dyn ActionSink>) -> Self {
        Self {
            sink,
            pending: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Post an action in the background without waiting for the sink.
    ///
    /// Callable from synchronous sandbox callbacks; outside a runtime the action is dropped.
    pub fn report(&self, action_type: ActionType, data: Value) {
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime available, dropping {} action", action_type);
                return;
            }
        };
        let sink = self.sink.clone();
        let task = handle.spawn(async move {
            post_action(sink.as_ref(), AppAction::new(action_type, data)).await;
        });

        let mut pending = self.lock_pending();
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }

    /// Wait for every background post issued so far
    pub async fn flush(&self) {
        let tasks: Vec<JoinHandle<()>> = self.lock_pending().drain(..).collect();
        if !tasks.is_empty() {
            debug!("Waiting for {} telemetry post(s)", tasks.len());
        }
        for task in tasks {
            let _ = task.await;
        }
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Post an action and wait until the sink has answered
    pub async fn post(&self, action_type: ActionType, data: Value) {
        post_action(self.sink.as_ref(), AppAction::new(action_type, data)).await;
    }
}

async fn post_action(sink: &dyn ActionSink, action: AppAction) {
    let action_type = action.action_type;
    match sink.post_action(action).await {
        Ok(()) => debug!("Posted {} action", action_type),
        Err(e) => warn!("Failed to post {} action: {}", action_type, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tutor_appdata::testing::InMemoryAppData;

    #[tokio::test]
    async fn test_post_waits_for_sink() {
        let store = Arc::new(InMemoryAppData::new());
        let reporter = ActionReporter::new(store.clone());

        reporter
            .post(ActionType::SaveCode, json!({"code": "x = 1"}))
            .await;

        let actions = store.actions_of(ActionType::SaveCode);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].data, json!({"code": "x = 1"}));
    }

    #[tokio::test]
    async fn test_report_runs_in_background() {
        let store = Arc::new(InMemoryAppData::new());
        let reporter = ActionReporter::new(store.clone());

        reporter.report(ActionType::ClearOutput, json!({}));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;

        assert_eq!(store.actions_of(ActionType::ClearOutput).len(), 1);
    }

    #[tokio::test]
    async fn test_flush_waits_for_background_posts() {
        let store = Arc::new(InMemoryAppData::new());
        let reporter = ActionReporter::new(store.clone());

        reporter.report(ActionType::RunCode, json!({"code": "a"}));
        reporter.report(ActionType::RunCode, json!({"code": "b"}));
        reporter.flush().await;

        assert_eq!(store.actions_of(ActionType::RunCode).len(), 2);
    }

    #[test]
    fn test_report_without_runtime_is_dropped() {
        let store = Arc::new(InMemoryAppData::new());
        let reporter = ActionReporter::new(store.clone());

        reporter.report(ActionType::NewFigure, json!({"figure": "png"}));

        assert!(store.actions().is_empty());
    }
}
