// ABOUTME: Automated code review requests and the periodic review timer
// ABOUTME: One dispatcher turns snapshots into comments; the timer and runs both feed it

use serde_json::json;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use tutor_ai::{ChatTurn, ReviewService};
use tutor_appdata::CodeStore;
use tutor_core::{
    is_no_feedback, ActionType, AppDataType, Comment, NewAppData, INSTRUCTOR_CODE_ID,
    REVIEW_INSTRUCTION,
};

use crate::telemetry::ActionReporter;

/// Result of one review request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// The reviewer answered with the "no" verdict
    NoFeedback,
    Commented(Comment),
    /// The request failed; nothing was recorded
    Failed(String),
}

/// Single-turn conversation asking for a verdict on `snapshot`
pub fn review_turns(snapshot: &str) -> Vec<ChatTurn> {
    vec![ChatTurn::system(format!("{} {}", REVIEW_INSTRUCTION, snapshot))]
}

/// Sends review requests and records their results
pub struct ReviewDispatcher {
    reviewer: Arc<dyn ReviewService>,
    store: Arc<dyn CodeStore>,
    reporter: ActionReporter,
    /// Background reviews not yet known to be finished
    pending: Mutex<Vec<JoinHandle<ReviewOutcome>>>,
}

impl ReviewDispatcher {
    pub fn new(
        reviewer: Arc<dyn ReviewService>,
        store: Arc<dyn CodeStore>,
        reporter: ActionReporter,
    ) -> Self {
        Self {
            reviewer,
            store,
            reporter,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Review `snapshot` in the background; requests are never cancelled or deduplicated
    pub fn fire(self: &Arc<Self>, snapshot: String) {
        let dispatcher = self.clone();
        let task = tokio::spawn(async move { dispatcher.review(&snapshot).await });

        let mut pending = self.lock_pending();
        pending.retain(|task| !task.is_finished());
        pending.push(task);
    }

    /// Background reviews still running
    pub fn in_flight(&self) -> usize {
        self.lock_pending()
            .iter()
            .filter(|task| !task.is_finished())
            .count()
    }

    /// Wait for every background review fired so far and collect the finished outcomes
    pub async fn flush(&self) -> Vec<ReviewOutcome> {
        let tasks: Vec<JoinHandle<ReviewOutcome>> = self.lock_pending().drain(..).collect();
        if !tasks.is_empty() {
            debug!("Waiting for {} review(s)", tasks.len());
        }
        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            match task.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Review task ended abnormally: {}", e),
            }
        }
        outcomes
    }

    fn lock_pending(&self) -> MutexGuard<'_, Vec<JoinHandle<ReviewOutcome>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub async fn review(&self, snapshot: &str) -> ReviewOutcome {
        debug!("Requesting review of {} byte(s) of code", snapshot.len());
        let response = match self.reviewer.request(review_turns(snapshot)).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Review request failed: {}", e);
                return ReviewOutcome::Failed(e.to_string());
            }
        };

        let raw = serde_json::to_value(&response).unwrap_or_else(|_| json!({}));
        self.reporter.post(ActionType::BotRunfeedback, raw).await;

        if is_no_feedback(&response.completion) {
            debug!("Reviewer has no feedback");
            return ReviewOutcome::NoFeedback;
        }

        let comment = Comment {
            line: 0,
            parent_id: None,
            author_id: INSTRUCTOR_CODE_ID.to_string(),
            content: response.completion,
        };
        let data = serde_json::to_value(&comment).unwrap_or_else(|_| json!({}));

        match self
            .store
            .post_app_data(NewAppData {
                data_type: AppDataType::BotComment,
                data: data.clone(),
            })
            .await
        {
            Ok(stored) => info!("Stored review comment {}", stored.id),
            Err(e) => warn!("Failed to store review comment: {}", e),
        }
        self.reporter.post(ActionType::CreateComment, data).await;

        ReviewOutcome::Commented(comment)
    }
}

/// Periodic review timer scoped to its owner.
///
/// The timer task is aborted on [`ReviewScheduler::shutdown`] or drop.
pub struct ReviewScheduler {
    timer: Option<JoinHandle<()>>,
}

impl ReviewScheduler {
    /// Scheduler with no timer running
    pub fn idle() -> Self {
        Self { timer: None }
    }

    /// Fire a review of `snapshot()` every `period`, starting one period from now
    pub fn start<F>(dispatcher: Arc<ReviewDispatcher>, period: Duration, snapshot: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        info!("Started review timer (interval: {:?})", period);
        let timer = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                dispatcher.fire(snapshot());
            }
        });
        Self { timer: Some(timer) }
    }

    pub fn is_active(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn shutdown(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("Stopped review timer");
        }
    }
}

impl Drop for ReviewScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tutor_ai::testing::CannedReviewer;
    use tutor_appdata::testing::InMemoryAppData;

    fn dispatcher(reviewer: Arc<CannedReviewer>) -> (Arc<ReviewDispatcher>, Arc<InMemoryAppData>) {
        let store = Arc::new(InMemoryAppData::new());
        let dispatcher = Arc::new(ReviewDispatcher::new(
            reviewer,
            store.clone(),
            ActionReporter::new(store.clone()),
        ));
        (dispatcher, store)
    }

    #[test]
    fn test_review_turns_embed_snapshot() {
        let turns = review_turns("print(1)\n");
        assert_eq!(turns.len(), 1);
        assert_eq!(
            turns[0].content,
            "What do you think about this code? If you think the code is working, answer only with \"no\" print(1)\n"
        );
    }

    #[rstest]
    #[case("no")]
    #[case("NO")]
    #[case(" No \n")]
    #[tokio::test]
    async fn test_no_verdict_creates_no_comment(#[case] verdict: &str) {
        let (dispatcher, store) = dispatcher(Arc::new(CannedReviewer::replying(verdict)));

        let outcome = dispatcher.review("x = 1").await;

        assert_eq!(outcome, ReviewOutcome::NoFeedback);
        assert!(store.records().is_empty());
        assert_eq!(store.actions().len(), 1);
        assert_eq!(store.actions()[0].action_type, ActionType::BotRunfeedback);
    }

    #[tokio::test]
    async fn test_feedback_creates_one_comment_and_two_events() {
        let (dispatcher, store) =
            dispatcher(Arc::new(CannedReviewer::replying("Use a for loop here.")));

        let outcome = dispatcher.review("x = 1").await;

        let expected = Comment {
            line: 0,
            parent_id: None,
            author_id: INSTRUCTOR_CODE_ID.to_string(),
            content: "Use a for loop here.".to_string(),
        };
        assert_eq!(outcome, ReviewOutcome::Commented(expected.clone()));

        let comments = store.records_of(AppDataType::BotComment);
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].data, serde_json::to_value(&expected).unwrap());

        let kinds: Vec<ActionType> = store.actions().iter().map(|a| a.action_type).collect();
        assert_eq!(
            kinds,
            vec![ActionType::BotRunfeedback, ActionType::CreateComment]
        );
        assert_eq!(
            store.actions()[0].data,
            json!({"completion": "Use a for loop here."})
        );
    }

    #[tokio::test]
    async fn test_comment_event_survives_store_failure() {
        let (dispatcher, store) = dispatcher(Arc::new(CannedReviewer::replying("Rename x.")));
        store.set_store_offline(true);

        let outcome = dispatcher.review("x = 1").await;

        assert!(matches!(outcome, ReviewOutcome::Commented(_)));
        assert_eq!(store.actions_of(ActionType::CreateComment).len(), 1);
    }

    #[tokio::test]
    async fn test_failed_request_records_nothing() {
        let (dispatcher, store) = dispatcher(Arc::new(CannedReviewer::failing()));

        let outcome = dispatcher.review("x = 1").await;

        assert!(matches!(outcome, ReviewOutcome::Failed(_)));
        assert!(store.actions().is_empty());
        assert!(store.records().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_requests_run_concurrently() {
        let reviewer = Arc::new(CannedReviewer::replying("no").held());
        let (dispatcher, _store) = dispatcher(reviewer.clone());

        dispatcher.fire("a".to_string());
        dispatcher.fire("b".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(reviewer.in_flight(), 2);
        assert_eq!(dispatcher.in_flight(), 2);

        reviewer.release(2);
        assert_eq!(
            dispatcher.flush().await,
            vec![ReviewOutcome::NoFeedback, ReviewOutcome::NoFeedback]
        );
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_flush_waits_for_comment_to_be_stored() {
        let reviewer = Arc::new(CannedReviewer::replying("Check the loop bound.").held());
        let (dispatcher, store) = dispatcher(reviewer.clone());

        dispatcher.fire("for i in range(10): pass".to_string());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.records_of(AppDataType::BotComment).is_empty());

        reviewer.release(1);
        let outcomes = dispatcher.flush().await;

        assert!(matches!(outcomes.as_slice(), [ReviewOutcome::Commented(_)]));
        assert_eq!(store.records_of(AppDataType::BotComment).len(), 1);
        assert_eq!(store.actions_of(ActionType::CreateComment).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_every_period_until_shutdown() {
        let reviewer = Arc::new(CannedReviewer::replying("no"));
        let (dispatcher, _store) = dispatcher(reviewer.clone());

        let mut scheduler =
            ReviewScheduler::start(dispatcher, Duration::from_secs(10), || "code".to_string());
        assert!(scheduler.is_active());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(reviewer.requests().len(), 0);

        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(reviewer.requests().len(), 2);

        scheduler.shutdown();
        assert!(!scheduler.is_active());
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(reviewer.requests().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_scheduler_stops_timer() {
        let reviewer = Arc::new(CannedReviewer::replying("no"));
        let (dispatcher, _store) = dispatcher(reviewer.clone());

        let scheduler =
            ReviewScheduler::start(dispatcher, Duration::from_secs(10), || "code".to_string());
        drop(scheduler);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(reviewer.requests().is_empty());
    }
}
