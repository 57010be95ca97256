// ABOUTME: Scripted review service for tests
// ABOUTME: Replies with a fixed verdict, records requests, and can hold replies back

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::Semaphore;

use crate::service::{ChatTurn, ReviewError, ReviewResponse, ReviewResult, ReviewService};

/// Reviewer returning the same verdict for every request
pub struct CannedReviewer {
    verdict: Option<String>,
    requests: Mutex<Vec<Vec<ChatTurn>>>,
    gate: Option<Semaphore>,
    in_flight: AtomicUsize,
}

impl CannedReviewer {
    pub fn replying(verdict: &str) -> Self {
        Self {
            verdict: Some(verdict.to_string()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Every request fails as if the service were down
    pub fn failing() -> Self {
        Self {
            verdict: None,
            requests: Mutex::new(Vec::new()),
            gate: None,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Requests block until [`CannedReviewer::release`] hands out permits
    pub fn held(mut self) -> Self {
        self.gate = Some(Semaphore::new(0));
        self
    }

    pub fn release(&self, replies: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(replies);
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatTurn>> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Requests received but not answered yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewService for CannedReviewer {
    async fn request(&self, turns: Vec<ChatTurn>) -> ReviewResult<ReviewResponse> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(turns);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.verdict {
            Some(verdict) => Ok(ReviewResponse {
                completion: verdict.clone(),
                model: None,
            }),
            None => Err(ReviewError::ApiError("review service unavailable".to_string())),
        }
    }
}
