// ABOUTME: Automated review service integration
// ABOUTME: Chatbot client that evaluates a code snapshot and returns free-text feedback

pub mod service;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export service types
pub use service::{
    ChatRole, ChatTurn, ChatbotClient, ReviewError, ReviewResponse, ReviewResult, ReviewService,
};
