// ABOUTME: Error types for sandbox sessions
// ABOUTME: Worker process spawn, IPC and protocol failures

use thiserror::Error;

/// Main error type for sandbox operations
#[derive(Error, Debug)]
pub enum SandboxError {
    /// No worker command was configured
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Worker process failed to start
    #[error("Worker failed to start: {0}")]
    WorkerStartFailed(String),

    /// Worker did not answer the boot handshake in time
    #[error("Worker did not become ready within {seconds} seconds")]
    BootTimeout { seconds: u64 },

    /// Worker process is gone
    #[error("Worker is not running")]
    WorkerNotRunning,

    /// Writing a request to the worker failed
    #[error("Worker communication error: {0}")]
    Communication(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Type alias for Results that return SandboxError
pub type Result<T> = std::result::Result<T, SandboxError>;
