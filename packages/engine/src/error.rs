// ABOUTME: Error types for the execution engine
// ABOUTME: Wraps sandbox and remote store failures surfaced to the caller

use thiserror::Error;
use tutor_appdata::AppDataError;
use tutor_sandbox::SandboxError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Sandbox error: {0}")]
    Sandbox(#[from] SandboxError),

    #[error("Remote store error: {0}")]
    AppData(#[from] AppDataError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
