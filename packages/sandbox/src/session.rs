// ABOUTME: Capability interfaces every sandbox backend must satisfy
// ABOUTME: Outbound session commands, inbound event sink, and the factory that re-instantiates sessions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;

/// Status vocabulary reported by the sandbox itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxStatus {
    Loading,
    Installing,
    Ready,
    Running,
    WaitingInput,
    Stopped,
    Error,
}

impl SandboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxStatus::Loading => "loading",
            SandboxStatus::Installing => "installing",
            SandboxStatus::Ready => "ready",
            SandboxStatus::Running => "running",
            SandboxStatus::WaitingInput => "waiting_input",
            SandboxStatus::Stopped => "stopped",
            SandboxStatus::Error => "error",
        }
    }
}

/// Receives events emitted by a sandbox, in emission order.
///
/// Implementations must not block: they are called from the task that reads
/// the sandbox's event stream.
pub trait SandboxEventSink: Send + Sync {
    /// Output chunk; `append` false means the chunk replaces the console
    fn on_output(&self, chunk: &str, append: bool);

    /// The running program asked for a line of input
    fn on_input(&self, prompt: &str);

    /// Recoverable fault; a `on_terminated` call follows when the run ends
    fn on_error(&self, message: &str);

    /// The current run finished, naturally or after a stop
    fn on_terminated(&self);

    /// A rendered figure (encoded image data)
    fn on_figure(&self, data: &str);

    fn on_status_update(&self, status: SandboxStatus);
}

/// Commands accepted by a live sandbox session.
///
/// Every call is fire-and-forget: it returns once the command is handed to
/// the sandbox, and results come back through the [`SandboxEventSink`].
#[async_trait]
pub trait SandboxSession: Send + Sync {
    /// Boot the interpreter and install the given packages
    async fn preload(&self, packages: &[String]) -> Result<()>;

    async fn run(&self, code: &str) -> Result<()>;

    /// Cancel whatever the sandbox is doing
    async fn stop(&self) -> Result<()>;

    /// Write a file into the sandbox's virtual filesystem
    async fn put_file(&self, path: &str, content: &[u8]) -> Result<()>;

    async fn submit_input(&self, text: &str) -> Result<()>;

    async fn cancel_input(&self) -> Result<()>;

    async fn clear_output(&self) -> Result<()>;

    /// Release the underlying environment; the session is unusable afterwards
    async fn shutdown(&self) -> Result<()>;
}

/// Creates fresh sandbox sessions.
///
/// Sandbox global state cannot be reset in place, so a reset is always a new
/// session from the factory wired to a new sink.
#[async_trait]
pub trait SandboxFactory: Send + Sync {
    async fn create(&self, sink: Arc<dyn SandboxEventSink>) -> Result<Arc<dyn SandboxSession>>;
}
