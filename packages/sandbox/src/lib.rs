// ABOUTME: Sandbox session boundary for the tutor execution engine
// ABOUTME: Session/event-sink traits plus a JSON-lines bridge to an out-of-process worker

pub mod bridge;
pub mod error;
pub mod protocol;
pub mod session;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bridge::{WorkerBridge, WorkerBridgeFactory};
pub use error::{Result, SandboxError};
pub use protocol::{WorkerEvent, WorkerRequest};
pub use session::{SandboxEventSink, SandboxFactory, SandboxSession, SandboxStatus};
